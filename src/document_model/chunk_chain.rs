//! The ordered chain of chunks that makes up a document.
//!
//! Chunks live in an index-stable arena; `prev`/`next` are arena ids, so a
//! chunk can be spliced in or out in O(1) and a stale id is caught as soon as
//! it is dereferenced. Line numbers and width totals are caches that are
//! brought up to date by a single rescan after each edit batch, as are the
//! dense chain indices. Positions are ordered by a separate sparse key: a
//! chunk split off in mid-batch takes a key between its neighbours, so
//! ordering stays exact without renumbering the chain.

use std::cmp::Ordering;

use tracing::trace;

use super::chunk::{Chunk, ChunkSplit};
use super::text_metrics::{prev_char_boundary, utf8_char_len};

// Spacing of order keys after a rescan, and the largest step a chunk linked
// in mid-batch takes from its predecessor
const ORDER_GAP: u64 = 1 << 32;
const ORDER_STEP: u64 = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkId(usize);

/// A byte position inside a specific chunk. Only meaningful while the chain
/// it was taken from has not been edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPosition {
    pub chunk: ChunkId,
    pub offset: usize,
}

/// A (line, byte column) address that survives chunk splits and merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LogicalPosition {
    pub line: usize,
    pub column: usize,
}

impl LogicalPosition {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Position reached after walking over `text` starting here.
    pub fn advance(self, text: &str) -> Self {
        match text.rfind('\n') {
            Some(last) => Self {
                line: self.line + text.matches('\n').count(),
                column: text.len() - last - 1,
            },
            None => Self {
                line: self.line,
                column: self.column + text.len(),
            },
        }
    }
}

pub struct ChunkChain {
    slots: Vec<Option<Chunk>>,
    free_slots: Vec<usize>,
    head: ChunkId,
    tail: ChunkId,
    chunk_count: usize,
    line_count: usize,
    total_width: usize,
    // (chunk, local line, width) of the widest line
    widest: Option<(ChunkId, usize, usize)>,
    capacity: usize,
    tab_width: usize,
    // Earliest chunk whose cached line/width data is out of date
    stale_from: Option<ChunkId>,
}

impl ChunkChain {
    /// Lay `text` out over as few chunks as fit `capacity`. The final line
    /// gets the chain's virtual terminator.
    pub fn from_text(text: &str, capacity: usize, tab_width: usize) -> Self {
        let mut chain = Self {
            slots: Vec::new(),
            free_slots: Vec::new(),
            head: ChunkId(0),
            tail: ChunkId(0),
            chunk_count: 0,
            line_count: 0,
            total_width: 0,
            widest: None,
            capacity,
            tab_width,
            stale_from: None,
        };

        let mut pending = String::with_capacity(capacity);
        for line in text.split('\n') {
            if !pending.is_empty() && pending.len() + line.len() + 1 > capacity {
                chain.push_back(Chunk::new(std::mem::take(&mut pending), capacity));
            }
            pending.push_str(line);
            pending.push('\n');
        }
        chain.push_back(Chunk::new(pending, capacity));

        chain.stale_from = Some(chain.head);
        chain.rescan();
        chain
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn tab_width(&self) -> usize {
        self.tab_width
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub fn head(&self) -> ChunkId {
        self.head
    }

    pub fn tail(&self) -> ChunkId {
        self.tail
    }

    pub fn chunk(&self, id: ChunkId) -> &Chunk {
        match self.slots.get(id.0) {
            Some(Some(chunk)) => chunk,
            _ => panic!("chunk {id:?} is not part of the chain"),
        }
    }

    fn chunk_mut(&mut self, id: ChunkId) -> &mut Chunk {
        match self.slots.get_mut(id.0) {
            Some(Some(chunk)) => chunk,
            _ => panic!("chunk {id:?} is not part of the chain"),
        }
    }

    pub fn is_live(&self, id: ChunkId) -> bool {
        matches!(self.slots.get(id.0), Some(Some(_)))
    }

    pub fn next(&self, id: ChunkId) -> Option<ChunkId> {
        self.chunk(id).next
    }

    pub fn prev(&self, id: ChunkId) -> Option<ChunkId> {
        self.chunk(id).prev
    }

    pub fn chunks(&self) -> Chunks<'_> {
        Chunks {
            chain: self,
            current: Some(self.head),
        }
    }

    /// True when line numbers and widths reflect the latest edit.
    pub fn is_current(&self) -> bool {
        self.stale_from.is_none()
    }

    fn allocate(&mut self, chunk: Chunk) -> ChunkId {
        match self.free_slots.pop() {
            Some(slot) => {
                self.slots[slot] = Some(chunk);
                ChunkId(slot)
            }
            None => {
                self.slots.push(Some(chunk));
                ChunkId(self.slots.len() - 1)
            }
        }
    }

    fn push_back(&mut self, mut chunk: Chunk) -> ChunkId {
        if self.slots.is_empty() {
            let id = self.allocate(chunk);
            self.head = id;
            self.tail = id;
            self.chunk_count = 1;
            return id;
        }
        let tail = self.tail;
        chunk.prev = Some(tail);
        chunk.index = self.chunk_count;
        chunk.order = self.chunk(tail).order + ORDER_GAP;
        let id = self.allocate(chunk);
        self.chunk_mut(tail).next = Some(id);
        self.tail = id;
        self.chunk_count += 1;
        id
    }

    fn link_after(&mut self, after: ChunkId, mut chunk: Chunk) -> ChunkId {
        let next = self.chunk(after).next;
        chunk.prev = Some(after);
        chunk.next = next;
        chunk.order = self.order_after(after);
        let id = self.allocate(chunk);
        self.chunk_mut(after).next = Some(id);
        match next {
            Some(next) => self.chunk_mut(next).prev = Some(id),
            None => self.tail = id,
        }
        self.chunk_count += 1;
        id
    }

    /// An unused order key between `after` and its successor.
    fn order_after(&mut self, after: ChunkId) -> u64 {
        loop {
            let low = self.chunk(after).order;
            let room = match self.chunk(after).next {
                Some(next) => self.chunk(next).order - low,
                None => ORDER_GAP,
            };
            if room > 1 {
                return low + (room / 2).min(ORDER_STEP);
            }
            self.respace();
        }
    }

    /// Spread the order keys out again once two neighbours have run out of
    /// room between them.
    fn respace(&mut self) {
        let mut order = 0;
        let mut current = Some(self.head);
        while let Some(id) = current {
            let chunk = self.chunk_mut(id);
            chunk.order = order;
            order += ORDER_GAP;
            current = chunk.next;
        }
        trace!(chunks = self.chunk_count, "respaced chunk order keys");
    }

    fn unlink(&mut self, id: ChunkId) -> Chunk {
        assert!(
            !(self.head == id && self.tail == id),
            "cannot unlink the only chunk of a document"
        );
        let chunk = match self.slots.get_mut(id.0).and_then(Option::take) {
            Some(chunk) => chunk,
            None => panic!("chunk {id:?} is not part of the chain"),
        };
        match chunk.prev {
            Some(prev) => self.chunk_mut(prev).next = chunk.next,
            None => self.head = chunk.next.unwrap_or(self.head),
        }
        match chunk.next {
            Some(next) => self.chunk_mut(next).prev = chunk.prev,
            None => self.tail = chunk.prev.unwrap_or(self.tail),
        }
        if self.stale_from == Some(id) {
            self.stale_from = chunk.prev.or(chunk.next);
        }
        self.free_slots.push(id.0);
        self.chunk_count -= 1;
        chunk
    }

    fn mark_stale(&mut self, id: ChunkId) {
        let earliest = match self.stale_from {
            Some(stale) if self.is_live(stale) && self.chunk(stale).order <= self.chunk(id).order => stale,
            _ => id,
        };
        self.stale_from = Some(earliest);
    }

    /// Link `chunk` into the chain right after `after`.
    pub fn insert_chunk_after(&mut self, after: ChunkId, mut chunk: Chunk) -> ChunkId {
        chunk.invalidate();
        let lines = chunk.line_count();
        let id = self.link_after(after, chunk);
        self.line_count += lines;
        self.mark_stale(id);
        trace!(chunk = ?id, after = ?after, "inserted chunk");
        id
    }

    /// Unlink `id` from the chain and hand back its contents.
    pub fn remove_chunk(&mut self, id: ChunkId) -> Chunk {
        let chunk = self.unlink(id);
        self.line_count -= chunk.line_count();
        self.mark_stale(chunk.next.or(chunk.prev).unwrap_or(self.head));
        trace!(chunk = ?id, "removed chunk");
        chunk
    }

    /// Bring line numbers, order keys, width totals and the widest-line
    /// pointer up to date. Runs once per edit batch.
    pub fn rescan(&mut self) {
        if let Some(from) = self.stale_from.take() {
            self.rescan_from(from);
        }
    }

    fn rescan_from(&mut self, from: ChunkId) {
        let (mut start_line, mut index, mut order, mut cumulative) = match self.chunk(from).prev {
            None => (0, 0, 0, 0),
            Some(prev) => {
                let prev = self.chunk(prev);
                match (prev.cumulative_width, prev.width()) {
                    (Some(before), Some(width)) => (
                        prev.start_line + prev.line_count(),
                        prev.index + 1,
                        prev.order + ORDER_GAP,
                        before + width,
                    ),
                    _ => return self.rescan_from(self.head),
                }
            }
        };

        let recompute_widest = self
            .widest
            .is_none_or(|(id, _, _)| !self.is_live(id) || self.chunk(id).width().is_none());

        let tab_width = self.tab_width;
        let mut current = Some(from);
        while let Some(id) = current {
            let chunk = self.chunk_mut(id);
            assert!(
                chunk.line_count() > 0 && chunk.len() > 0,
                "empty chunk {id:?} left in the chain"
            );
            chunk.start_line = start_line;
            chunk.index = index;
            chunk.order = order;
            chunk.cumulative_width = Some(cumulative);
            let remeasured = chunk.width().is_none();
            let width = chunk.measure(tab_width);
            let candidate = chunk.widest_line().filter(|_| remeasured);
            start_line += chunk.line_count();
            index += 1;
            order += ORDER_GAP;
            cumulative += width;
            current = chunk.next;

            if let Some((line, line_width)) = candidate {
                if !recompute_widest && self.widest.is_none_or(|(_, _, best)| line_width > best) {
                    self.widest = Some((id, line, line_width));
                }
            }
        }
        self.line_count = start_line;
        self.total_width = cumulative;

        if recompute_widest {
            self.widest = self
                .chunks()
                .filter_map(|(id, chunk)| chunk.widest_line().map(|(line, width)| (id, line, width)))
                .fold(None, |best, candidate| match best {
                    Some((_, _, width)) if width >= candidate.2 => best,
                    _ => Some(candidate),
                });
        }
    }

    /// Sum of the display widths of every line.
    pub fn total_width(&self) -> usize {
        self.total_width
    }

    pub fn max_line_width(&self) -> usize {
        self.widest.map_or(0, |(_, _, width)| width)
    }

    /// Global line number and width of the widest line.
    pub fn widest_line(&self) -> Option<(usize, usize)> {
        debug_assert!(self.is_current());
        self.widest
            .map(|(id, line, width)| (self.chunk(id).start_line + line, width))
    }

    /// Resolve a global line number to its chunk and the line's index inside
    /// it. Walks the chain, so it is valid in the middle of a batch.
    pub fn chunk_for_line(&self, line: usize) -> (ChunkId, usize) {
        let mut remaining = line;
        for (id, chunk) in self.chunks() {
            if remaining < chunk.line_count() {
                return (id, remaining);
            }
            remaining -= chunk.line_count();
        }
        panic!("line {line} is past the end of the document");
    }

    /// Like `chunk_for_line`, but the walk starts at `hint`. Stepping back
    /// reads the cached start lines of `hint` and the chunks before it, so
    /// those must be valid; stepping forward only counts lines.
    pub fn chunk_for_line_near(&self, hint: ChunkId, line: usize) -> (ChunkId, usize) {
        let mut id = hint;
        let mut start = self.chunk(id).start_line;
        while start > line {
            match self.chunk(id).prev {
                Some(prev) => {
                    id = prev;
                    start = self.chunk(id).start_line;
                }
                None => start = 0,
            }
        }
        loop {
            let chunk = self.chunk(id);
            if line - start < chunk.line_count() {
                return (id, line - start);
            }
            start += chunk.line_count();
            id = match chunk.next {
                Some(next) => next,
                None => panic!("line {line} is past the end of the document"),
            };
        }
    }

    pub fn line_text(&self, line: usize) -> &str {
        let (id, local) = self.chunk_for_line(line);
        self.chunk(id).line_text(local)
    }

    pub fn lines(&self, from: usize) -> Lines<'_> {
        let start = (from < self.line_count).then(|| self.chunk_for_line(from));
        Lines {
            chain: self,
            current: start,
        }
    }

    /// Chain position of a logical address.
    pub fn position(&self, at: LogicalPosition) -> TextPosition {
        let (id, local) = self.chunk_for_line(at.line);
        self.position_in(id, local, at)
    }

    /// `position`, looking the line up from `hint`.
    pub fn position_near(&self, hint: ChunkId, at: LogicalPosition) -> TextPosition {
        let (id, local) = self.chunk_for_line_near(hint, at.line);
        self.position_in(id, local, at)
    }

    fn position_in(&self, id: ChunkId, local: usize, at: LogicalPosition) -> TextPosition {
        let chunk = self.chunk(id);
        let start = chunk.line_start(local);
        assert!(
            start + at.column <= chunk.line_end(local),
            "column {} is past the end of line {}",
            at.column,
            at.line
        );
        TextPosition {
            chunk: id,
            offset: start + at.column,
        }
    }

    /// Logical address of a chain position. Needs up-to-date line caches.
    pub fn logical(&self, position: TextPosition) -> LogicalPosition {
        debug_assert!(self.is_current(), "line numbers are stale until the chain is rescanned");
        let chunk = self.chunk(position.chunk);
        let local = chunk.line_of_offset(position.offset);
        LogicalPosition {
            line: chunk.start_line + local,
            column: position.offset - chunk.line_start(local),
        }
    }

    /// Pull a logical address back inside the document onto a character
    /// boundary.
    pub fn clamp(&self, at: LogicalPosition) -> LogicalPosition {
        let line = at.line.min(self.line_count.saturating_sub(1));
        snap_column(self.line_text(line), line, at.column)
    }

    /// `position(clamp(at))`, looking the line up from `hint`. Needs current
    /// line caches.
    pub fn clamped_position_near(&self, hint: ChunkId, at: LogicalPosition) -> TextPosition {
        let line = at.line.min(self.line_count.saturating_sub(1));
        let (id, local) = self.chunk_for_line_near(hint, line);
        let at = snap_column(self.chunk(id).line_text(local), line, at.column);
        self.position_in(id, local, at)
    }

    /// Ordering key: chunk order key first, then offset, so positions on
    /// either side of a fresh split compare correctly.
    pub fn compare(&self, a: TextPosition, b: TextPosition) -> Ordering {
        (self.chunk(a.chunk).order, a.offset).cmp(&(self.chunk(b.chunk).order, b.offset))
    }

    pub fn start_of_document(&self) -> TextPosition {
        TextPosition {
            chunk: self.head,
            offset: 0,
        }
    }

    /// The virtual terminator of the last line.
    pub fn end_of_document(&self) -> TextPosition {
        TextPosition {
            chunk: self.tail,
            offset: self.chunk(self.tail).len() - 1,
        }
    }

    pub fn byte_at(&self, position: TextPosition) -> u8 {
        self.chunk(position.chunk).as_bytes()[position.offset]
    }

    /// Next character position, crossing into the following chunk.
    pub fn next_char(&self, position: TextPosition) -> Option<TextPosition> {
        let chunk = self.chunk(position.chunk);
        let step = utf8_char_len(chunk.as_bytes()[position.offset]);
        if position.offset + step < chunk.len() {
            return Some(TextPosition {
                chunk: position.chunk,
                offset: position.offset + step,
            });
        }
        chunk.next.map(|next| TextPosition { chunk: next, offset: 0 })
    }

    /// Previous character position, crossing into the preceding chunk.
    pub fn prev_char(&self, position: TextPosition) -> Option<TextPosition> {
        if position.offset > 0 {
            let bytes = self.chunk(position.chunk).as_bytes();
            return Some(TextPosition {
                chunk: position.chunk,
                offset: prev_char_boundary(bytes, position.offset),
            });
        }
        self.chunk(position.chunk).prev.map(|prev| TextPosition {
            chunk: prev,
            offset: self.chunk(prev).len() - 1,
        })
    }

    /// Start and terminator positions of the line containing `position`.
    pub fn line_bounds(&self, position: TextPosition) -> (TextPosition, TextPosition) {
        let chunk = self.chunk(position.chunk);
        let local = chunk.line_of_offset(position.offset);
        (
            TextPosition {
                chunk: position.chunk,
                offset: chunk.line_start(local),
            },
            TextPosition {
                chunk: position.chunk,
                offset: chunk.line_end(local),
            },
        )
    }

    pub fn text_between(&self, begin: TextPosition, end: TextPosition) -> String {
        if begin.chunk == end.chunk {
            return self.chunk(begin.chunk).as_str()[begin.offset..end.offset].to_string();
        }
        let mut text = self.chunk(begin.chunk).as_str()[begin.offset..].to_string();
        let mut current = self.next(begin.chunk);
        while let Some(id) = current {
            if id == end.chunk {
                text.push_str(&self.chunk(id).as_str()[..end.offset]);
                break;
            }
            text.push_str(self.chunk(id).as_str());
            current = self.next(id);
        }
        text
    }

    /// Whole document text, without the virtual terminator.
    pub fn text(&self) -> String {
        let mut text: String = self.chunks().map(|(_, chunk)| chunk.as_str()).collect();
        text.pop();
        text
    }

    /// Replace `[begin, end)` with `text`. The chunks covering the range are
    /// coalesced, edited, split back to capacity, and merged with the next
    /// chunk when the result is small. The returned `Splice` remaps any
    /// position taken before the edit.
    pub fn splice(&mut self, begin: TextPosition, end: TextPosition, text: &str) -> Splice {
        assert!(
            self.compare(begin, end) != Ordering::Greater,
            "splice range ends before it begins"
        );
        let first = begin.chunk;
        let mut span = vec![(first, 0)];
        let mut combined = self.chunk(first).len();
        let mut current = first;
        while current != end.chunk {
            current = match self.next(current) {
                Some(next) => next,
                None => panic!("splice end {end:?} is not reachable from {begin:?}"),
            };
            span.push((current, combined));
            combined += self.chunk(current).len();
        }
        let start = begin.offset;
        let stop = span[span.len() - 1].1 + end.offset;
        let mut lines_before: usize = span.iter().map(|&(id, _)| self.chunk(id).line_count()).sum();

        let projected = combined - (stop - start) + text.len();
        let merge_next = self
            .next(end.chunk)
            .filter(|&next| projected < self.capacity / 4 && projected + self.chunk(next).len() <= self.capacity);

        if span.len() == 1 {
            self.chunk_mut(first).delete_range(start, stop);
        } else {
            let mut carried = String::new();
            for &(id, _) in &span[1..] {
                let chunk = self.unlink(id);
                if id == end.chunk {
                    carried.push_str(&chunk.as_str()[end.offset..]);
                }
            }
            self.chunk_mut(first).replace_tail(start, &carried);
        }
        if let Some(next) = merge_next {
            span.push((next, combined));
            let chunk = self.unlink(next);
            lines_before += chunk.line_count();
            let len = self.chunk(first).len();
            self.chunk_mut(first).replace_tail(len, chunk.as_str());
            trace!(chunk = ?first, merged = ?next, "merged chunk");
        }

        let mut pieces = vec![(first, 0)];
        let mut overflow = self.chunk_mut(first).insert(start, text);
        let mut last = first;
        let mut base = 0;
        while let Some(ChunkSplit {
            mut new_chunk,
            split_point,
        }) = overflow
        {
            base += split_point;
            overflow = new_chunk.split_overflow();
            let id = self.link_after(last, new_chunk);
            // Counted on from `first`, so lookups may start from any piece
            let start_line = self.chunk(last).start_line + self.chunk(last).line_count();
            self.chunk_mut(id).start_line = start_line;
            trace!(chunk = ?last, new_chunk = ?id, split_point, "split chunk");
            pieces.push((id, base));
            last = id;
        }

        let lines_after: usize = pieces.iter().map(|&(id, _)| self.chunk(id).line_count()).sum();
        self.line_count = self.line_count + lines_after - lines_before;
        self.mark_stale(first);

        Splice {
            span,
            start,
            stop,
            inserted: text.len(),
            pieces,
        }
    }

    /// Line ranges `(first, last)` of chunks edited since the last call.
    pub fn take_reparse_ranges(&mut self) -> Vec<(usize, usize)> {
        debug_assert!(self.is_current());
        let mut ranges: Vec<(usize, usize)> = Vec::new();
        let mut current = Some(self.head);
        while let Some(id) = current {
            let chunk = self.chunk_mut(id);
            current = chunk.next;
            if !chunk.needs_reparse {
                continue;
            }
            chunk.needs_reparse = false;
            let first = chunk.start_line;
            let last = first + chunk.line_count() - 1;
            match ranges.last_mut() {
                Some(range) if range.1 + 1 == first => range.1 = last,
                _ => ranges.push((first, last)),
            }
        }
        ranges
    }

    /// Panics if any structural invariant is broken.
    pub fn check_invariants(&self) {
        let mut expected_line = 0;
        let mut prev: Option<ChunkId> = None;
        let mut count = 0;
        for (id, chunk) in self.chunks() {
            assert_eq!(chunk.prev, prev, "broken back link at {id:?}");
            assert!(chunk.as_str().ends_with('\n'), "chunk {id:?} does not end with a newline");
            assert!(chunk.line_count() > 0);
            if let Some(prev) = prev {
                assert!(self.chunk(prev).order < chunk.order, "order key out of sequence at {id:?}");
            }
            if self.is_current() {
                assert_eq!(chunk.index, count, "stale index at {id:?}");
                assert_eq!(chunk.start_line, expected_line, "stale start line at {id:?}");
            }
            expected_line += chunk.line_count();
            count += 1;
            prev = Some(id);
        }
        assert_eq!(prev, Some(self.tail));
        assert_eq!(count, self.chunk_count);
        assert_eq!(expected_line, self.line_count);
    }
}

/// `column` pulled back inside `text` onto a character boundary.
fn snap_column(text: &str, line: usize, column: usize) -> LogicalPosition {
    let mut column = column.min(text.len());
    while !text.is_char_boundary(column) {
        column -= 1;
    }
    LogicalPosition { line, column }
}

/// Maps positions taken before a `ChunkChain::splice` onto the edited chain.
#[derive(Debug)]
pub struct Splice {
    // Chunks that were coalesced, with their base offset in the combined span
    span: Vec<(ChunkId, usize)>,
    start: usize,
    stop: usize,
    inserted: usize,
    // Chunks that now hold the span, with their base offset
    pieces: Vec<(ChunkId, usize)>,
}

impl Splice {
    /// Where `position` ends up. Positions inside the replaced range collapse
    /// to its start; positions at or after its end shift by the size change.
    pub fn remap(&self, position: TextPosition) -> TextPosition {
        let Some(&(_, base)) = self.span.iter().find(|(id, _)| *id == position.chunk) else {
            return position;
        };
        let offset = base + position.offset;
        let mapped = if offset >= self.stop {
            offset - (self.stop - self.start) + self.inserted
        } else if offset > self.start {
            self.start
        } else {
            offset
        };
        self.locate(mapped)
    }

    /// Like `remap`, but a position sitting exactly on the start of the
    /// replaced range stays in front of the inserted text. Used for the
    /// bounds of edits that precede this one.
    pub fn remap_preceding(&self, position: TextPosition) -> TextPosition {
        match self.span.iter().find(|(id, _)| *id == position.chunk) {
            Some(&(_, base)) if base + position.offset <= self.start => {
                self.locate(base + position.offset)
            }
            _ => self.remap(position),
        }
    }

    fn locate(&self, offset: usize) -> TextPosition {
        let piece = self.pieces.partition_point(|&(_, base)| base <= offset) - 1;
        let (chunk, base) = self.pieces[piece];
        TextPosition {
            chunk,
            offset: offset - base,
        }
    }

    /// The chunk the edit started in. It survives the splice and keeps its
    /// start line.
    pub fn first(&self) -> ChunkId {
        self.span[0].0
    }

    /// Start of the inserted text.
    pub fn start(&self) -> TextPosition {
        self.locate(self.start)
    }

    /// End of the inserted text.
    pub fn end(&self) -> TextPosition {
        self.locate(self.start + self.inserted)
    }
}

pub struct Chunks<'a> {
    chain: &'a ChunkChain,
    current: Option<ChunkId>,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = (ChunkId, &'a Chunk);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current?;
        let chunk = self.chain.chunk(id);
        self.current = chunk.next;
        Some((id, chunk))
    }
}

/// Lazy forward iterator over document lines, without terminators.
pub struct Lines<'a> {
    chain: &'a ChunkChain,
    current: Option<(ChunkId, usize)>,
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let (id, local) = self.current?;
        let chunk = self.chain.chunk(id);
        self.current = if local + 1 < chunk.line_count() {
            Some((id, local + 1))
        } else {
            chunk.next.map(|next| (next, 0))
        };
        Some(chunk.line_text(local))
    }
}
