//! Carets and selections.
//!
//! Outside the document lock a cursor is a pair of logical positions
//! (`CursorData`). While an operation holds the lock the pair is resolved
//! into chain positions (`Cursor`) so motions and edits can walk chunk bytes
//! directly.

use super::chunk_chain::{ChunkChain, ChunkId, LogicalPosition, Splice, TextPosition};
use super::text_metrics::{CharacterClass, character_class, display_width, offset_for_width};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Character(Direction),
    Word(Direction),
    /// Move by a signed number of lines, keeping the display column.
    Line(isize),
    StartOfLine,
    EndOfLine,
    StartOfDocument,
    EndOfDocument,
}

/// A cursor expressed in (line, column) terms. `anchor` is the fixed end of
/// the selection and `active` the end that moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorData {
    pub anchor: LogicalPosition,
    pub active: LogicalPosition,
}

impl CursorData {
    pub fn caret(line: usize, column: usize) -> Self {
        let at = LogicalPosition::new(line, column);
        Self {
            anchor: at,
            active: at,
        }
    }

    pub fn selection(anchor: LogicalPosition, active: LogicalPosition) -> Self {
        Self { anchor, active }
    }

    pub fn begin(&self) -> LogicalPosition {
        self.anchor.min(self.active)
    }

    pub fn end(&self) -> LogicalPosition {
        self.anchor.max(self.active)
    }

    pub fn has_selection(&self) -> bool {
        self.anchor != self.active
    }
}

/// The caller-owned cursor set of an editing session.
#[derive(Debug, Clone, Default)]
pub struct CursorSet {
    cursors: Vec<CursorData>,
    // Cached display column for vertical motion, one per cursor
    x_positions: Vec<Option<usize>>,
}

impl CursorSet {
    pub fn new(cursors: Vec<CursorData>) -> Self {
        let x_positions = vec![None; cursors.len()];
        Self {
            cursors,
            x_positions,
        }
    }

    pub fn caret(line: usize, column: usize) -> Self {
        Self::new(vec![CursorData::caret(line, column)])
    }

    pub fn push(&mut self, cursor: CursorData) {
        self.cursors.push(cursor);
        self.x_positions.push(None);
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    pub fn as_slice(&self) -> &[CursorData] {
        &self.cursors
    }

    pub fn primary(&self) -> Option<&CursorData> {
        self.cursors.first()
    }

    pub(crate) fn resolve(&self, chain: &ChunkChain) -> Vec<Cursor> {
        let mut hint = chain.head();
        self.cursors
            .iter()
            .zip(&self.x_positions)
            .map(|(data, x_position)| {
                let cursor = Cursor::resolve_near(chain, data, *x_position, hint);
                hint = cursor.active.chunk;
                cursor
            })
            .collect()
    }

    pub(crate) fn store(&mut self, chain: &ChunkChain, cursors: &[Cursor]) {
        self.cursors = cursors.iter().map(|cursor| cursor.data(chain)).collect();
        self.x_positions = cursors.iter().map(|cursor| cursor.x_position).collect();
    }

    pub(crate) fn replace(&mut self, cursors: Vec<CursorData>) {
        *self = Self::new(cursors);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Cursor {
    pub anchor: TextPosition,
    pub active: TextPosition,
    x_position: Option<usize>,
}

impl Cursor {
    pub fn new(position: TextPosition) -> Self {
        Self {
            anchor: position,
            active: position,
            x_position: None,
        }
    }

    pub fn with_selection(anchor: TextPosition, active: TextPosition) -> Self {
        Self {
            anchor,
            active,
            x_position: None,
        }
    }

    /// Resolve logical data against the chain, clamping positions that fell
    /// outside the document.
    pub fn resolve(chain: &ChunkChain, data: &CursorData, x_position: Option<usize>) -> Self {
        Self::resolve_near(chain, data, x_position, chain.head())
    }

    /// `resolve`, starting the line lookups at `hint`. Needs current line
    /// caches.
    pub fn resolve_near(chain: &ChunkChain, data: &CursorData, x_position: Option<usize>, hint: ChunkId) -> Self {
        let anchor = chain.clamped_position_near(hint, data.anchor);
        Self {
            anchor,
            active: chain.clamped_position_near(anchor.chunk, data.active),
            x_position,
        }
    }

    pub fn data(&self, chain: &ChunkChain) -> CursorData {
        CursorData {
            anchor: chain.logical(self.anchor),
            active: chain.logical(self.active),
        }
    }

    pub fn x_position(&self) -> Option<usize> {
        self.x_position
    }

    pub fn has_selection(&self) -> bool {
        self.anchor != self.active
    }

    fn is_reversed(&self, chain: &ChunkChain) -> bool {
        chain.compare(self.active, self.anchor).is_lt()
    }

    pub fn begin(&self, chain: &ChunkChain) -> TextPosition {
        if self.is_reversed(chain) { self.active } else { self.anchor }
    }

    pub fn end(&self, chain: &ChunkChain) -> TextPosition {
        if self.is_reversed(chain) { self.anchor } else { self.active }
    }

    pub fn selected_text(&self, chain: &ChunkChain) -> String {
        chain.text_between(self.begin(chain), self.end(chain))
    }

    fn move_active(&mut self, position: TextPosition, extend_selection: bool) {
        self.active = position;
        if !extend_selection {
            self.anchor = position;
        }
        self.x_position = None;
    }

    pub fn apply_motion(&mut self, chain: &ChunkChain, motion: Motion, extend_selection: bool) {
        match motion {
            Motion::Character(direction) if extend_selection => {
                self.offset_selection_character(chain, direction)
            }
            Motion::Character(direction) => self.offset_character(chain, direction),
            Motion::Word(direction) if extend_selection => self.offset_selection_word(chain, direction),
            Motion::Word(direction) => self.offset_word(chain, direction),
            Motion::Line(lines) => self.shift_line(chain, lines, extend_selection),
            Motion::StartOfLine => {
                let (start, _) = chain.line_bounds(self.active);
                self.move_active(start, extend_selection);
            }
            Motion::EndOfLine => {
                let (_, end) = chain.line_bounds(self.active);
                self.move_active(end, extend_selection);
            }
            Motion::StartOfDocument => self.move_active(chain.start_of_document(), extend_selection),
            Motion::EndOfDocument => self.move_active(chain.end_of_document(), extend_selection),
        }
    }

    /// Move one character. A selection collapses to its edge instead.
    pub fn offset_character(&mut self, chain: &ChunkChain, direction: Direction) {
        if self.has_selection() {
            let edge = match direction {
                Direction::Left => self.begin(chain),
                Direction::Right => self.end(chain),
            };
            self.move_active(edge, false);
            return;
        }
        let target = step_character(chain, self.active, direction);
        self.move_active(target, false);
    }

    pub fn offset_selection_character(&mut self, chain: &ChunkChain, direction: Direction) {
        let target = step_character(chain, self.active, direction);
        self.move_active(target, true);
    }

    pub fn offset_word(&mut self, chain: &ChunkChain, direction: Direction) {
        let target = step_word(chain, self.active, direction);
        self.move_active(target, false);
    }

    pub fn offset_selection_word(&mut self, chain: &ChunkChain, direction: Direction) {
        let target = step_word(chain, self.active, direction);
        self.move_active(target, true);
    }

    pub fn offset_line(&mut self, chain: &ChunkChain, lines: isize) {
        self.shift_line(chain, lines, false);
    }

    pub fn offset_selection_line(&mut self, chain: &ChunkChain, lines: isize) {
        self.shift_line(chain, lines, true);
    }

    fn shift_line(&mut self, chain: &ChunkChain, lines: isize, extend_selection: bool) {
        let current = chain.logical(self.active);
        let last_line = chain.line_count() - 1;
        let target = current.line.saturating_add_signed(lines).min(last_line);
        if target == current.line {
            // Already on the first or last line
            let (start, end) = chain.line_bounds(self.active);
            let edge = match lines.signum() {
                -1 => start,
                1 => end,
                _ => self.active,
            };
            self.move_active(edge, extend_selection);
            return;
        }

        let tab_width = chain.tab_width();
        let x = self.x_position.unwrap_or_else(|| {
            display_width(&chain.line_text(current.line)[..current.column], tab_width)
        });
        let column = offset_for_width(chain.line_text(target), x, tab_width);
        self.move_active(chain.position(LogicalPosition::new(target, column)), extend_selection);
        self.x_position = Some(x);
    }

    pub fn select_start_of_line(&mut self, chain: &ChunkChain) {
        self.apply_motion(chain, Motion::StartOfLine, true);
    }

    pub fn select_end_of_line(&mut self, chain: &ChunkChain) {
        self.apply_motion(chain, Motion::EndOfLine, true);
    }

    pub fn offset_start_of_line(&mut self, chain: &ChunkChain) {
        self.apply_motion(chain, Motion::StartOfLine, false);
    }

    pub fn offset_end_of_line(&mut self, chain: &ChunkChain) {
        self.apply_motion(chain, Motion::EndOfLine, false);
    }

    /// Select the run of same-class characters around the caret. Text wins
    /// over whitespace and punctuation when the caret sits between classes.
    pub fn select_word(&mut self, chain: &ChunkChain) {
        let position = self.active;
        let bytes = chain.chunk(position.chunk).as_bytes();
        let offset = position.offset;
        let left = (offset > 0 && bytes[offset - 1] != b'\n').then(|| character_class(bytes[offset - 1]));
        let right = (bytes[offset] != b'\n').then(|| character_class(bytes[offset]));
        let class = match (left, right) {
            (Some(CharacterClass::Text), _) | (_, Some(CharacterClass::Text)) => CharacterClass::Text,
            (Some(class), _) | (None, Some(class)) => class,
            (None, None) => {
                self.move_active(position, false);
                return;
            }
        };

        let mut start = offset;
        while start > 0 && bytes[start - 1] != b'\n' && character_class(bytes[start - 1]) == class {
            start -= 1;
        }
        let mut end = offset;
        while bytes[end] != b'\n' && character_class(bytes[end]) == class {
            end += 1;
        }
        self.anchor = TextPosition {
            chunk: position.chunk,
            offset: start,
        };
        self.active = TextPosition {
            chunk: position.chunk,
            offset: end,
        };
        self.x_position = None;
    }

    /// Select every line the cursor touches, including the final terminator.
    pub fn select_line(&mut self, chain: &ChunkChain) {
        let (start, _) = chain.line_bounds(self.begin(chain));
        let (_, terminator) = chain.line_bounds(self.end(chain));
        self.anchor = start;
        self.active = step_character(chain, terminator, Direction::Right);
        self.x_position = None;
    }

    /// Two cursors overlap when their ranges intersect or touch.
    pub fn overlaps_with(&self, other: &Cursor, chain: &ChunkChain) -> bool {
        chain.compare(self.begin(chain), other.end(chain)).is_le()
            && chain.compare(other.begin(chain), self.end(chain)).is_le()
    }

    /// Grow to the union of both ranges. The active end follows the
    /// direction this cursor was selecting in, or `other`'s when this one is
    /// a bare caret.
    pub fn merge(&mut self, other: &Cursor, chain: &ChunkChain) {
        let begin = if chain.compare(self.begin(chain), other.begin(chain)).is_le() {
            self.begin(chain)
        } else {
            other.begin(chain)
        };
        let end = if chain.compare(self.end(chain), other.end(chain)).is_ge() {
            self.end(chain)
        } else {
            other.end(chain)
        };
        let leftward = if self.has_selection() {
            self.is_reversed(chain)
        } else {
            other.is_reversed(chain)
        };
        if leftward {
            self.anchor = end;
            self.active = begin;
        } else {
            self.anchor = begin;
            self.active = end;
        }
    }

    pub fn remap(&mut self, splice: &Splice) {
        self.anchor = splice.remap(self.anchor);
        self.active = splice.remap(self.active);
    }
}

fn step_character(chain: &ChunkChain, position: TextPosition, direction: Direction) -> TextPosition {
    match direction {
        Direction::Left => chain.prev_char(position),
        Direction::Right => chain.next_char(position),
    }
    .unwrap_or(position)
}

/// Skip a run of one character class. At a line edge this is a single
/// character step onto the neighbouring line.
fn step_word(chain: &ChunkChain, position: TextPosition, direction: Direction) -> TextPosition {
    let bytes = chain.chunk(position.chunk).as_bytes();
    let mut offset = position.offset;
    match direction {
        Direction::Right => {
            if bytes[offset] == b'\n' {
                return step_character(chain, position, direction);
            }
            let class = character_class(bytes[offset]);
            while bytes[offset] != b'\n' && character_class(bytes[offset]) == class {
                offset += 1;
            }
        }
        Direction::Left => {
            if offset == 0 || bytes[offset - 1] == b'\n' {
                return step_character(chain, position, direction);
            }
            let class = character_class(bytes[offset - 1]);
            while offset > 0 && bytes[offset - 1] != b'\n' && character_class(bytes[offset - 1]) == class {
                offset -= 1;
            }
        }
    }
    TextPosition {
        chunk: position.chunk,
        offset,
    }
}

/// Sort cursors by position and merge every overlapping pair. Once sorted
/// only neighbours can overlap, so one pass suffices.
pub fn normalize_cursors(chain: &ChunkChain, cursors: &mut Vec<Cursor>) {
    cursors.sort_by(|a, b| {
        chain
            .compare(a.begin(chain), b.begin(chain))
            .then_with(|| chain.compare(a.end(chain), b.end(chain)))
    });
    let mut merged: Vec<Cursor> = Vec::with_capacity(cursors.len());
    for cursor in cursors.drain(..) {
        match merged.last_mut() {
            Some(last) if last.overlaps_with(&cursor, chain) => last.merge(&cursor, chain),
            _ => merged.push(cursor),
        }
    }
    *cursors = merged;
}

pub fn cursors_have_selection(cursors: &[Cursor]) -> bool {
    cursors.iter().any(Cursor::has_selection)
}
