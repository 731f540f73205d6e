//! A bounded block of text holding whole lines.
//!
//! Every chunk ends with `'\n'`, so a line never straddles two chunks. The
//! chunk keeps the byte offset of each of its line starts plus a lazily
//! measured display width per line.

use super::chunk_chain::ChunkId;
use super::text_metrics::display_width;

/// Produced when an insertion pushes a chunk past its capacity. `new_chunk`
/// holds everything from `split_point` onward and belongs right after the
/// chunk that was split.
#[derive(Debug)]
pub struct ChunkSplit {
    pub new_chunk: Chunk,
    pub split_point: usize,
}

#[derive(Debug, Clone)]
pub struct Chunk {
    text: String,
    // Current allowance; grows past `base_capacity` only for a line that
    // cannot be split
    capacity: usize,
    base_capacity: usize,
    line_starts: Vec<usize>,
    line_widths: Vec<usize>,
    // Total display width of the chunk's lines, None until measured
    width: Option<usize>,
    pub(crate) start_line: usize,
    pub(crate) index: usize,
    // Sparse ordering key, exact even between rescans
    pub(crate) order: u64,
    pub(crate) cumulative_width: Option<usize>,
    pub(crate) needs_reparse: bool,
    pub(crate) prev: Option<ChunkId>,
    pub(crate) next: Option<ChunkId>,
}

impl Chunk {
    pub fn new(text: String, capacity: usize) -> Self {
        assert!(text.ends_with('\n'), "chunk text must end with a newline");
        let mut chunk = Self {
            capacity: capacity.max(text.len()),
            text,
            base_capacity: capacity,
            line_starts: Vec::new(),
            line_widths: Vec::new(),
            width: None,
            start_line: 0,
            index: 0,
            order: 0,
            cumulative_width: None,
            needs_reparse: true,
            prev: None,
            next: None,
        };
        chunk.reindex_lines();
        chunk
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    pub fn line_start(&self, local_line: usize) -> usize {
        self.line_starts[local_line]
    }

    /// Offset of the `'\n'` that terminates `local_line`.
    pub fn line_end(&self, local_line: usize) -> usize {
        match self.line_starts.get(local_line + 1) {
            Some(next_start) => next_start - 1,
            None => self.text.len() - 1,
        }
    }

    pub fn line_text(&self, local_line: usize) -> &str {
        &self.text[self.line_start(local_line)..self.line_end(local_line)]
    }

    /// Local line containing `offset`.
    pub fn line_of_offset(&self, offset: usize) -> usize {
        assert!(offset < self.text.len(), "offset {offset} outside chunk of {} bytes", self.text.len());
        self.line_starts.partition_point(|&start| start <= offset) - 1
    }

    pub fn width(&self) -> Option<usize> {
        self.width
    }

    pub fn line_width(&self, local_line: usize) -> Option<usize> {
        self.width?;
        self.line_widths.get(local_line).copied()
    }

    /// Widest line of this chunk as `(local_line, width)`.
    pub fn widest_line(&self) -> Option<(usize, usize)> {
        self.width?;
        self.line_widths
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
    }

    /// Measure every line if the cached widths are stale.
    pub fn measure(&mut self, tab_width: usize) -> usize {
        if let Some(width) = self.width {
            return width;
        }
        self.line_widths = (0..self.line_count())
            .map(|line| display_width(self.line_text(line), tab_width))
            .collect();
        let width = self.line_widths.iter().sum();
        self.width = Some(width);
        width
    }

    pub(crate) fn invalidate(&mut self) {
        self.width = None;
        self.cumulative_width = None;
        self.needs_reparse = true;
    }

    /// Insert `text` at `offset`. Returns the overflow when the chunk no longer
    /// fits its capacity.
    pub fn insert(&mut self, offset: usize, text: &str) -> Option<ChunkSplit> {
        assert!(offset < self.text.len(), "insert offset {offset} outside chunk of {} bytes", self.text.len());
        if !text.is_empty() {
            self.text.insert_str(offset, text);
            self.reindex_lines();
            self.invalidate();
        }
        self.split_overflow()
    }

    /// Remove `[start, end)` and return how many lines disappeared.
    pub fn delete_range(&mut self, start: usize, end: usize) -> usize {
        assert!(start <= end && end < self.text.len(), "delete range {start}..{end} outside chunk of {} bytes", self.text.len());
        if start == end {
            return 0;
        }
        let lines_before = self.line_count();
        self.text.drain(start..end);
        self.reindex_lines();
        self.invalidate();
        lines_before - self.line_count()
    }

    /// Raise the capacity so this chunk can hold at least `min_capacity` bytes.
    pub fn extend(&mut self, min_capacity: usize) {
        if min_capacity > self.capacity {
            self.capacity = min_capacity;
        }
        self.text.reserve(self.capacity.saturating_sub(self.text.len()));
    }

    /// Drop everything from `from` onward and append `tail` in its place.
    /// Used when a deletion swallows the rest of this chunk and part of the
    /// chunks after it, or when a neighbour is merged in.
    pub(crate) fn replace_tail(&mut self, from: usize, tail: &str) {
        assert!(from <= self.text.len(), "tail offset {from} outside chunk of {} bytes", self.text.len());
        assert!(tail.ends_with('\n') || (tail.is_empty() && from == self.text.len()));
        self.text.truncate(from);
        self.extend(from + tail.len());
        self.text.push_str(tail);
        self.reindex_lines();
        self.invalidate();
    }

    /// Split off whatever no longer fits. The split lands on a line start so
    /// both halves keep ending with `'\n'`; a single oversized line stays put
    /// and the chunk is extended instead.
    pub(crate) fn split_overflow(&mut self) -> Option<ChunkSplit> {
        self.capacity = self.base_capacity;
        if self.text.len() <= self.capacity {
            return None;
        }
        let split_point = match self.line_starts[1..]
            .iter()
            .rev()
            .find(|&&start| start <= self.capacity)
        {
            Some(&start) => start,
            None => match self.line_starts.get(1) {
                Some(&start) => start,
                None => {
                    self.extend(self.text.len());
                    return None;
                }
            },
        };
        let tail = self.text.split_off(split_point);
        self.reindex_lines();
        self.invalidate();
        // The first line alone may still exceed the bound
        self.extend(self.text.len());
        let new_chunk = Chunk::new(tail, self.base_capacity);
        Some(ChunkSplit {
            new_chunk,
            split_point,
        })
    }

    fn reindex_lines(&mut self) {
        self.line_starts.clear();
        self.line_starts.push(0);
        let last = self.text.len().saturating_sub(1);
        self.line_starts.extend(
            self.text
                .bytes()
                .enumerate()
                .filter(|&(offset, byte)| byte == b'\n' && offset < last)
                .map(|(offset, _)| offset + 1),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_index() {
        let chunk = Chunk::new("ab\n\ncd\n".to_string(), 64);
        assert_eq!(chunk.line_count(), 3);
        assert_eq!(chunk.line_text(0), "ab");
        assert_eq!(chunk.line_text(1), "");
        assert_eq!(chunk.line_text(2), "cd");
        assert_eq!(chunk.line_end(2), 6);
        assert_eq!(chunk.line_of_offset(0), 0);
        assert_eq!(chunk.line_of_offset(2), 0);
        assert_eq!(chunk.line_of_offset(3), 1);
        assert_eq!(chunk.line_of_offset(6), 2);
    }

    #[test]
    fn test_insert_within_capacity() {
        let mut chunk = Chunk::new("hello\n".to_string(), 64);
        assert!(chunk.insert(5, " world\nagain").is_none());
        assert_eq!(chunk.as_str(), "hello world\nagain\n");
        assert_eq!(chunk.line_count(), 2);
        assert!(chunk.width().is_none());
    }

    #[test]
    fn test_insert_splits_on_line_boundary() {
        let mut chunk = Chunk::new("aaaa\nbbbb\n".to_string(), 12);
        let split = chunk.insert(10 - 1, "\ncccc").expect("overflow should split");
        assert_eq!(split.split_point, 10);
        assert_eq!(chunk.as_str(), "aaaa\nbbbb\n");
        assert_eq!(split.new_chunk.as_str(), "cccc\n");
        assert!(chunk.as_str().ends_with('\n'));
    }

    #[test]
    fn test_oversized_first_line_splits_after_it() {
        let mut chunk = Chunk::new("x\n".to_string(), 8);
        let split = chunk.insert(0, "0123456789\nyz").expect("overflow should split");
        assert_eq!(chunk.as_str(), "0123456789\n");
        assert_eq!(split.new_chunk.as_str(), "yzx\n");
        assert!(chunk.capacity() >= chunk.len());
        assert_eq!(split.new_chunk.capacity(), 8);
    }

    #[test]
    fn test_single_long_line_extends_in_place() {
        let mut chunk = Chunk::new("\n".to_string(), 4);
        assert!(chunk.insert(0, "abcdefghij").is_none());
        assert_eq!(chunk.as_str(), "abcdefghij\n");
        assert!(chunk.capacity() >= chunk.len());
    }

    #[test]
    fn test_delete_range_reports_lines() {
        let mut chunk = Chunk::new("one\ntwo\nthree\n".to_string(), 64);
        assert_eq!(chunk.delete_range(2, 9), 2);
        assert_eq!(chunk.as_str(), "onhree\n");
        assert_eq!(chunk.delete_range(1, 1), 0);
    }

    #[test]
    fn test_replace_tail_joins_neighbour() {
        let mut chunk = Chunk::new("abc\ndef\n".to_string(), 64);
        chunk.replace_tail(5, "xyz\nmore\n");
        assert_eq!(chunk.as_str(), "abc\ndxyz\nmore\n");
        assert_eq!(chunk.line_count(), 3);
    }

    #[test]
    fn test_measure_caches_widths() {
        let mut chunk = Chunk::new("ab\n\tx\n".to_string(), 64);
        assert_eq!(chunk.line_width(1), None);
        assert_eq!(chunk.measure(4), 7);
        assert_eq!(chunk.line_width(0), Some(2));
        assert_eq!(chunk.widest_line(), Some((1, 5)));
    }

    #[test]
    #[should_panic]
    fn test_insert_out_of_bounds_panics() {
        let mut chunk = Chunk::new("ab\n".to_string(), 64);
        chunk.insert(3, "x");
    }
}
