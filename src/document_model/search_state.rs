use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use regex::{Regex, RegexBuilder};
use thiserror::Error;
use tracing::debug;

use super::chunk_chain::{ChunkChain, LogicalPosition};
use super::document::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDirection {
    Forward,
    Backward,
}

/// A half-open range of logical positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRange {
    pub start: LogicalPosition,
    pub end: LogicalPosition,
}

impl TextRange {
    pub fn new(start: LogicalPosition, end: LogicalPosition) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub pattern: String,
    pub direction: SearchDirection,
    pub regex: bool,
    pub match_case: bool,
    pub wrap: bool,
}

impl SearchQuery {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            direction: SearchDirection::Forward,
            regex: false,
            match_case: false, // Case insensitive unless asked
            wrap: true,
        }
    }

    pub fn direction(mut self, direction: SearchDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn regex(mut self, regex: bool) -> Self {
        self.regex = regex;
        self
    }

    pub fn match_case(mut self, match_case: bool) -> Self {
        self.match_case = match_case;
        self
    }

    pub fn wrap(mut self, wrap: bool) -> Self {
        self.wrap = wrap;
        self
    }

    pub fn compile(&self) -> Result<Regex, SearchError> {
        if self.pattern.is_empty() {
            return Err(SearchError::NoPattern);
        }
        // Escape special regex characters for literal search
        let pattern = if self.regex {
            self.pattern.clone()
        } else {
            regex::escape(&self.pattern)
        };
        RegexBuilder::new(&pattern)
            .case_insensitive(!self.match_case)
            .multi_line(true)
            .build()
            .map_err(|e| SearchError::InvalidPattern(e.to_string()))
    }
}

/// Find the next match outward from the selection `[begin, end)`. With
/// `wrap` set, a miss is followed by one pass over the whole document so a
/// match spanning the wrap point is still found. An empty match sitting on
/// the caret itself is skipped, so repeated searches step past it.
pub fn find_match(
    chain: &ChunkChain,
    regex: &Regex,
    direction: SearchDirection,
    begin: LogicalPosition,
    end: LogicalPosition,
    wrap: bool,
) -> Option<TextRange> {
    let repeats = |range: &TextRange| begin == end && range.start == begin && range.end == end;
    let found = match direction {
        SearchDirection::Forward => {
            let from = chain.position(end);
            let haystack = chain.text_between(from, chain.end_of_document());
            first_match(regex, &haystack, end, repeats)
        }
        SearchDirection::Backward => {
            let to = chain.position(begin);
            let haystack = chain.text_between(chain.start_of_document(), to);
            last_match(regex, &haystack, LogicalPosition::default(), repeats)
        }
    };
    if found.is_some() || !wrap {
        return found;
    }

    let haystack = chain.text();
    match direction {
        SearchDirection::Forward => first_match(regex, &haystack, LogicalPosition::default(), repeats),
        SearchDirection::Backward => last_match(regex, &haystack, LogicalPosition::default(), repeats),
    }
}

fn first_match(regex: &Regex, haystack: &str, origin: LogicalPosition, skip: impl Fn(&TextRange) -> bool) -> Option<TextRange> {
    regex
        .find_iter(haystack)
        .map(|m| range_of(origin, haystack, m.start(), m.end()))
        .find(|range| !skip(range))
}

/// Only the final two matches are measured; at most one of them is skipped.
fn last_match(regex: &Regex, haystack: &str, origin: LogicalPosition, skip: impl Fn(&TextRange) -> bool) -> Option<TextRange> {
    let mut last = None;
    let mut previous = None;
    for m in regex.find_iter(haystack) {
        previous = last.replace(m);
    }
    [last, previous]
        .into_iter()
        .flatten()
        .map(|m| range_of(origin, haystack, m.start(), m.end()))
        .find(|range| !skip(range))
}

fn range_of(origin: LogicalPosition, haystack: &str, start: usize, end: usize) -> TextRange {
    let start_position = origin.advance(&haystack[..start]);
    TextRange::new(start_position, start_position.advance(&haystack[start..end]))
}

/// Cooperative cancellation flag shared between a background search and
/// whoever started it.
#[derive(Debug, Clone)]
pub struct SearchTask {
    active: Arc<AtomicBool>,
}

impl SearchTask {
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn cancel(&self) {
        self.active.store(false, Ordering::Relaxed);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }
}

impl Default for SearchTask {
    fn default() -> Self {
        Self::new()
    }
}

/// Matches whose context windows touch, with the lines around them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchBlock {
    /// Index of the document in the slice passed to `find_all`.
    pub document: usize,
    pub first_line: usize,
    pub lines: Vec<String>,
    pub matches: Vec<TextRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    Completed { matches: usize },
    Cancelled,
}

/// Search several documents, reporting each context block as it is found.
/// Each document's read lock is held only while that document is scanned.
pub fn find_all(
    documents: &[&Document],
    query: &SearchQuery,
    context_lines: usize,
    task: &SearchTask,
    mut on_block: impl FnMut(MatchBlock),
) -> Result<SearchStatus, SearchError> {
    let regex = query.compile()?;
    let mut total = 0;
    for (index, document) in documents.iter().enumerate() {
        if !task.is_active() {
            debug!(searched = index, "find all cancelled");
            return Ok(SearchStatus::Cancelled);
        }
        let state = document.read();
        match blocks_in(state.chain(), &regex, context_lines, task, index, &mut on_block) {
            Some(found) => total += found,
            None => {
                debug!(searched = index, "find all cancelled");
                return Ok(SearchStatus::Cancelled);
            }
        }
    }
    debug!(documents = documents.len(), matches = total, "find all finished");
    Ok(SearchStatus::Completed { matches: total })
}

/// Group the matches of one document into blocks. None when cancelled.
fn blocks_in(
    chain: &ChunkChain,
    regex: &Regex,
    context_lines: usize,
    task: &SearchTask,
    document: usize,
    on_block: &mut impl FnMut(MatchBlock),
) -> Option<usize> {
    let text = chain.text();
    let line_count = chain.line_count();
    let emit = |first_line: usize, end_line: usize, matches: Vec<TextRange>| MatchBlock {
        document,
        first_line,
        lines: chain
            .lines(first_line)
            .take(end_line - first_line)
            .map(String::from)
            .collect(),
        matches,
    };

    // (first line, end line exclusive, matches)
    let mut block: Option<(usize, usize, Vec<TextRange>)> = None;
    let mut scanned = LogicalPosition::default();
    let mut consumed = 0;
    let mut found = 0;
    for m in regex.find_iter(&text) {
        if !task.is_active() {
            return None;
        }
        let start = scanned.advance(&text[consumed..m.start()]);
        let end = start.advance(m.as_str());
        scanned = start;
        consumed = m.start();
        found += 1;

        let window_first = start.line.saturating_sub(context_lines);
        let window_end = (end.line + context_lines + 1).min(line_count);
        let range = TextRange::new(start, end);
        match block.as_mut() {
            Some((_, block_end, matches)) if window_first <= *block_end => {
                *block_end = (*block_end).max(window_end);
                matches.push(range);
            }
            _ => {
                if let Some((first, end, matches)) = block.take() {
                    on_block(emit(first, end, matches));
                }
                block = Some((window_first, window_end, vec![range]));
            }
        }
    }
    if let Some((first, end, matches)) = block {
        on_block(emit(first, end, matches));
    }
    Some(found)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("Invalid search pattern: {0}")]
    InvalidPattern(String),
    #[error("No search pattern")]
    NoPattern,
}
