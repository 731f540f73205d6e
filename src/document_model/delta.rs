//! Reversible edit records.

use regex::Regex;

use super::chunk_chain::LogicalPosition;
use super::cursor::{CursorData, Direction};

#[derive(Debug, Clone)]
pub enum DeltaKind {
    /// Replace every selection (or insert at every caret).
    ReplaceText { text: String },
    /// Replace every selection with `replacement` expanded against the
    /// selection's own match of `regex`.
    RegexReplace { regex: Regex, replacement: String },
    RemoveText,
    /// Remove from the caret to the start (Left) or end (Right) of its line.
    RemoveLine(Direction),
    RemoveWord(Direction),
    RemoveCharacter(Direction),
    /// Open an empty line above (Left) or below (Right) each cursor.
    AddEmptyLine(Direction),
    /// Replace explicit ranges, independent of the cursor set.
    ReplaceRanges { edits: Vec<RangeEdit> },
}

impl DeltaKind {
    pub fn name(&self) -> &'static str {
        match self {
            DeltaKind::ReplaceText { .. } => "replace_text",
            DeltaKind::RegexReplace { .. } => "regex_replace",
            DeltaKind::RemoveText => "remove_text",
            DeltaKind::RemoveLine(_) => "remove_line",
            DeltaKind::RemoveWord(_) => "remove_word",
            DeltaKind::RemoveCharacter(_) => "remove_character",
            DeltaKind::AddEmptyLine(_) => "add_empty_line",
            DeltaKind::ReplaceRanges { .. } => "replace_ranges",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeEdit {
    pub start: LogicalPosition,
    pub end: LogicalPosition,
    pub text: String,
}

impl RangeEdit {
    pub fn new(start: LogicalPosition, end: LogicalPosition, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    pub fn insert(at: LogicalPosition, text: impl Into<String>) -> Self {
        Self::new(at, at, text)
    }

    pub fn remove(start: LogicalPosition, end: LogicalPosition) -> Self {
        Self::new(start, end, String::new())
    }
}

/// One replacement as it landed in the document: `[start, end)` is the
/// inserted text after the whole batch, `removed` what it replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedEdit {
    pub start: LogicalPosition,
    pub end: LogicalPosition,
    pub removed: String,
}

#[derive(Debug, Clone)]
pub struct Delta {
    pub kind: DeltaKind,
    /// Every cursor as it was before the edit.
    pub stored_cursors: Vec<CursorData>,
    pub applied: Vec<AppliedEdit>,
    /// Composite kinds widen the selections and hand the text change to a
    /// plain replace or remove record.
    pub next: Option<Box<Delta>>,
}

impl Delta {
    pub fn new(kind: DeltaKind) -> Self {
        Self {
            kind,
            stored_cursors: Vec::new(),
            applied: Vec::new(),
            next: None,
        }
    }

    pub fn is_composite(&self) -> bool {
        self.next.is_some()
    }

    /// The record that actually changed text.
    pub fn leaf(&self) -> &Delta {
        match &self.next {
            Some(next) => next.leaf(),
            None => self,
        }
    }
}

/// Inclusive range of lines an edit changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRegion {
    pub first_line: usize,
    pub last_line: usize,
}

impl DirtyRegion {
    /// Lines covered by `spans`. When an edit changed the number of lines,
    /// everything below the first span moved and is included too.
    pub(crate) fn covering(
        spans: impl IntoIterator<Item = (usize, usize)>,
        lines_shifted: bool,
        line_count: usize,
    ) -> Option<Self> {
        let (first_line, last_line) = spans
            .into_iter()
            .reduce(|(first, last), (start, end)| (first.min(start), last.max(end)))?;
        let last_line = if lines_shifted { line_count - 1 } else { last_line };
        Some(Self {
            first_line: first_line.min(line_count - 1),
            last_line: last_line.min(line_count - 1),
        })
    }
}
