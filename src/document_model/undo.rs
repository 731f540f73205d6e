//! The undo log and the batch engine every edit goes through.
//!
//! `perform` applies one delta across a whole cursor set while the caller
//! holds the document's write lock: cursors are sorted and merged, each
//! selection is replaced in order, the positions sharing a chunk with each
//! splice are remapped onto the edited chain, and the chain is rescanned
//! once at the end. `revert` undoes a performed delta, last edit first.

use tracing::trace;

use super::chunk_chain::{ChunkChain, TextPosition};
use super::cursor::{Cursor, CursorData, Direction, cursors_have_selection, normalize_cursors};
use super::delta::{AppliedEdit, Delta, DeltaKind, DirtyRegion};

#[derive(Debug, Clone)]
pub struct UndoManager {
    undo_stack: Vec<Delta>,
    redo_stack: Vec<Delta>,
    max_undo_levels: usize,
    // Undo depth at the last save, None once that state is unreachable
    saved_depth: Option<usize>,
}

impl UndoManager {
    pub fn new() -> Self {
        Self::with_max_levels(1000)
    }

    pub fn with_max_levels(max_undo_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_undo_levels: max_undo_levels.max(1),
            saved_depth: Some(0),
        }
    }

    /// Record a fresh edit. Anything that was undone is gone for good.
    pub fn push(&mut self, delta: Delta) {
        if !self.redo_stack.is_empty() {
            if self.saved_depth.is_some_and(|depth| depth > self.undo_stack.len()) {
                self.saved_depth = None;
            }
            self.redo_stack.clear();
        }
        self.push_undo(delta);
    }

    /// Record a redone edit without touching the redo stack.
    pub fn push_redone(&mut self, delta: Delta) {
        self.push_undo(delta);
    }

    fn push_undo(&mut self, delta: Delta) {
        self.undo_stack.push(delta);

        // Limit the undo stack size
        if self.undo_stack.len() > self.max_undo_levels {
            self.undo_stack.remove(0);
            self.saved_depth = self.saved_depth.and_then(|depth| depth.checked_sub(1));
        }
    }

    pub fn pop_undo(&mut self) -> Option<Delta> {
        self.undo_stack.pop()
    }

    pub fn push_redo(&mut self, delta: Delta) {
        self.redo_stack.push(delta);
    }

    pub fn pop_redo(&mut self) -> Option<Delta> {
        self.redo_stack.pop()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn mark_saved(&mut self) {
        self.saved_depth = Some(self.undo_stack.len());
    }

    pub fn is_modified(&self) -> bool {
        self.saved_depth != Some(self.undo_stack.len())
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.saved_depth = Some(0);
    }
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new()
    }
}

enum Outcome {
    Skipped,
    Applied(Vec<AppliedEdit>),
    Delegated(Box<Delta>),
}

/// Apply `delta` to every cursor. On success the delta holds what undo
/// needs and `cursors` hold the resulting carets. A no-op returns false and
/// leaves the chain untouched.
pub(crate) fn perform(chain: &mut ChunkChain, cursors: &mut Vec<Cursor>, delta: &mut Delta) -> bool {
    normalize_cursors(chain, cursors);
    delta.stored_cursors = cursors.iter().map(|cursor| cursor.data(chain)).collect();
    delta.applied.clear();
    delta.next = None;

    let outcome = match &delta.kind {
        DeltaKind::ReplaceText { text } => {
            let texts = vec![text.as_str(); cursors.len()];
            replace_selections(chain, cursors, &texts, &mut [])
        }
        DeltaKind::RegexReplace { regex, replacement } => {
            let mut texts = Vec::with_capacity(cursors.len());
            for cursor in cursors.iter() {
                let selected = cursor.selected_text(chain);
                let whole_match = regex
                    .captures(&selected)
                    .filter(|caps| caps.get(0).is_some_and(|m| m.start() == 0 && m.end() == selected.len()));
                match whole_match {
                    Some(caps) if !selected.is_empty() => {
                        let mut expanded = String::new();
                        caps.expand(replacement, &mut expanded);
                        texts.push(expanded);
                    }
                    _ => return false,
                }
            }
            replace_selections(chain, cursors, &texts, &mut [])
        }
        DeltaKind::RemoveText => {
            if cursors_have_selection(cursors) {
                let texts = vec![""; cursors.len()];
                replace_selections(chain, cursors, &texts, &mut [])
            } else {
                Outcome::Skipped
            }
        }
        DeltaKind::RemoveLine(direction) => {
            let direction = *direction;
            let expand = !cursors_have_selection(cursors);
            delegate(chain, cursors, DeltaKind::RemoveText, |cursor, chain| {
                if expand {
                    match direction {
                        Direction::Left => cursor.select_start_of_line(chain),
                        Direction::Right => cursor.select_end_of_line(chain),
                    }
                }
            })
        }
        DeltaKind::RemoveWord(direction) => {
            let direction = *direction;
            let expand = !cursors_have_selection(cursors);
            delegate(chain, cursors, DeltaKind::RemoveText, |cursor, chain| {
                if expand {
                    cursor.offset_selection_word(chain, direction);
                }
            })
        }
        DeltaKind::RemoveCharacter(direction) => {
            let direction = *direction;
            let expand = !cursors_have_selection(cursors);
            delegate(chain, cursors, DeltaKind::RemoveText, |cursor, chain| {
                if expand {
                    cursor.offset_selection_character(chain, direction);
                }
            })
        }
        DeltaKind::AddEmptyLine(direction) => {
            let direction = *direction;
            let newline = DeltaKind::ReplaceText {
                text: "\n".to_string(),
            };
            let outcome = delegate(chain, cursors, newline, |cursor, chain| match direction {
                Direction::Left => cursor.offset_start_of_line(chain),
                Direction::Right => cursor.offset_end_of_line(chain),
            });
            if direction == Direction::Left && matches!(outcome, Outcome::Delegated(_)) {
                // Land on the line that was opened above
                for cursor in cursors.iter_mut() {
                    cursor.offset_character(chain, Direction::Left);
                }
            }
            outcome
        }
        DeltaKind::ReplaceRanges { edits } => {
            debug_assert!(edits.windows(2).all(|pair| pair[0].end <= pair[1].start));
            let mut hint = chain.head();
            let mut targets: Vec<Cursor> = Vec::with_capacity(edits.len());
            for edit in edits {
                let start = chain.clamped_position_near(hint, edit.start);
                let end = chain.clamped_position_near(start.chunk, edit.end);
                hint = end.chunk;
                targets.push(Cursor::with_selection(start, end));
            }
            let texts: Vec<&str> = edits.iter().map(|edit| edit.text.as_str()).collect();
            replace_selections(chain, &mut targets, &texts, cursors)
        }
    };

    match outcome {
        Outcome::Skipped => false,
        Outcome::Applied(applied) => {
            delta.applied = applied;
            normalize_cursors(chain, cursors);
            true
        }
        Outcome::Delegated(next) => {
            delta.next = Some(next);
            normalize_cursors(chain, cursors);
            true
        }
    }
}

/// Widen every cursor with `expand`, then hand the text change to a plain
/// record of `kind`.
fn delegate(
    chain: &mut ChunkChain,
    cursors: &mut Vec<Cursor>,
    kind: DeltaKind,
    expand: impl Fn(&mut Cursor, &ChunkChain),
) -> Outcome {
    for cursor in cursors.iter_mut() {
        expand(cursor, chain);
    }
    let mut next = Delta::new(kind);
    if perform(chain, cursors, &mut next) {
        Outcome::Delegated(Box::new(next))
    } else {
        Outcome::Skipped
    }
}

/// Replace each target's selection with the matching text, in order. The
/// targets must be sorted and disjoint, and so must `tracked`. A splice only
/// moves positions in the chunks it coalesced, which run from the chunk of
/// its begin to the one after its end; every position held in that window is
/// remapped onto the edited chain and everything outside it is left alone.
fn replace_selections<S: AsRef<str>>(
    chain: &mut ChunkChain,
    targets: &mut [Cursor],
    texts: &[S],
    tracked: &mut [Cursor],
) -> Outcome {
    let mut pending: Vec<(TextPosition, TextPosition, String)> = Vec::with_capacity(targets.len());
    // tracked[..settled] lie wholly before every chunk still to be edited
    let mut settled = 0;
    for index in 0..targets.len() {
        let text = texts[index].as_ref();
        let target = targets[index];
        if !target.has_selection() && text.is_empty() {
            continue;
        }
        let begin = target.begin(chain);
        let end = target.end(chain);
        let low = order(chain, begin);
        let high = chain.chunk(chain.next(end.chunk).unwrap_or(end.chunk)).order;

        // Earlier targets are carets at or before `begin`
        let mut earlier = index;
        while earlier > 0 && order(chain, targets[earlier - 1].active) >= low {
            earlier -= 1;
        }
        let mut later = index + 1;
        while later < targets.len() && order(chain, targets[later].begin(chain)) <= high {
            later += 1;
        }
        let mut unsettled = pending.len();
        while unsettled > 0 && order(chain, pending[unsettled - 1].1) >= low {
            unsettled -= 1;
        }
        while settled < tracked.len() && order(chain, tracked[settled].end(chain)) < low {
            settled += 1;
        }
        let mut reach = settled;
        while reach < tracked.len() && order(chain, tracked[reach].begin(chain)) <= high {
            reach += 1;
        }

        let removed = chain.text_between(begin, end);
        let splice = chain.splice(begin, end, text);
        trace!(removed = removed.len(), inserted = text.len(), "spliced selection");

        let (before, rest) = targets.split_at_mut(index);
        for cursor in before[earlier..].iter_mut().chain(&mut rest[1..later - index]) {
            cursor.remap(&splice);
        }
        for cursor in &mut tracked[settled..reach] {
            cursor.remap(&splice);
        }
        for (start, stop, _) in &mut pending[unsettled..] {
            *start = splice.remap_preceding(*start);
            *stop = splice.remap_preceding(*stop);
        }
        targets[index] = Cursor::new(splice.end());
        pending.push((splice.start(), splice.end(), removed));
    }

    if pending.is_empty() {
        return Outcome::Skipped;
    }
    chain.rescan();
    let applied = pending
        .into_iter()
        .map(|(start, stop, removed)| AppliedEdit {
            start: chain.logical(start),
            end: chain.logical(stop),
            removed,
        })
        .collect();
    Outcome::Applied(applied)
}

/// Undo a performed delta and return the cursors it started from. Going
/// back to front leaves every chunk before the latest splice untouched, so
/// each lookup starts from the chunk the previous one edited.
pub(crate) fn revert(chain: &mut ChunkChain, delta: &Delta) -> Vec<CursorData> {
    let mut hint = chain.tail();
    for edit in delta.leaf().applied.iter().rev() {
        let start = chain.position_near(hint, edit.start);
        let end = chain.position_near(hint, edit.end);
        hint = chain.splice(start, end, &edit.removed).first();
    }
    chain.rescan();
    delta.stored_cursors.clone()
}

fn order(chain: &ChunkChain, position: TextPosition) -> u64 {
    chain.chunk(position.chunk).order
}

fn newline_count(text: &str) -> usize {
    text.bytes().filter(|&byte| byte == b'\n').count()
}

fn lines_shifted(delta: &Delta) -> bool {
    delta
        .leaf()
        .applied
        .iter()
        .any(|edit| newline_count(&edit.removed) != edit.end.line - edit.start.line)
}

/// Lines changed by performing `delta`.
pub(crate) fn performed_region(delta: &Delta, line_count: usize) -> Option<DirtyRegion> {
    let spans = delta.leaf().applied.iter().map(|edit| (edit.start.line, edit.end.line));
    DirtyRegion::covering(spans, lines_shifted(delta), line_count)
}

/// Lines changed by reverting `delta`.
pub(crate) fn reverted_region(delta: &Delta, line_count: usize) -> Option<DirtyRegion> {
    let spans = delta
        .leaf()
        .applied
        .iter()
        .map(|edit| (edit.start.line, edit.start.line + newline_count(&edit.removed)));
    DirtyRegion::covering(spans, lines_shifted(delta), line_count)
}
