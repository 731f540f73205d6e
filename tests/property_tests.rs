// Property-based tests using proptest
// These tests run random edit sequences against tiny chunks so splits and
// merges happen on almost every edit, then check the document invariants

use proptest::prelude::*;
use textchain::document_model::cursor::{Cursor, normalize_cursors};
use textchain::document_model::document::MIN_CHUNK_CAPACITY;
use textchain::document_model::{
    CursorData, CursorSet, Direction, Document, DocumentOptions, Granularity, LineEnding, LogicalPosition, Motion,
    Utf8Transcoder,
};

fn tiny() -> DocumentOptions {
    DocumentOptions {
        chunk_capacity: MIN_CHUNK_CAPACITY,
        tab_width: 4,
        line_ending: LineEnding::Unix,
        ..DocumentOptions::default()
    }
}

/// Generate random edit operations
#[derive(Debug, Clone)]
enum EditOp {
    Insert(String),
    Delete(Direction, Granularity),
    Move(Motion, bool),
    AddEmptyLine(Direction),
    Indent(Direction),
    Cut,
}

impl EditOp {
    fn apply(&self, document: &Document, cursors: &mut CursorSet) {
        match self {
            Self::Insert(text) => {
                document.insert(cursors, text);
            }
            Self::Delete(direction, granularity) => {
                document.delete(cursors, *direction, *granularity);
            }
            Self::Move(motion, extend) => document.move_cursors(cursors, *motion, *extend),
            Self::AddEmptyLine(direction) => {
                document.add_empty_line(cursors, *direction);
            }
            Self::Indent(direction) => {
                document.indent(cursors, *direction);
            }
            Self::Cut => {
                document.cut_text(cursors);
            }
        }
    }

    /// Edits whose undo snapshot is exactly the cursor set passed in. Cut
    /// widens carets to whole lines before recording.
    fn keeps_cursor_snapshot(&self) -> bool {
        !matches!(self, Self::Move(..) | Self::Cut)
    }
}

fn direction_strategy() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::Left), Just(Direction::Right)]
}

fn granularity_strategy() -> impl Strategy<Value = Granularity> {
    prop_oneof![
        Just(Granularity::Character),
        Just(Granularity::Word),
        Just(Granularity::Line)
    ]
}

fn motion_strategy() -> impl Strategy<Value = Motion> {
    prop_oneof![
        direction_strategy().prop_map(Motion::Character),
        direction_strategy().prop_map(Motion::Word),
        (-3isize..=3).prop_map(Motion::Line),
        Just(Motion::StartOfLine),
        Just(Motion::EndOfLine),
        Just(Motion::StartOfDocument),
        Just(Motion::EndOfDocument),
    ]
}

fn edit_op_strategy() -> impl Strategy<Value = EditOp> {
    prop_oneof![
        4 => "[a-zé中 \n]{1,12}".prop_map(EditOp::Insert),
        3 => (direction_strategy(), granularity_strategy()).prop_map(|(d, g)| EditOp::Delete(d, g)),
        3 => (motion_strategy(), any::<bool>()).prop_map(|(m, e)| EditOp::Move(m, e)),
        1 => direction_strategy().prop_map(EditOp::AddEmptyLine),
        1 => direction_strategy().prop_map(EditOp::Indent),
        1 => Just(EditOp::Cut),
    ]
}

fn text_strategy() -> impl Strategy<Value = String> {
    "[a-zé中 \t\n]{0,120}"
}

/// Turn (line, character) seeds into positions on real character boundaries.
fn cursors_for(document: &Document, seeds: &[(usize, usize, usize, usize)]) -> Vec<CursorData> {
    let state = document.read();
    let position = |line_seed: usize, char_seed: usize| {
        let line = line_seed % state.line_count();
        let text = state.line(line).unwrap_or_default();
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(offset, _)| offset)
            .chain(std::iter::once(text.len()))
            .collect();
        LogicalPosition::new(line, boundaries[char_seed % boundaries.len()])
    };
    seeds
        .iter()
        .map(|&(a_line, a_char, b_line, b_char)| CursorData::selection(position(a_line, a_char), position(b_line, b_char)))
        .collect()
}

fn assert_chain_consistent(document: &Document) {
    let state = document.read();
    state.chain().check_invariants();
    let counted: usize = state.chain().chunks().map(|(_, chunk)| chunk.line_count()).sum();
    assert_eq!(counted, state.line_count());
    assert_eq!(state.lines(0).count(), state.line_count());
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        max_shrink_iters: 1000,
        ..ProptestConfig::default()
    })]

    /// Undoing every edit of a random session restores the original text,
    /// and redoing them all reproduces the edited text.
    #[test]
    fn prop_undo_all_restores_text(
        text in text_strategy(),
        seeds in prop::collection::vec((0usize..64, 0usize..64, 0usize..64, 0usize..64), 1..5),
        ops in prop::collection::vec(edit_op_strategy(), 1..40),
    ) {
        let document = Document::with_options(&text, &tiny());
        let original = document.text();
        let mut cursors = CursorSet::new(cursors_for(&document, &seeds));

        for op in &ops {
            op.apply(&document, &mut cursors);
            assert_chain_consistent(&document);
        }
        let edited = document.text();

        while document.can_undo() {
            document.undo(&mut cursors);
            assert_chain_consistent(&document);
        }
        prop_assert_eq!(document.text(), original);
        prop_assert!(!document.is_modified());

        while document.can_redo() {
            document.redo(&mut cursors);
        }
        prop_assert_eq!(document.text(), edited);
    }

    /// A single edit undone restores both the text and the cursor set it
    /// started from.
    #[test]
    fn prop_single_edit_is_invertible(
        text in text_strategy(),
        line_seeds in prop::collection::btree_set(0usize..64, 1..5),
        char_seed in 0usize..64,
        op in edit_op_strategy().prop_filter("keeps cursor snapshot", EditOp::keeps_cursor_snapshot),
    ) {
        let document = Document::with_options(&text, &tiny());
        let before = document.text();
        // Carets on distinct lines never merge, so the set is already normalized
        let line_count = document.line_count();
        let mut lines: Vec<usize> = line_seeds.into_iter().map(|seed| seed % line_count).collect();
        lines.sort_unstable();
        lines.dedup();
        let seeds: Vec<_> = lines.iter().map(|&line| (line, char_seed, line, char_seed)).collect();
        let initial = cursors_for(&document, &seeds);
        let mut cursors = CursorSet::new(initial.clone());

        op.apply(&document, &mut cursors);
        if document.can_undo() {
            document.undo(&mut cursors);
            prop_assert_eq!(cursors.as_slice(), initial.as_slice());
        }
        prop_assert_eq!(document.text(), before);
        assert_chain_consistent(&document);
    }

    /// Normalizing twice changes nothing, and normalized cursors never touch.
    #[test]
    fn prop_normalize_is_idempotent(
        text in text_strategy(),
        seeds in prop::collection::vec((0usize..64, 0usize..64, 0usize..64, 0usize..64), 0..8),
    ) {
        let document = Document::with_options(&text, &tiny());
        let data = cursors_for(&document, &seeds);
        let state = document.read();
        let chain = state.chain();

        let mut cursors: Vec<Cursor> = data.iter().map(|cursor| Cursor::resolve(chain, cursor, None)).collect();
        normalize_cursors(chain, &mut cursors);
        let once: Vec<CursorData> = cursors.iter().map(|cursor| cursor.data(chain)).collect();
        normalize_cursors(chain, &mut cursors);
        let twice: Vec<CursorData> = cursors.iter().map(|cursor| cursor.data(chain)).collect();

        prop_assert_eq!(&once, &twice);
        for pair in once.windows(2) {
            prop_assert!(pair[0].end() < pair[1].begin());
        }
    }

    /// save(load(save(D))) == save(D) for a fixed line ending.
    #[test]
    fn prop_save_load_round_trip(
        text in "[a-z \r\n]{0,120}",
        ending in prop_oneof![Just(LineEnding::Unix), Just(LineEnding::Windows), Just(LineEnding::Mac)],
    ) {
        let document = Document::with_options(&text, &tiny());
        let mut saved = Vec::new();
        document.write_to(&mut saved, ending, &Utf8Transcoder).unwrap();

        let reloaded = Document::from_bytes(&saved, &tiny()).unwrap();
        let mut saved_again = Vec::new();
        reloaded.write_to(&mut saved_again, ending, &Utf8Transcoder).unwrap();

        prop_assert_eq!(saved, saved_again);
        prop_assert_eq!(reloaded.line_count(), document.line_count());
    }
}
