// End-to-end editing scenarios through the public Document API

use std::fs;

use tempfile::TempDir;
use textchain::document_model::{
    CursorData, CursorSet, Direction, Document, DocumentOptions, Encoding, Granularity, LineEnding, LogicalPosition,
    Motion, SearchDirection, SearchQuery, SearchStatus, SearchTask, TextRange, Utf8Transcoder, find_all,
};

fn options(chunk_capacity: usize) -> DocumentOptions {
    DocumentOptions {
        chunk_capacity,
        line_ending: LineEnding::Unix,
        ..DocumentOptions::default()
    }
}

fn pos(line: usize, column: usize) -> LogicalPosition {
    LogicalPosition::new(line, column)
}

fn selection(anchor: (usize, usize), active: (usize, usize)) -> CursorData {
    CursorData::selection(pos(anchor.0, anchor.1), pos(active.0, active.1))
}

#[test]
fn test_type_move_and_undo() {
    let document = Document::with_options("", &options(64));
    let mut cursors = CursorSet::caret(0, 0);
    document.insert(&mut cursors, "hello world");
    document.move_cursors(&mut cursors, Motion::StartOfLine, false);
    for _ in 0..5 {
        document.move_cursors(&mut cursors, Motion::Character(Direction::Right), false);
    }
    document.insert(&mut cursors, "a");
    assert_eq!(document.text(), "helloa world");

    document.undo(&mut cursors);
    assert_eq!(document.text(), "hello world");
    assert_eq!(cursors.as_slice(), &[CursorData::caret(0, 5)]);
}

#[test]
fn test_two_cursors_insert_on_one_line() {
    let document = Document::with_options("hello world", &options(64));
    let mut cursors = CursorSet::new(vec![CursorData::caret(0, 0), CursorData::caret(0, 6)]);
    document.insert(&mut cursors, "a");
    assert_eq!(document.text(), "ahello aworld");
    assert_eq!(cursors.as_slice(), &[CursorData::caret(0, 1), CursorData::caret(0, 8)]);
}

#[test]
fn test_delete_selection_and_undo_reselects() {
    let document = Document::with_options("hello world", &options(64));
    let mut cursors = CursorSet::new(vec![selection((0, 0), (0, 5))]);
    document.delete(&mut cursors, Direction::Left, Granularity::Character);
    assert_eq!(document.text(), " world");
    assert_eq!(cursors.as_slice(), &[CursorData::caret(0, 0)]);

    document.undo(&mut cursors);
    assert_eq!(document.text(), "hello world");
    assert_eq!(cursors.as_slice(), &[selection((0, 0), (0, 5))]);
}

#[test]
fn test_search_forward_finds_next_line() {
    let document = Document::with_options("hello world\nhow are you doing", &options(64));
    let found = document
        .find(&SearchQuery::new("how"), &CursorData::caret(0, 0))
        .unwrap();
    assert_eq!(found, Some(TextRange::new(pos(1, 0), pos(1, 3))));
}

#[test]
fn test_overlapping_cursors_merge_before_newline() {
    let document = Document::with_options("zero\none\ntwo\nthree\nfour\nfive", &options(16));
    let mut cursors = CursorSet::new(vec![selection((2, 0), (4, 2)), selection((3, 1), (4, 4))]);
    document.insert(&mut cursors, "\n");
    assert_eq!(document.text(), "zero\none\n\n\nfive");
    assert_eq!(cursors.as_slice(), &[CursorData::caret(3, 0)]);

    document.undo(&mut cursors);
    assert_eq!(document.text(), "zero\none\ntwo\nthree\nfour\nfive");
    assert_eq!(cursors.as_slice(), &[selection((2, 0), (4, 4))]);
}

#[test]
fn test_multi_cursor_backspace_across_lines() {
    let document = Document::with_options("ab\ncd\nef", &options(16));
    let mut cursors = CursorSet::new(vec![CursorData::caret(1, 0), CursorData::caret(2, 0)]);
    document.delete(&mut cursors, Direction::Left, Granularity::Character);
    assert_eq!(document.text(), "abcdef");
    assert_eq!(cursors.as_slice(), &[CursorData::caret(0, 2), CursorData::caret(0, 4)]);
    assert_eq!(document.line_count(), 1);

    document.undo(&mut cursors);
    assert_eq!(document.text(), "ab\ncd\nef");
}

#[test]
fn test_multi_line_paste_at_every_cursor() {
    let document = Document::with_options("x\ny", &options(16));
    let mut cursors = CursorSet::new(vec![CursorData::caret(0, 1), CursorData::caret(1, 1)]);
    document.insert(&mut cursors, "1\n2\n3");
    assert_eq!(document.text(), "x1\n2\n3\ny1\n2\n3");
    assert_eq!(cursors.as_slice(), &[CursorData::caret(2, 1), CursorData::caret(5, 1)]);
    assert_eq!(document.line_count(), 6);
}

#[test]
fn test_paste_larger_than_a_chunk() {
    let document = Document::with_options("start end", &options(16));
    let mut cursors = CursorSet::caret(0, 6);
    let pasted: String = (0..50).map(|i| format!("line {i}\n")).collect();
    document.insert(&mut cursors, &pasted);
    assert_eq!(document.line_count(), 51);
    assert_eq!(document.line(50).as_deref(), Some("end"));
    assert!(document.read().chain().chunk_count() > 10);
    document.read().chain().check_invariants();

    document.undo(&mut cursors);
    assert_eq!(document.text(), "start end");
}

#[test]
fn test_undo_redo_chain() {
    let document = Document::with_options("", &options(16));
    let mut cursors = CursorSet::caret(0, 0);
    for word in ["one ", "two ", "three"] {
        document.insert(&mut cursors, word);
    }
    assert_eq!(document.text(), "one two three");

    document.undo(&mut cursors);
    document.undo(&mut cursors);
    assert_eq!(document.text(), "one ");
    document.redo(&mut cursors);
    assert_eq!(document.text(), "one two ");
    assert_eq!(cursors.as_slice(), &[CursorData::caret(0, 8)]);

    document.undo(&mut cursors);
    document.undo(&mut cursors);
    assert_eq!(document.text(), "");
    assert!(!document.can_undo());
    assert_eq!(document.undo(&mut cursors), None);

    document.redo(&mut cursors);
    document.redo(&mut cursors);
    document.redo(&mut cursors);
    assert_eq!(document.text(), "one two three");
    assert!(!document.can_redo());
}

#[test]
fn test_search_backward_and_wrap() {
    let document = Document::with_options("one two\none two", &options(16));
    let backward = SearchQuery::new("one").direction(SearchDirection::Backward);
    let found = document.find(&backward, &CursorData::caret(1, 3)).unwrap();
    assert_eq!(found, Some(TextRange::new(pos(1, 0), pos(1, 3))));

    let found = document.find(&backward, &selection((1, 0), (1, 3))).unwrap();
    assert_eq!(found, Some(TextRange::new(pos(0, 0), pos(0, 3))));

    let wrapped = document.find(&backward, &selection((0, 0), (0, 3))).unwrap();
    assert_eq!(wrapped, Some(TextRange::new(pos(1, 0), pos(1, 3))));

    let no_wrap = backward.clone().wrap(false);
    assert_eq!(document.find(&no_wrap, &selection((0, 0), (0, 3))).unwrap(), None);
}

#[test]
fn test_search_spanning_lines() {
    let document = Document::with_options("alpha\nbeta\ngamma", &options(16));
    let query = SearchQuery::new("a\nbe");
    let found = document.find(&query, &CursorData::default()).unwrap();
    assert_eq!(found, Some(TextRange::new(pos(0, 4), pos(1, 2))));

    let regex = SearchQuery::new(r"ta\s+g").regex(true);
    let found = document.find(&regex, &CursorData::default()).unwrap();
    assert_eq!(found, Some(TextRange::new(pos(1, 2), pos(2, 1))));
}

#[test]
fn test_find_then_replace_selection() {
    let document = Document::with_options("cat dog cat", &options(16));
    let query = SearchQuery::new("CAT");
    let found = document
        .find(&query, &CursorData::caret(0, 1))
        .unwrap()
        .unwrap();
    assert_eq!(found, TextRange::new(pos(0, 8), pos(0, 11)));

    let mut cursors = CursorSet::new(vec![CursorData::selection(found.start, found.end)]);
    document.replace(&mut cursors, "bird");
    assert_eq!(document.text(), "cat dog bird");
}

#[test]
fn test_find_all_over_documents() {
    let first = Document::with_options("a\nneedle\nb\nc\nd\ne\nneedle", &options(16));
    let second = Document::with_options("nothing here", &options(16));
    let third = Document::with_options("needle needle", &options(16));

    let mut blocks = Vec::new();
    let status = find_all(
        &[&first, &second, &third],
        &SearchQuery::new("needle"),
        1,
        &SearchTask::new(),
        |block| blocks.push(block),
    )
    .unwrap();

    assert_eq!(status, SearchStatus::Completed { matches: 4 });
    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[0].document, 0);
    assert_eq!(blocks[0].first_line, 0);
    assert_eq!(blocks[0].lines, vec!["a", "needle", "b"]);
    assert_eq!(blocks[1].first_line, 5);
    assert_eq!(blocks[2].document, 2);
    assert_eq!(blocks[2].matches.len(), 2);
}

#[test]
fn test_find_all_cancelled() {
    let document = Document::with_options("x x x", &options(16));
    let task = SearchTask::new();
    let canceller = task.clone();
    let mut seen = 0;
    let status = find_all(&[&document, &document], &SearchQuery::new("x"), 0, &task, |_| {
        seen += 1;
        canceller.cancel();
    })
    .unwrap();
    assert_eq!(status, SearchStatus::Cancelled);
    assert_eq!(seen, 1);
}

#[test]
fn test_add_empty_lines_and_remove_line_parts() {
    let document = Document::with_options("first\nsecond", &options(16));
    let mut cursors = CursorSet::caret(1, 3);
    document.add_empty_line(&mut cursors, Direction::Left);
    assert_eq!(document.text(), "first\n\nsecond");
    assert_eq!(cursors.as_slice(), &[CursorData::caret(1, 0)]);

    let mut cursors = CursorSet::caret(2, 3);
    document.add_empty_line(&mut cursors, Direction::Right);
    assert_eq!(document.text(), "first\n\nsecond\n");
    assert_eq!(cursors.as_slice(), &[CursorData::caret(3, 0)]);

    let mut cursors = CursorSet::caret(2, 3);
    document.delete(&mut cursors, Direction::Right, Granularity::Line);
    assert_eq!(document.text(), "first\n\nsec\n");
}

#[test]
fn test_widest_line_tracks_edits() {
    let document = Document::with_options("ab\nabcdef\nabc", &options(16));
    assert_eq!(document.max_line_width(), 6);
    let mut cursors = CursorSet::new(vec![selection((1, 0), (1, 6))]);
    document.delete(&mut cursors, Direction::Left, Granularity::Character);
    assert_eq!(document.max_line_width(), 3);
    let mut cursors = CursorSet::caret(0, 0);
    document.insert(&mut cursors, "\t\t");
    assert_eq!(document.max_line_width(), 10);
}

#[test]
fn test_save_and_load_with_bom_and_crlf() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bom.txt");
    fs::write(&path, b"\xEF\xBB\xBFfirst\r\nsecond").unwrap();

    let document = Document::load(&path, &options(16), Encoding::Utf8, &Utf8Transcoder).unwrap();
    assert_eq!(document.encoding(), Encoding::Utf8Bom);
    assert_eq!(document.line_ending(), LineEnding::Windows);
    assert_eq!(document.text(), "first\nsecond");

    let copy = dir.path().join("copy.txt");
    document.save_as(&copy, &Utf8Transcoder).unwrap();
    assert_eq!(fs::read(&copy).unwrap(), b"\xEF\xBB\xBFfirst\r\nsecond");
    assert_eq!(document.filename().as_deref(), Some(copy.as_path()));

    document.set_line_ending(LineEnding::Unix);
    document.set_encoding(Encoding::Utf8);
    document.save(&Utf8Transcoder).unwrap();
    assert_eq!(fs::read(&copy).unwrap(), b"first\nsecond");
}

#[test]
fn test_save_without_filename_fails() {
    let document = Document::new();
    assert!(document.save(&Utf8Transcoder).is_err());
}

#[test]
fn test_strip_trailing_whitespace_over_large_document() {
    let lines = 60_000;
    let original: Vec<String> = (0..lines).map(|i| format!("value {i}  \t")).collect();
    let document = Document::with_options(&original.join("\n"), &options(4096));
    let last = lines - 1;
    let mut cursors = CursorSet::caret(last, original[last].len());

    document.remove_trailing_whitespace(&mut cursors);
    let stripped: Vec<String> = (0..lines).map(|i| format!("value {i}")).collect();
    assert_eq!(document.text(), stripped.join("\n"));
    assert_eq!(document.line_count(), lines);
    assert_eq!(cursors.as_slice(), &[CursorData::caret(last, stripped[last].len())]);
    document.read().chain().check_invariants();

    document.undo(&mut cursors);
    assert_eq!(document.text(), original.join("\n"));
    assert_eq!(document.line_count(), lines);
    assert!(!document.is_modified());
}

#[test]
fn test_caret_on_every_line_of_large_document() {
    let lines = 50_000;
    let original: String = (0..lines).map(|i| format!("row {i}\n")).collect();
    let document = Document::with_options(&original, &options(4096));
    let mut cursors = CursorSet::new((0..lines).map(|line| CursorData::caret(line, 0)).collect());

    document.insert(&mut cursors, "> ");
    let quoted: String = (0..lines).map(|i| format!("> row {i}\n")).collect();
    assert_eq!(document.text(), quoted);
    assert_eq!(document.line_count(), lines + 1);
    assert_eq!(cursors.as_slice().len(), lines);
    assert_eq!(cursors.as_slice()[lines - 1], CursorData::caret(lines - 1, 2));
    document.read().chain().check_invariants();

    document.undo(&mut cursors);
    assert_eq!(document.text(), original);
    document.redo(&mut cursors);
    assert_eq!(document.text(), quoted);
    assert_eq!(document.line_count(), lines + 1);
}
