use std::borrow::Cow;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use regex::Regex;
use thiserror::Error;
use tracing::{debug, trace, warn};

use super::chunk_chain::{ChunkChain, Lines, LogicalPosition};
use super::cursor::{Cursor, CursorData, CursorSet, Direction, Motion, normalize_cursors};
use super::delta::{Delta, DeltaKind, DirtyRegion, RangeEdit};
use super::encoding::{Encoding, Transcoder, UTF8_BOM};
use super::search_state::{SearchError, SearchQuery, TextRange, find_match};
use super::undo::{self, UndoManager};

pub const DEFAULT_CHUNK_CAPACITY: usize = 4096;
pub const MIN_CHUNK_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Unix,    // \n (LF)
    Windows, // \r\n (CRLF)
    Mac,     // \r (CR)
}

impl LineEnding {
    pub fn system_default() -> Self {
        if cfg!(windows) {
            LineEnding::Windows
        } else {
            LineEnding::Unix
        }
    }

    pub fn detect(content: &str) -> Self {
        if content.contains("\r\n") {
            LineEnding::Windows
        } else if content.contains('\r') {
            LineEnding::Mac
        } else {
            LineEnding::Unix
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Unix => "\n",
            LineEnding::Windows => "\r\n",
            LineEnding::Mac => "\r",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Character,
    Word,
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndentStyle {
    Tabs,
    Spaces,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentOptions {
    pub chunk_capacity: usize,
    pub tab_width: usize,
    pub undo_levels: usize,
    /// Line ending for documents whose text has none to detect.
    pub line_ending: LineEnding,
    pub expand_tab: bool,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            chunk_capacity: DEFAULT_CHUNK_CAPACITY,
            tab_width: 4,
            undo_levels: 1000,
            line_ending: LineEnding::system_default(),
            expand_tab: true, // Default to spaces
        }
    }
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("cannot read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("cannot write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("write failed: {0}")]
    Stream(#[from] io::Error),
    #[error("decoded text is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error(transparent)]
    Encoding(#[from] super::encoding::EncodingError),
    #[error("document has no file name")]
    NoFileName,
}

/// Everything behind the document lock. Renderers and searchers borrow it
/// through `Document::read`.
pub struct DocumentState {
    chain: ChunkChain,
    undo_manager: UndoManager,
    line_ending: LineEnding,
    encoding: Encoding,
    filename: Option<PathBuf>,
    expand_tab: bool,
}

impl DocumentState {
    pub fn chain(&self) -> &ChunkChain {
        &self.chain
    }

    pub fn undo_manager(&self) -> &UndoManager {
        &self.undo_manager
    }

    pub fn line_count(&self) -> usize {
        self.chain.line_count()
    }

    pub fn line(&self, line: usize) -> Option<&str> {
        (line < self.chain.line_count()).then(|| self.chain.line_text(line))
    }

    /// Lazy iterator over the lines from `from` to the end of the document.
    pub fn lines(&self, from: usize) -> Lines<'_> {
        self.chain.lines(from)
    }

    pub fn text(&self) -> String {
        self.chain.text()
    }

    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    pub fn encoding(&self) -> &Encoding {
        &self.encoding
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    fn apply(&mut self, cursors: &mut CursorSet, kind: DeltaKind) -> Option<DirtyRegion> {
        let name = kind.name();
        let mut live = cursors.resolve(&self.chain);
        let mut delta = Delta::new(kind);
        if !undo::perform(&mut self.chain, &mut live, &mut delta) {
            trace!(kind = name, "edit was a no-op");
            return None;
        }
        cursors.store(&self.chain, &live);
        let region = undo::performed_region(&delta, self.chain.line_count());
        debug!(
            kind = name,
            cursors = live.len(),
            edits = delta.leaf().applied.len(),
            lines = self.chain.line_count(),
            "applied edit"
        );
        self.undo_manager.push(delta);
        region
    }

    fn apply_ranges(&mut self, cursors: &mut CursorSet, edits: Vec<RangeEdit>) -> Option<DirtyRegion> {
        if edits.is_empty() {
            return None;
        }
        self.apply(cursors, DeltaKind::ReplaceRanges { edits })
    }

    fn copied_text(&self, cursors: &[Cursor]) -> String {
        let selections: Vec<String> = cursors
            .iter()
            .filter(|cursor| cursor.has_selection())
            .map(|cursor| cursor.selected_text(&self.chain))
            .collect();
        if !selections.is_empty() {
            return selections.join("\n");
        }
        // Without a selection every cursor copies its whole line
        cursors
            .iter()
            .map(|cursor| {
                let (start, terminator) = self.chain.line_bounds(cursor.active);
                format!("{}\n", self.chain.text_between(start, terminator))
            })
            .collect()
    }

    fn indent_unit(&self) -> String {
        if self.expand_tab {
            " ".repeat(self.chain.tab_width())
        } else {
            "\t".to_string()
        }
    }

    /// Every line touched by a cursor, ascending. A selection ending at
    /// column 0 does not touch that last line.
    fn touched_lines(&self, cursors: &CursorSet) -> Vec<usize> {
        let mut hint = self.chain.head();
        let mut lines: Vec<usize> = cursors
            .as_slice()
            .iter()
            .flat_map(|data| {
                let begin = self.chain.clamped_position_near(hint, data.begin());
                let end = self.chain.clamped_position_near(begin.chunk, data.end());
                hint = end.chunk;
                let begin = self.chain.logical(begin);
                let end = self.chain.logical(end);
                let last = if end.column == 0 && end.line > begin.line {
                    end.line - 1
                } else {
                    end.line
                };
                begin.line..=last
            })
            .collect();
        lines.sort_unstable();
        lines.dedup();
        lines
    }

    /// `lines` paired with their text. The lines must be ascending.
    fn texts_of<'a>(&'a self, lines: &'a [usize]) -> impl Iterator<Item = (usize, &'a str)> + 'a {
        let mut hint = self.chain.head();
        lines.iter().map(move |&line| {
            let (id, local) = self.chain.chunk_for_line_near(hint, line);
            hint = id;
            (line, self.chain.chunk(id).line_text(local))
        })
    }

    fn unindent_edit(&self, line: usize, text: &str) -> Option<RangeEdit> {
        let width = if text.starts_with('\t') {
            1
        } else {
            text.bytes()
                .take(self.chain.tab_width())
                .take_while(|&byte| byte == b' ')
                .count()
        };
        (width > 0).then(|| RangeEdit::remove(LogicalPosition::new(line, 0), LogicalPosition::new(line, width)))
    }

    fn encode(&self, line_ending: LineEnding, transcoder: &dyn Transcoder) -> Result<Vec<u8>, DocumentError> {
        let mut bytes = Vec::with_capacity(self.chain.total_width() + self.chain.line_count());
        if self.encoding == Encoding::Utf8Bom {
            bytes.extend_from_slice(UTF8_BOM);
        }
        for (index, line) in self.chain.lines(0).enumerate() {
            if index > 0 {
                bytes.extend_from_slice(line_ending.as_str().as_bytes());
            }
            bytes.extend_from_slice(line.as_bytes());
        }
        if self.encoding.is_utf8() {
            Ok(bytes)
        } else {
            Ok(transcoder.convert(&bytes, &Encoding::Utf8, &self.encoding)?)
        }
    }
}

fn normalize_newlines(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(text)
    }
}

/// A text document shared between one writer and any number of readers.
///
/// Every edit takes the write lock for the whole multi-cursor batch; queries,
/// searches and saves take the read lock. Callers own their cursor sets and
/// pass them in explicitly.
pub struct Document {
    state: RwLock<DocumentState>,
}

impl Document {
    pub fn new() -> Self {
        Self::with_options("", &DocumentOptions::default())
    }

    /// Wrap already decoded text. `line_ending` is what the text will be
    /// written back with.
    pub fn open(text: &str, line_ending: LineEnding) -> Self {
        let options = DocumentOptions {
            line_ending,
            ..DocumentOptions::default()
        };
        Self::with_options(text, &options)
    }

    pub fn with_options(text: &str, options: &DocumentOptions) -> Self {
        Self::build(text, options, options.line_ending, Encoding::Utf8)
    }

    fn build(text: &str, options: &DocumentOptions, line_ending: LineEnding, encoding: Encoding) -> Self {
        let capacity = options.chunk_capacity.max(MIN_CHUNK_CAPACITY);
        let chain = ChunkChain::from_text(&normalize_newlines(text), capacity, options.tab_width.max(1));
        Self {
            state: RwLock::new(DocumentState {
                chain,
                undo_manager: UndoManager::with_max_levels(options.undo_levels),
                line_ending,
                encoding,
                filename: None,
                expand_tab: options.expand_tab,
            }),
        }
    }

    /// Build a document from decoded UTF-8 bytes, stripping a byte-order
    /// mark and detecting the line ending.
    pub fn from_bytes(bytes: &[u8], options: &DocumentOptions) -> Result<Self, DocumentError> {
        let (bytes, encoding) = match bytes.strip_prefix(UTF8_BOM) {
            Some(rest) => (rest, Encoding::Utf8Bom),
            None => (bytes, Encoding::Utf8),
        };
        let text = std::str::from_utf8(bytes)?;
        let line_ending = if text.contains(|c: char| c == '\n' || c == '\r') {
            LineEnding::detect(text)
        } else {
            options.line_ending
        };
        Ok(Self::build(text, options, line_ending, encoding))
    }

    pub fn load(
        path: impl AsRef<Path>,
        options: &DocumentOptions,
        encoding: Encoding,
        transcoder: &dyn Transcoder,
    ) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let raw = fs::read(path).map_err(|source| DocumentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let decoded = if encoding.is_utf8() {
            raw
        } else {
            transcoder.convert(&raw, &encoding, &Encoding::Utf8)?
        };
        let document = Self::from_bytes(&decoded, options)?;
        {
            let mut state = document.write();
            state.filename = Some(path.to_path_buf());
            if !encoding.is_utf8() {
                state.encoding = encoding;
            }
            debug!(
                path = %path.display(),
                lines = state.chain.line_count(),
                chunks = state.chain.chunk_count(),
                line_ending = ?state.line_ending,
                "loaded document"
            );
        }
        Ok(document)
    }

    pub fn read(&self) -> RwLockReadGuard<'_, DocumentState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, DocumentState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn line_count(&self) -> usize {
        self.read().line_count()
    }

    pub fn line(&self, line: usize) -> Option<String> {
        self.read().line(line).map(String::from)
    }

    pub fn text(&self) -> String {
        self.read().text()
    }

    pub fn line_ending(&self) -> LineEnding {
        self.read().line_ending
    }

    pub fn set_line_ending(&self, line_ending: LineEnding) {
        self.write().line_ending = line_ending;
    }

    pub fn encoding(&self) -> Encoding {
        self.read().encoding.clone()
    }

    pub fn set_encoding(&self, encoding: Encoding) {
        self.write().encoding = encoding;
    }

    pub fn filename(&self) -> Option<PathBuf> {
        self.read().filename.clone()
    }

    pub fn max_line_width(&self) -> usize {
        self.read().chain.max_line_width()
    }

    pub fn is_modified(&self) -> bool {
        self.read().undo_manager.is_modified()
    }

    pub fn can_undo(&self) -> bool {
        self.read().undo_manager.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.read().undo_manager.can_redo()
    }

    /// Line ranges of chunks edited since the last call, for re-highlighting.
    pub fn take_reparse_ranges(&self) -> Vec<(usize, usize)> {
        self.write().chain.take_reparse_ranges()
    }

    /// Type `text` at every cursor, replacing selections.
    pub fn insert(&self, cursors: &mut CursorSet, text: &str) -> Option<DirtyRegion> {
        let text = normalize_newlines(text).into_owned();
        self.write().apply(cursors, DeltaKind::ReplaceText { text })
    }

    /// Replace the selections with `text`. Does nothing when no cursor has
    /// a selection.
    pub fn replace(&self, cursors: &mut CursorSet, text: &str) -> Option<DirtyRegion> {
        if !cursors.as_slice().iter().any(CursorData::has_selection) {
            return None;
        }
        self.insert(cursors, text)
    }

    /// Delete the selections, or the character/word/line part in
    /// `direction` of every caret when nothing is selected.
    pub fn delete(&self, cursors: &mut CursorSet, direction: Direction, granularity: Granularity) -> Option<DirtyRegion> {
        let kind = match granularity {
            Granularity::Character => DeltaKind::RemoveCharacter(direction),
            Granularity::Word => DeltaKind::RemoveWord(direction),
            Granularity::Line => DeltaKind::RemoveLine(direction),
        };
        self.write().apply(cursors, kind)
    }

    /// Replace each selection with `replacement` expanded against its match
    /// of `regex`. Nothing happens unless every selection matches in full.
    pub fn regex_replace(&self, cursors: &mut CursorSet, regex: &Regex, replacement: &str) -> Option<DirtyRegion> {
        let kind = DeltaKind::RegexReplace {
            regex: regex.clone(),
            replacement: normalize_newlines(replacement).into_owned(),
        };
        self.write().apply(cursors, kind)
    }

    pub fn add_empty_line(&self, cursors: &mut CursorSet, direction: Direction) -> Option<DirtyRegion> {
        self.write().apply(cursors, DeltaKind::AddEmptyLine(direction))
    }

    pub fn copy_text(&self, cursors: &CursorSet) -> String {
        let state = self.read();
        let mut live = cursors.resolve(&state.chain);
        normalize_cursors(&state.chain, &mut live);
        state.copied_text(&live)
    }

    /// Copy, then delete what was copied. Carets without a selection cut
    /// their whole line; the last line takes the newline before it instead
    /// of leaving an empty line behind.
    pub fn cut_text(&self, cursors: &mut CursorSet) -> String {
        let mut state = self.write();
        let mut live = cursors.resolve(&state.chain);
        normalize_cursors(&state.chain, &mut live);
        let text = state.copied_text(&live);
        if !live.iter().any(Cursor::has_selection) {
            for cursor in live.iter_mut() {
                cursor.select_line(&state.chain);
            }
            normalize_cursors(&state.chain, &mut live);
            let end_of_document = state.chain.end_of_document();
            if let Some(last) = live.last_mut().filter(|last| last.end(&state.chain) == end_of_document) {
                if let Some(before) = state.chain.prev_char(last.begin(&state.chain)) {
                    *last = Cursor::with_selection(before, end_of_document);
                }
            }
            cursors.store(&state.chain, &live);
        }
        state.apply(cursors, DeltaKind::RemoveCharacter(Direction::Left));
        text
    }

    /// Indent (Right) or unindent (Left). A bare caret being indented gets
    /// one indent unit typed at it; otherwise every touched line shifts.
    pub fn indent(&self, cursors: &mut CursorSet, direction: Direction) -> Option<DirtyRegion> {
        let mut state = self.write();
        let has_selection = cursors.as_slice().iter().any(CursorData::has_selection);
        if direction == Direction::Right && !has_selection {
            let text = state.indent_unit();
            return state.apply(cursors, DeltaKind::ReplaceText { text });
        }
        let lines = state.touched_lines(cursors);
        let edits: Vec<RangeEdit> = match direction {
            Direction::Right => {
                let unit = state.indent_unit();
                state
                    .texts_of(&lines)
                    .filter(|(_, text)| !text.is_empty())
                    .map(|(line, _)| RangeEdit::insert(LogicalPosition::new(line, 0), unit.clone()))
                    .collect()
            }
            Direction::Left => state
                .texts_of(&lines)
                .filter_map(|(line, text)| state.unindent_edit(line, text))
                .collect(),
        };
        state.apply_ranges(cursors, edits)
    }

    pub fn remove_trailing_whitespace(&self, cursors: &mut CursorSet) -> Option<DirtyRegion> {
        let mut state = self.write();
        let edits: Vec<RangeEdit> = state
            .chain
            .lines(0)
            .enumerate()
            .filter_map(|(line, text)| {
                let kept = text.trim_end_matches([' ', '\t']).len();
                (kept < text.len()).then(|| {
                    RangeEdit::remove(LogicalPosition::new(line, kept), LogicalPosition::new(line, text.len()))
                })
            })
            .collect();
        state.apply_ranges(cursors, edits)
    }

    /// Rewrite the leading whitespace of every line in `style`, keeping its
    /// display width.
    pub fn convert_indentation(&self, cursors: &mut CursorSet, style: IndentStyle) -> Option<DirtyRegion> {
        let mut state = self.write();
        let tab_width = state.chain.tab_width();
        let edits: Vec<RangeEdit> = state
            .chain
            .lines(0)
            .enumerate()
            .filter_map(|(line, text)| {
                let leading = text.len() - text.trim_start_matches([' ', '\t']).len();
                let width = super::text_metrics::display_width(&text[..leading], tab_width);
                let wanted = match style {
                    IndentStyle::Tabs => "\t".repeat(width / tab_width) + &" ".repeat(width % tab_width),
                    IndentStyle::Spaces => " ".repeat(width),
                };
                (wanted != text[..leading]).then(|| {
                    RangeEdit::new(LogicalPosition::new(line, 0), LogicalPosition::new(line, leading), wanted)
                })
            })
            .collect();
        state.apply_ranges(cursors, edits)
    }

    /// Replace the whole text as one undoable edit, e.g. after reloading the
    /// file. The result counts as unmodified.
    pub fn set_text(&self, cursors: &mut CursorSet, text: &str) -> Option<DirtyRegion> {
        let mut state = self.write();
        let last_line = state.chain.line_count() - 1;
        let end = LogicalPosition::new(last_line, state.chain.line_text(last_line).len());
        let text = normalize_newlines(text).into_owned();
        let region = state.apply_ranges(cursors, vec![RangeEdit::new(LogicalPosition::default(), end, text)]);
        state.undo_manager.mark_saved();
        region
    }

    /// Re-read the file this document was loaded from.
    pub fn reload(&self, cursors: &mut CursorSet, transcoder: &dyn Transcoder) -> Result<Option<DirtyRegion>, DocumentError> {
        let (path, encoding) = {
            let state = self.read();
            let path = state.filename.clone().ok_or(DocumentError::NoFileName)?;
            (path, state.encoding.clone())
        };
        let raw = fs::read(&path).map_err(|source| DocumentError::Read {
            path: path.clone(),
            source,
        })?;
        let decoded = if encoding.is_utf8() {
            raw
        } else {
            transcoder.convert(&raw, &encoding, &Encoding::Utf8)?
        };
        let bytes = decoded.strip_prefix(UTF8_BOM).unwrap_or(&decoded);
        let text = std::str::from_utf8(bytes)?;
        debug!(path = %path.display(), "reloading document");
        Ok(self.set_text(cursors, text))
    }

    pub fn undo(&self, cursors: &mut CursorSet) -> Option<DirtyRegion> {
        let mut guard = self.write();
        let state = &mut *guard;
        let delta = state.undo_manager.pop_undo()?;
        let restored = undo::revert(&mut state.chain, &delta);
        let region = undo::reverted_region(&delta, state.chain.line_count());
        debug!(kind = delta.kind.name(), remaining = state.undo_manager.undo_count(), "undo");
        cursors.replace(restored);
        state.undo_manager.push_redo(delta);
        region
    }

    pub fn redo(&self, cursors: &mut CursorSet) -> Option<DirtyRegion> {
        let mut guard = self.write();
        let state = &mut *guard;
        let record = state.undo_manager.pop_redo()?;
        let mut live = CursorSet::new(record.stored_cursors.clone()).resolve(&state.chain);
        let mut delta = Delta::new(record.kind);
        if !undo::perform(&mut state.chain, &mut live, &mut delta) {
            warn!(kind = delta.kind.name(), "redo no longer applies, dropping it");
            return None;
        }
        cursors.store(&state.chain, &live);
        let region = undo::performed_region(&delta, state.chain.line_count());
        debug!(kind = delta.kind.name(), remaining = state.undo_manager.redo_count(), "redo");
        state.undo_manager.push_redone(delta);
        region
    }

    /// Move every cursor, then merge any that now overlap.
    pub fn move_cursors(&self, cursors: &mut CursorSet, motion: Motion, extend_selection: bool) {
        self.update_cursors(cursors, |cursor, chain| cursor.apply_motion(chain, motion, extend_selection));
    }

    pub fn select_word(&self, cursors: &mut CursorSet) {
        self.update_cursors(cursors, |cursor, chain| cursor.select_word(chain));
    }

    pub fn select_line(&self, cursors: &mut CursorSet) {
        self.update_cursors(cursors, |cursor, chain| cursor.select_line(chain));
    }

    fn update_cursors(&self, cursors: &mut CursorSet, update: impl Fn(&mut Cursor, &ChunkChain)) {
        let state = self.read();
        let mut live = cursors.resolve(&state.chain);
        for cursor in live.iter_mut() {
            update(cursor, &state.chain);
        }
        normalize_cursors(&state.chain, &mut live);
        cursors.store(&state.chain, &live);
    }

    /// Search outward from `from`'s selection. `Ok(None)` means no match.
    pub fn find(&self, query: &SearchQuery, from: &CursorData) -> Result<Option<TextRange>, SearchError> {
        let regex = query.compile()?;
        let state = self.read();
        let begin = state.chain.clamp(from.begin());
        let end = state.chain.clamp(from.end());
        Ok(find_match(&state.chain, &regex, query.direction, begin, end, query.wrap))
    }

    /// Write the text with `line_ending` terminators in the document's
    /// encoding. Returns the number of bytes written.
    pub fn write_to(
        &self,
        writer: &mut impl Write,
        line_ending: LineEnding,
        transcoder: &dyn Transcoder,
    ) -> Result<usize, DocumentError> {
        let bytes = self.read().encode(line_ending, transcoder)?;
        writer.write_all(&bytes)?;
        Ok(bytes.len())
    }

    pub fn save(&self, transcoder: &dyn Transcoder) -> Result<usize, DocumentError> {
        let path = self.filename().ok_or(DocumentError::NoFileName)?;
        self.save_as(path, transcoder)
    }

    pub fn save_as(&self, path: impl AsRef<Path>, transcoder: &dyn Transcoder) -> Result<usize, DocumentError> {
        let path = path.as_ref();
        let bytes = {
            let state = self.read();
            state.encode(state.line_ending, transcoder)?
        };
        fs::write(path, &bytes).map_err(|source| DocumentError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        let mut state = self.write();
        state.filename = Some(path.to_path_buf());
        state.undo_manager.mark_saved();
        debug!(path = %path.display(), bytes = bytes.len(), "saved document");
        Ok(bytes.len())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
