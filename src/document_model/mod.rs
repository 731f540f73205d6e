/// Document model subsystem - Chunked text storage and multi-cursor editing
/// 
/// This module contains the chunk chain that stores the text, the cursor and
/// delta types every edit is expressed in, the undo engine, search, and the
/// lock-guarded `Document` facade that ties them together.

pub mod chunk;
pub mod chunk_chain;
pub mod cursor;
pub mod delta;
pub mod document;
pub mod encoding;
pub mod search_state;
pub mod text_metrics;
pub mod undo;

// Re-export main types for convenience
pub use chunk_chain::{ChunkChain, LogicalPosition, TextPosition};
pub use cursor::{CursorData, CursorSet, Direction, Motion};
pub use delta::{DeltaKind, DirtyRegion, RangeEdit};
pub use document::{Document, DocumentError, DocumentOptions, Granularity, IndentStyle, LineEnding};
pub use encoding::{Encoding, EncodingError, Transcoder, Utf8Transcoder};
pub use search_state::{MatchBlock, SearchDirection, SearchError, SearchQuery, SearchStatus, SearchTask, TextRange, find_all};
pub use undo::UndoManager;
