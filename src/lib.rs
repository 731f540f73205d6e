//! Chunked multi-cursor text document core.
//!
//! Text lives in a chain of bounded chunks; every edit is a reversible
//! delta applied across a whole cursor set under one write lock.

pub mod config;
pub mod document_model;

pub use document_model::{CursorData, CursorSet, Document, DocumentError, DocumentOptions, LineEnding};
