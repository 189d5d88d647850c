//! # Context Corpus
//!
//! Chunk data model and loaders for externally indexed corpora.
//!
//! The indexer that splits source files into chunks lives outside this workspace. It writes one
//! JSON record per source file; this crate reads those records into [`Chunk`]s, isolating every
//! per-file failure into a [`LoadWarning`] so one corrupted record never blocks the rest.
//!
//! ## Record format
//!
//! ```text
//! {
//!   "source_path": "scripts/setup_windows.bat",
//!   "last_modified": "2024-05-01T12:00:00Z",        (optional)
//!   "chunks": [
//!     {"text": "...", "type": "script", "start_line": 1, "end_line": 20, "confidence": 0.9}
//!   ]
//! }
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use context_corpus::{ChunkSource, JsonRecordSource};
//!
//! let report = JsonRecordSource::new(".context/chunks").load()?;
//! for warning in &report.warnings {
//!     eprintln!("skipped: {warning}");
//! }
//! println!("{} chunks", report.chunks.len());
//! # Ok::<(), context_corpus::CorpusError>(())
//! ```

mod error;
mod loader;
mod source;
mod types;

pub use error::{CorpusError, Result};
pub use loader::{parse_record_file, ChunkEntry, FileRecord, JsonRecordSource};
pub use source::{ChunkSource, LoadReport, LoadWarning, StaticSource, WarningKind};
pub use types::{file_name_of, Chunk, ChunkId, ChunkType, FileTypeCategory, MIN_CHUNK_TEXT_LEN};
