use crate::error::Result;
use crate::types::{Chunk, MIN_CHUNK_TEXT_LEN};
use std::fmt;
use std::path::PathBuf;

/// Non-fatal problem encountered while loading records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWarning {
    pub path: PathBuf,
    pub kind: WarningKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Whole record file skipped
    MalformedRecord,
    /// Individual chunk entries dropped for too-short text
    DroppedChunks,
    /// Store could not be read at all
    CorpusUnavailable,
    /// Vector space could not be built over the loaded chunks
    VectorizationFailure,
}

impl LoadWarning {
    pub fn new(path: impl Into<PathBuf>, kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}: {}", self.kind, self.path.display(), self.message)
    }
}

/// Chunks plus the warnings collected while producing them
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub chunks: Vec<Chunk>,
    pub warnings: Vec<LoadWarning>,
    /// Record files successfully parsed
    pub records_loaded: usize,
}

impl LoadReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Drop chunks whose trimmed text has at most `min_text_len` characters, recording a
    /// warning against `origin` when any were dropped
    pub fn retain_longer_than(&mut self, min_text_len: usize, origin: impl Into<PathBuf>) {
        let before = self.chunks.len();
        self.chunks.retain(|chunk| chunk.has_text_longer_than(min_text_len));
        let dropped = before - self.chunks.len();
        if dropped > 0 {
            self.warnings.push(LoadWarning::new(
                origin,
                WarningKind::DroppedChunks,
                format!("{dropped} chunk(s) with empty or too-short text"),
            ));
        }
    }
}

/// Producer of corpus chunks
///
/// Implementations must isolate per-record failures into `LoadReport::warnings` and reserve
/// `Err` for a store that cannot be read at all.
pub trait ChunkSource: Send + Sync {
    fn load(&self) -> Result<LoadReport>;

    /// Human-readable location for logs
    fn describe(&self) -> String;
}

/// In-memory chunk list, for callers that already hold chunks
#[derive(Debug, Clone)]
pub struct StaticSource {
    chunks: Vec<Chunk>,
    min_text_len: usize,
}

impl StaticSource {
    #[must_use]
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self {
            chunks,
            min_text_len: MIN_CHUNK_TEXT_LEN,
        }
    }

    #[must_use]
    pub const fn with_min_text_len(mut self, min_text_len: usize) -> Self {
        self.min_text_len = min_text_len;
        self
    }
}

impl Default for StaticSource {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ChunkSource for StaticSource {
    fn load(&self) -> Result<LoadReport> {
        let mut report = LoadReport {
            chunks: self.chunks.clone(),
            warnings: Vec::new(),
            records_loaded: 1,
        };
        report.retain_longer_than(self.min_text_len, "<memory>");
        Ok(report)
    }

    fn describe(&self) -> String {
        format!("in-memory ({} chunks)", self.chunks.len())
    }
}
