use crate::error::{CorpusError, Result};
use crate::source::{ChunkSource, LoadReport, LoadWarning, WarningKind};
use crate::types::{file_name_of, Chunk, ChunkType, MIN_CHUNK_TEXT_LEN};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One externally produced record: all chunks of a single source file
#[derive(Debug, Clone, Deserialize)]
pub struct FileRecord {
    #[serde(alias = "file_path", alias = "path")]
    pub source_path: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub chunks: Vec<ChunkEntry>,
}

/// Chunk entry inside a record
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkEntry {
    #[serde(alias = "content")]
    pub text: String,
    #[serde(rename = "type", alias = "chunk_type", default)]
    pub chunk_type: Option<String>,
    #[serde(default)]
    pub start_line: usize,
    #[serde(default)]
    pub end_line: usize,
    /// Missing or `null` means full confidence
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordFile {
    Many(Vec<FileRecord>),
    One(FileRecord),
}

impl FileRecord {
    /// Convert entries into chunks, returning how many were dropped for text of
    /// `min_text_len` characters or fewer
    pub fn into_chunks(self, min_text_len: usize) -> (Vec<Chunk>, usize) {
        let file_name = self
            .file_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| file_name_of(&self.source_path));
        let mut dropped = 0usize;
        let mut chunks = Vec::with_capacity(self.chunks.len());
        for entry in self.chunks {
            let chunk_type = entry
                .chunk_type
                .as_deref()
                .map_or(ChunkType::Other, ChunkType::parse);
            let end_line = entry.end_line.max(entry.start_line);
            let mut chunk = Chunk::new(
                self.source_path.clone(),
                entry.start_line,
                end_line,
                entry.text,
                chunk_type,
            )
            .with_confidence(entry.confidence.unwrap_or(1.0))
            .with_file_name(file_name.clone());
            chunk.last_modified = self.last_modified;
            if chunk.has_text_longer_than(min_text_len) {
                chunks.push(chunk);
            } else {
                dropped += 1;
            }
        }
        (chunks, dropped)
    }
}

/// Loads chunk records from a directory of `*.json` files (or one file)
#[derive(Debug, Clone)]
pub struct JsonRecordSource {
    root: PathBuf,
    min_text_len: usize,
}

impl JsonRecordSource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            min_text_len: MIN_CHUNK_TEXT_LEN,
        }
    }

    /// Builder: drop chunks whose trimmed text has at most `min_text_len` characters
    #[must_use]
    pub const fn with_min_text_len(mut self, min_text_len: usize) -> Self {
        self.min_text_len = min_text_len;
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_files(&self) -> Result<Vec<PathBuf>> {
        if !self.root.exists() {
            return Err(CorpusError::unavailable(&self.root, "path does not exist"));
        }
        if self.root.is_file() {
            return Ok(vec![self.root.clone()]);
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    return Err(CorpusError::unavailable(&self.root, err.to_string()));
                }
                Err(err) => {
                    log::debug!("Skipping unreadable entry under {}: {err}", self.root.display());
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let is_json = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
            if is_json {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Parse one record file; a malformed file yields `CorpusError::MalformedRecord`
pub fn parse_record_file(path: &Path) -> Result<Vec<FileRecord>> {
    let bytes = std::fs::read(path).map_err(|err| CorpusError::malformed(path, err.to_string()))?;
    let parsed: RecordFile =
        serde_json::from_slice(&bytes).map_err(|err| CorpusError::malformed(path, err.to_string()))?;
    let records = match parsed {
        RecordFile::Many(records) => records,
        RecordFile::One(record) => vec![record],
    };
    if let Some(bad) = records.iter().find(|r| r.source_path.trim().is_empty()) {
        return Err(CorpusError::malformed(
            path,
            format!("record with empty source_path ({} chunks)", bad.chunks.len()),
        ));
    }
    Ok(records)
}

impl ChunkSource for JsonRecordSource {
    fn load(&self) -> Result<LoadReport> {
        let files = self.record_files()?;
        let mut report = LoadReport::default();

        for path in files {
            let records = match parse_record_file(&path) {
                Ok(records) => records,
                Err(err) => {
                    log::warn!("{err}");
                    report.warnings.push(LoadWarning::new(
                        &path,
                        WarningKind::MalformedRecord,
                        err.to_string(),
                    ));
                    continue;
                }
            };

            let mut dropped = 0usize;
            for record in records {
                let (chunks, short) = record.into_chunks(self.min_text_len);
                dropped += short;
                report.chunks.extend(chunks);
            }
            if dropped > 0 {
                report.warnings.push(LoadWarning::new(
                    &path,
                    WarningKind::DroppedChunks,
                    format!("{dropped} chunk(s) with empty or too-short text"),
                ));
            }
            report.records_loaded += 1;
        }

        log::debug!(
            "Loaded {} chunks from {} record files ({} warnings)",
            report.chunks.len(),
            report.records_loaded,
            report.warnings.len()
        );
        Ok(report)
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}
