//! # Context Vector Store
//!
//! TF-IDF vector space over corpus chunks, with a TTL-cached snapshot handle.
//!
//! ## Architecture
//!
//! ```text
//! ChunkSource ──load──> LoadReport { chunks, warnings }
//!     │
//!     ├──> Analyzer (case-fold, \w\w+ tokens, stop words, 1-2 grams)
//!     │
//!     ├──> TfIdfVectorizer::fit
//!     │      └─> vocabulary (≤ max_features) + smoothed idf
//!     │
//!     └──> CorpusSnapshot { chunks, matrix }  ── Arc swap ──> Corpus::get()
//! ```
//!
//! ## Example
//!
//! ```
//! use context_corpus::{Chunk, ChunkType};
//! use context_vector_store::{Corpus, CorpusOptions};
//!
//! let corpus = Corpus::from_chunks(
//!     vec![Chunk::new("setup.sh", 1, 4, "#!/bin/sh\ninstall dependencies", ChunkType::Script)],
//!     CorpusOptions::default(),
//! );
//! let snapshot = corpus.get();
//! let scores = snapshot.similarities("install");
//! assert!(scores[0] > 0.0);
//! ```

mod analyzer;
mod corpus;
mod error;
mod tfidf;

pub use analyzer::{is_stop_word, tokenize, Analyzer, ENGLISH_STOP_WORDS};
pub use corpus::{Corpus, CorpusOptions, CorpusSnapshot, CorpusStats, DEFAULT_CORPUS_TTL};
pub use error::{Result, VectorStoreError};
pub use tfidf::{SparseVector, TfIdfMatrix, TfIdfVectorizer, VectorizerConfig};

// Re-export corpus types for convenience
pub use context_corpus::{Chunk, ChunkId, ChunkType, FileTypeCategory};
