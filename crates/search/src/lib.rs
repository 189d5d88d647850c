//! Query-time retrieval: intent classification, query expansion, multi-variant
//! similarity ranking, relevance boosting, diversity selection and token-budgeted
//! context assembly.
//!
//! ```text
//! query ─> QueryClassifier ─> QueryExpander (variants)
//!            │                        │
//!            │              SimilarityRanker (parallel, per-chunk max)
//!            │                        │
//!            └──────────────> RelevanceScorer ─> DiversitySelector ─> SearchResult
//!                                                                         │
//!                                                 ContextOptimizer <──────┘
//!                                                        │
//!                                                  ContextBundle
//! ```

mod config;
mod diversity;
mod engine;
mod error;
mod filter;
mod optimizer;
mod query_classifier;
mod query_expansion;
mod ranker;
mod scoring;

pub use config::{
    CategoryWeights, CorpusConfig, DiversityConfig, ExactMatchWeights, FreshnessBoost,
    IntentTable, LengthBoost, OptimizerConfig, RetrievalConfig, ScoringConfig, SearchConfig,
};
pub use diversity::DiversitySelector;
pub use engine::{RetrievalEngine, SearchResult};
pub use error::{Result, SearchError};
pub use filter::FileTypeFilter;
pub use optimizer::{
    chunk_quality, dynamic_threshold, estimate_tokens, jaccard_similarity, smart_truncate,
    unit_relevance, ContextBundle, ContextEntry, ContextOptimizer, OptimizationStats,
};
pub use query_classifier::{query_terms, Intent, IntentCounts, QueryClassifier};
pub use query_expansion::{detect_domains, Domain, ExpandedQuery, QueryAnalysis, QueryExpander};
pub use ranker::{merge_max, Cancellation, SimilarityRanker, VariantScores};
pub use scoring::{compare_relevance, sort_by_relevance, QueryContext, RelevanceScorer, ScoreBreakdown};

pub use context_corpus::{Chunk, ChunkId, ChunkType, FileTypeCategory, JsonRecordSource};
pub use context_vector_store::{Corpus, CorpusOptions};
