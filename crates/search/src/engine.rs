use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use context_corpus::{Chunk, ChunkSource};
use context_vector_store::{Corpus, CorpusSnapshot};
use serde::Serialize;

use crate::config::RetrievalConfig;
use crate::diversity::DiversitySelector;
use crate::error::{Result, SearchError};
use crate::filter::FileTypeFilter;
use crate::optimizer::{ContextBundle, ContextOptimizer};
use crate::query_classifier::{Intent, QueryClassifier};
use crate::query_expansion::QueryExpander;
use crate::ranker::{Cancellation, SimilarityRanker, VariantScores};
use crate::scoring::{QueryContext, RelevanceScorer};

/// Ranked chunks for one query plus what the engine did to get them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub query: String,
    pub intent: Intent,
    /// Query texts actually ranked, original first
    pub variants: Vec<String>,
    /// Relevance order, each carrying its `relevance_score`
    pub chunks: Vec<Chunk>,
    /// Candidates that passed the filter and relevance floor before selection
    pub total_candidates: usize,
    pub elapsed: Duration,
    /// Relevance floor applied to candidates
    pub similarity_threshold: f64,
    pub timed_out: bool,
    pub warnings: Vec<String>,
}

impl SearchResult {
    fn empty(query: &str, intent: Intent, similarity_threshold: f64) -> Self {
        Self {
            query: query.to_string(),
            intent,
            variants: Vec::new(),
            chunks: Vec::new(),
            total_candidates: 0,
            elapsed: Duration::ZERO,
            similarity_threshold,
            timed_out: false,
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VariantMode {
    Single,
    Multi,
}

/// Query-time entry point over a shared corpus.
///
/// Cloning is cheap; clones share the corpus cache and configuration.
#[derive(Clone)]
pub struct RetrievalEngine {
    corpus: Arc<Corpus>,
    config: Arc<RetrievalConfig>,
    expander: Arc<QueryExpander>,
    scorer: Arc<RelevanceScorer>,
    selector: Arc<DiversitySelector>,
    optimizer: Arc<ContextOptimizer>,
}

impl RetrievalEngine {
    #[must_use]
    pub fn new(corpus: Arc<Corpus>, config: RetrievalConfig) -> Self {
        let expander = QueryExpander::new().with_limits(
            config.search.max_synonyms_per_term,
            config.search.max_key_terms,
        );
        let scorer = RelevanceScorer::new(config.scoring.clone());
        let selector = DiversitySelector::new(&config.diversity);
        let optimizer = ContextOptimizer::new(config.optimizer.clone(), &config.diversity);
        Self {
            corpus,
            config: Arc::new(config),
            expander: Arc::new(expander),
            scorer: Arc::new(scorer),
            selector: Arc::new(selector),
            optimizer: Arc::new(optimizer),
        }
    }

    /// Build the corpus cache over `source` using the config's corpus options
    #[must_use]
    pub fn from_source(source: impl ChunkSource + 'static, config: RetrievalConfig) -> Self {
        let corpus = Corpus::new(source, config.corpus_options());
        Self::new(Arc::new(corpus), config)
    }

    #[must_use]
    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    #[must_use]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Rank the corpus against the query text alone
    #[must_use]
    pub fn search(
        &self,
        query: &str,
        max_results: usize,
        file_type_filter: Option<&[String]>,
    ) -> SearchResult {
        self.execute(
            query,
            max_results,
            file_type_filter,
            VariantMode::Single,
            &Cancellation::new(),
        )
    }

    /// Rank the corpus against every query variant and keep each chunk's best score
    #[must_use]
    pub fn search_multi_query(
        &self,
        query: &str,
        max_results: usize,
        file_type_filter: Option<&[String]>,
    ) -> SearchResult {
        self.search_multi_query_cancellable(
            query,
            max_results,
            file_type_filter,
            &Cancellation::new(),
        )
    }

    /// Multi-query search that stops evaluating variants once `cancel` fires.
    /// Whatever was ranked before that is still returned, flagged `timed_out`.
    #[must_use]
    pub fn search_multi_query_cancellable(
        &self,
        query: &str,
        max_results: usize,
        file_type_filter: Option<&[String]>,
        cancel: &Cancellation,
    ) -> SearchResult {
        self.execute(
            query,
            max_results,
            file_type_filter,
            VariantMode::Multi,
            cancel,
        )
    }

    /// Multi-query search on the blocking pool, abandoned after `timeout`
    pub async fn search_with_timeout(
        &self,
        query: &str,
        max_results: usize,
        file_type_filter: Option<Vec<String>>,
        timeout: Duration,
    ) -> SearchResult {
        let started = Instant::now();
        let cancel = Cancellation::new();
        let engine = self.clone();
        let task_cancel = cancel.clone();
        let task_query = query.to_string();
        let handle = tokio::task::spawn_blocking(move || {
            engine.search_multi_query_cancellable(
                &task_query,
                max_results,
                file_type_filter.as_deref(),
                &task_cancel,
            )
        });

        let threshold = self.config.search.min_relevance;
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                log::warn!("Search task for '{query}' failed: {err}");
                let mut result = SearchResult::empty(query, Intent::General, threshold);
                result.warnings.push(format!("search task failed: {err}"));
                result.elapsed = started.elapsed();
                result
            }
            Err(_) => {
                cancel.cancel();
                log::warn!("Search for '{query}' timed out after {timeout:?}");
                let mut result =
                    SearchResult::empty(query, QueryClassifier::classify(query), threshold);
                result.timed_out = true;
                result.elapsed = started.elapsed();
                result
            }
        }
    }

    /// Budget chunks into a context bundle, balancing without intent bias
    #[must_use]
    pub fn optimize_context(&self, chunks: Vec<Chunk>, max_tokens: usize) -> ContextBundle {
        self.optimize_context_for(chunks, max_tokens, Intent::General)
    }

    /// Budget chunks into a context bundle, balancing for the query's intent
    #[must_use]
    pub fn optimize_context_for(
        &self,
        chunks: Vec<Chunk>,
        max_tokens: usize,
        intent: Intent,
    ) -> ContextBundle {
        self.optimizer.optimize(chunks, max_tokens, intent)
    }

    fn execute(
        &self,
        query: &str,
        max_results: usize,
        file_type_filter: Option<&[String]>,
        mode: VariantMode,
        cancel: &Cancellation,
    ) -> SearchResult {
        let started = Instant::now();
        let threshold = self.config.search.min_relevance;
        let mut result = match self.rank(query, max_results, file_type_filter, mode, cancel) {
            Ok(result) => result,
            Err(SearchError::EmptyQuery) => {
                log::debug!("Ignoring empty query");
                SearchResult::empty(query, Intent::General, threshold)
            }
            Err(err) => {
                log::warn!("Search for '{query}' degraded to empty result: {err}");
                let mut result =
                    SearchResult::empty(query, QueryClassifier::classify(query), threshold);
                result.timed_out = matches!(err, SearchError::Cancelled);
                result.warnings.push(err.to_string());
                result
            }
        };
        result.elapsed = started.elapsed();
        log::debug!(
            "Search '{}' ({}) returned {}/{} chunks in {:?}",
            query,
            result.intent,
            result.chunks.len(),
            result.total_candidates,
            result.elapsed
        );
        result
    }

    fn rank(
        &self,
        query: &str,
        max_results: usize,
        file_type_filter: Option<&[String]>,
        mode: VariantMode,
        cancel: &Cancellation,
    ) -> Result<SearchResult> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let snapshot = self.corpus.get();
        let analysis = self
            .expander
            .analyze(query, self.config.search.max_variants);
        let intent = analysis.intent;
        let mut result = SearchResult::empty(query, intent, self.config.search.min_relevance);
        result.warnings = snapshot.warnings().iter().map(ToString::to_string).collect();

        if snapshot.is_empty() {
            log::warn!("Corpus is empty; no results for '{query}'");
            return Ok(result);
        }

        result.variants = match mode {
            VariantMode::Single => vec![query.trim().to_string()],
            VariantMode::Multi => analysis.variants,
        };
        let scores = self.similarities(&snapshot, &result.variants, mode, cancel);
        if scores.cancelled && scores.variants_evaluated == 0 {
            return Err(SearchError::Cancelled);
        }
        result.timed_out = scores.cancelled;

        let filter = file_type_filter.map(FileTypeFilter::new).unwrap_or_default();
        for entry in filter.invalid_entries() {
            result.warnings.push(format!("ignored invalid file filter {entry:?}"));
        }

        let ctx = QueryContext::new(query, intent, Utc::now());
        let candidates = self.scorer.rank_candidates(
            snapshot.chunks(),
            &scores.best_per_chunk(snapshot.chunks()),
            &ctx,
            &filter,
            self.config.search.min_relevance,
        );
        result.total_candidates = candidates.len();
        result.chunks = self.selector.select(candidates, max_results, intent);
        Ok(result)
    }

    fn similarities(
        &self,
        snapshot: &CorpusSnapshot,
        variants: &[String],
        mode: VariantMode,
        cancel: &Cancellation,
    ) -> VariantScores {
        match mode {
            VariantMode::Single => VariantScores {
                scores: variants
                    .first()
                    .map(|q| SimilarityRanker::rank(snapshot, q))
                    .unwrap_or_default(),
                variants_evaluated: 1,
                cancelled: false,
            },
            VariantMode::Multi => SimilarityRanker::rank_variants(snapshot, variants, cancel),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use context_corpus::ChunkType;
    use context_vector_store::CorpusOptions;
    use pretty_assertions::assert_eq;

    fn engine(chunks: Vec<Chunk>) -> RetrievalEngine {
        let corpus = Corpus::from_chunks(chunks, CorpusOptions::default());
        RetrievalEngine::new(Arc::new(corpus), RetrievalConfig::default())
    }

    fn sample() -> Vec<Chunk> {
        vec![
            Chunk::new(
                "scripts/deploy.sh",
                1,
                12,
                "#!/bin/sh\n# deploy the service container to the cluster\ndocker push service",
                ChunkType::Script,
            ),
            Chunk::new(
                "src/parser.rs",
                10,
                40,
                "pub fn parse_config(input: &str) -> Config { toml::from_str(input) }",
                ChunkType::Function,
            ),
            Chunk::new(
                "docs/deploy.md",
                1,
                30,
                "Deployment guide: push the container image and roll out the service.",
                ChunkType::Documentation,
            ),
        ]
    }

    #[test]
    fn empty_query_returns_empty_result() {
        let result = engine(sample()).search("   ", 5, None);
        assert!(result.is_empty());
        assert_eq!(result.intent, Intent::General);
        assert!(!result.timed_out);
    }

    #[test]
    fn zero_max_results_selects_nothing() {
        let result = engine(sample()).search("deploy container", 0, None);
        assert!(result.is_empty());
        assert!(result.total_candidates > 0);
    }

    #[test]
    fn single_search_uses_only_the_query() {
        let result = engine(sample()).search("deploy container", 5, None);
        assert_eq!(result.variants, vec!["deploy container".to_string()]);
        assert!(!result.is_empty());
    }

    #[test]
    fn filter_restricts_categories() {
        let filter = vec!["docs".to_string()];
        let result = engine(sample()).search("deploy container", 5, Some(&filter));
        assert!(result
            .chunks
            .iter()
            .all(|c| c.source_path == "docs/deploy.md"));
        assert_eq!(result.chunks.len(), 1);
    }

    #[test]
    fn invalid_filter_globs_surface_as_warnings() {
        let filter = vec!["src/[".to_string()];
        let result = engine(sample()).search("deploy container", 5, Some(&filter));
        assert!(result.warnings.iter().any(|w| w.contains("src/[")));
        assert!(!result.is_empty());
    }

    #[test]
    fn cancelled_multi_query_is_flagged() {
        let cancel = Cancellation::new();
        cancel.cancel();
        let result =
            engine(sample()).search_multi_query_cancellable("deploy container", 5, None, &cancel);
        assert!(result.timed_out);
        assert!(result.is_empty());
    }

    #[test]
    fn optimize_context_uses_general_balance() {
        let engine = engine(sample());
        let chunks = engine.search("deploy container", 5, None).chunks;
        let bundle = engine.optimize_context(chunks, 10_000);
        assert!(bundle.total_tokens <= 10_000);
    }
}
