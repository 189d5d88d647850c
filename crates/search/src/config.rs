use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use context_corpus::{FileTypeCategory, JsonRecordSource, MIN_CHUNK_TEXT_LEN};
use context_vector_store::{CorpusOptions, VectorizerConfig};
use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::query_classifier::Intent;

/// One value per file-type category
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeights {
    pub code: f64,
    pub config_script: f64,
    pub documentation: f64,
    pub task: f64,
    pub other: f64,
}

impl CategoryWeights {
    #[must_use]
    pub const fn new(code: f64, config_script: f64, documentation: f64, task: f64, other: f64) -> Self {
        Self {
            code,
            config_script,
            documentation,
            task,
            other,
        }
    }

    #[must_use]
    pub const fn uniform(value: f64) -> Self {
        Self::new(value, value, value, value, value)
    }

    #[must_use]
    pub const fn get(&self, category: FileTypeCategory) -> f64 {
        match category {
            FileTypeCategory::Code => self.code,
            FileTypeCategory::ConfigScript => self.config_script,
            FileTypeCategory::Documentation => self.documentation,
            FileTypeCategory::Task => self.task,
            FileTypeCategory::Other => self.other,
        }
    }

    #[must_use]
    pub fn sum(&self) -> f64 {
        FileTypeCategory::ALL.iter().map(|c| self.get(*c)).sum()
    }

    fn all_finite_non_negative(&self) -> bool {
        FileTypeCategory::ALL
            .iter()
            .map(|c| self.get(*c))
            .all(|v| v.is_finite() && v >= 0.0)
    }
}

/// One value per intent. Lookups are total over [`Intent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentTable<T> {
    pub technical: T,
    pub documentation: T,
    pub task_management: T,
    pub mixed: T,
    pub general: T,
}

impl<T> IntentTable<T> {
    #[must_use]
    pub const fn get(&self, intent: Intent) -> &T {
        match intent {
            Intent::Technical => &self.technical,
            Intent::Documentation => &self.documentation,
            Intent::TaskManagement => &self.task_management,
            Intent::Mixed => &self.mixed,
            Intent::General => &self.general,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Intent, &T)> {
        Intent::ALL.into_iter().map(move |intent| (intent, self.get(intent)))
    }
}

fn default_file_type_boosts() -> IntentTable<CategoryWeights> {
    IntentTable {
        technical: CategoryWeights::new(1.4, 1.3, 1.1, 0.9, 1.0),
        documentation: CategoryWeights::new(0.9, 1.0, 1.4, 1.1, 1.0),
        task_management: CategoryWeights::new(0.9, 0.9, 1.2, 1.5, 1.0),
        mixed: CategoryWeights::new(1.2, 1.15, 1.2, 1.0, 1.0),
        general: CategoryWeights::uniform(1.0),
    }
}

fn default_diversity_ratios() -> IntentTable<CategoryWeights> {
    IntentTable {
        technical: CategoryWeights::new(0.6, 0.2, 0.2, 0.0, 0.0),
        documentation: CategoryWeights::new(0.3, 0.2, 0.5, 0.0, 0.0),
        task_management: CategoryWeights::new(0.3, 0.15, 0.25, 0.3, 0.0),
        mixed: CategoryWeights::new(0.25, 0.2, 0.25, 0.15, 0.15),
        general: CategoryWeights::uniform(0.2),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Snapshot lifetime before a rebuild is triggered
    pub ttl_secs: u64,
    /// Chunks with this many trimmed characters or fewer are not indexed
    pub min_text_len: usize,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            min_text_len: MIN_CHUNK_TEXT_LEN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Candidates scoring below this after boosting are dropped
    pub min_relevance: f64,
    pub max_variants: usize,
    pub max_synonyms_per_term: usize,
    pub max_key_terms: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_relevance: 0.05,
            max_variants: 5,
            max_synonyms_per_term: 3,
            max_key_terms: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreshnessBoost {
    pub recent_days: i64,
    pub recent: f64,
    pub month_days: i64,
    pub month: f64,
}

impl Default for FreshnessBoost {
    fn default() -> Self {
        Self {
            recent_days: 7,
            recent: 1.1,
            month_days: 30,
            month: 1.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LengthBoost {
    pub short_below: usize,
    pub short: f64,
    pub ideal_min: usize,
    pub ideal_max: usize,
    pub ideal: f64,
    pub long_above: usize,
    pub long: f64,
}

impl Default for LengthBoost {
    fn default() -> Self {
        Self {
            short_below: 50,
            short: 0.8,
            ideal_min: 100,
            ideal_max: 1000,
            ideal: 1.1,
            long_above: 2000,
            long: 0.95,
        }
    }
}

/// Additive bonuses for filename and path matches
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExactMatchWeights {
    pub component: f64,
    pub substring: f64,
    pub platform: f64,
    pub extension_context: f64,
    pub root_setup: f64,
}

impl Default for ExactMatchWeights {
    fn default() -> Self {
        Self {
            component: 0.8,
            substring: 0.6,
            platform: 0.7,
            extension_context: 0.5,
            root_setup: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    #[serde(default = "default_file_type_boosts")]
    pub file_type_boosts: IntentTable<CategoryWeights>,
    pub chunk_type_favored: f64,
    pub chunk_type_disfavored: f64,
    pub freshness: FreshnessBoost,
    pub length: LengthBoost,
    pub exact_match: ExactMatchWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            file_type_boosts: default_file_type_boosts(),
            chunk_type_favored: 1.2,
            chunk_type_disfavored: 0.9,
            freshness: FreshnessBoost::default(),
            length: LengthBoost::default(),
            exact_match: ExactMatchWeights::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiversityConfig {
    #[serde(default = "default_diversity_ratios")]
    pub ratios: IntentTable<CategoryWeights>,
}

impl Default for DiversityConfig {
    fn default() -> Self {
        Self {
            ratios: default_diversity_ratios(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub chars_per_token: usize,
    /// Remaining budget needed before a truncated tail chunk is added
    pub min_truncation_tokens: usize,
    /// Jaccard similarity above which the lower-scored chunk is dropped
    pub duplicate_threshold: f64,
    pub min_quality: f64,
    pub max_chunks: usize,
    pub length_weight: f64,
    pub relevance_weight: f64,
    /// Character count at which the length component saturates
    pub length_saturation_chars: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            chars_per_token: 4,
            min_truncation_tokens: 100,
            duplicate_threshold: 0.8,
            min_quality: 0.5,
            max_chunks: 20,
            length_weight: 0.4,
            relevance_weight: 0.6,
            length_saturation_chars: 1000,
        }
    }
}

/// Full retrieval configuration, loadable from TOML.
///
/// Every section is optional; omitted fields keep their defaults. Intent
/// tables (`scoring.file_type_boosts`, `diversity.ratios`) are replaced as a
/// whole when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub corpus: CorpusConfig,
    pub vectorizer: VectorizerConfig,
    pub search: SearchConfig,
    pub scoring: ScoringConfig,
    pub diversity: DiversityConfig,
    pub optimizer: OptimizerConfig,
}

impl RetrievalConfig {
    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).context("Failed to parse retrieval config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read retrieval config {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Invalid retrieval config {}", path.display()))
    }

    #[must_use]
    pub fn corpus_options(&self) -> CorpusOptions {
        CorpusOptions {
            ttl: Duration::from_secs(self.corpus.ttl_secs),
            min_text_len: self.corpus.min_text_len,
            vectorizer: self.vectorizer.clone(),
        }
    }

    /// Record directory source using the configured minimum text length
    #[must_use]
    pub fn record_source(&self, root: impl AsRef<Path>) -> JsonRecordSource {
        JsonRecordSource::new(root).with_min_text_len(self.corpus.min_text_len)
    }

    pub fn validate(&self) -> crate::Result<()> {
        self.vectorizer.validate()?;

        let search = &self.search;
        if !(0.0..=1.0).contains(&search.min_relevance) {
            return Err(invalid("search.min_relevance must be within [0, 1]"));
        }
        if search.max_variants == 0 {
            return Err(invalid("search.max_variants must be at least 1"));
        }
        if search.max_key_terms == 0 {
            return Err(invalid("search.max_key_terms must be at least 1"));
        }

        for (intent, weights) in self.scoring.file_type_boosts.iter() {
            if !weights.all_finite_non_negative() {
                return Err(invalid(format!(
                    "scoring.file_type_boosts.{intent} must be finite and non-negative"
                )));
            }
        }
        for (intent, ratios) in self.diversity.ratios.iter() {
            if !ratios.all_finite_non_negative() || ratios.sum() > 1.0 + 1e-9 {
                return Err(invalid(format!(
                    "diversity.ratios.{intent} must be non-negative and sum to at most 1"
                )));
            }
        }

        let optimizer = &self.optimizer;
        if optimizer.chars_per_token == 0 {
            return Err(invalid("optimizer.chars_per_token must be at least 1"));
        }
        if !(0.0..=1.0).contains(&optimizer.duplicate_threshold) {
            return Err(invalid("optimizer.duplicate_threshold must be within [0, 1]"));
        }
        if optimizer.length_saturation_chars == 0 {
            return Err(invalid("optimizer.length_saturation_chars must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> SearchError {
    SearchError::InvalidConfig(message.into())
}
