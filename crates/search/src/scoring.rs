use std::cmp::Ordering;
use std::path::Path;

use chrono::{DateTime, Utc};
use context_corpus::{Chunk, ChunkType};
use context_vector_store::is_stop_word;
use serde::Serialize;

use crate::config::ScoringConfig;
use crate::filter::FileTypeFilter;
use crate::query_classifier::{query_terms, Intent};

const PLATFORM_KEYWORDS: &[&str] = &[
    "windows", "linux", "macos", "mac", "darwin", "unix", "ubuntu", "debian",
];

const SETUP_KEYWORDS: &[&str] = &[
    "setup", "install", "installation", "installer", "bootstrap", "configure", "init",
    "initialize", "quickstart",
];

/// Words a file extension implies about its content
fn extension_context(ext: &str) -> &'static [&'static str] {
    match ext {
        "bat" | "cmd" | "ps1" => &["script", "batch", "windows", "install", "powershell"],
        "sh" | "bash" | "zsh" => &["script", "shell", "linux", "install", "bash"],
        "py" => &["python", "script"],
        "md" | "mdx" | "rst" => &["docs", "documentation", "readme", "guide"],
        "toml" | "yaml" | "yml" | "json" | "ini" | "cfg" => {
            &["config", "configuration", "settings"]
        }
        "js" | "ts" | "jsx" | "tsx" => &["javascript", "typescript", "web"],
        "rs" => &["rust"],
        _ => &[],
    }
}

/// Per-query inputs shared by every candidate
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub intent: Intent,
    /// Distinct lowercase terms with stop words removed
    pub terms: Vec<String>,
    /// Wall-clock reference for freshness, fixed for the whole query
    pub now: DateTime<Utc>,
}

impl QueryContext {
    #[must_use]
    pub fn new(query: &str, intent: Intent, now: DateTime<Utc>) -> Self {
        let terms = query_terms(query)
            .into_iter()
            .filter(|t| !is_stop_word(t))
            .collect();
        Self { intent, terms, now }
    }

    fn has_term(&self, term: &str) -> bool {
        self.terms.iter().any(|t| t == term)
    }

    fn is_setup_query(&self) -> bool {
        SETUP_KEYWORDS.iter().any(|k| self.has_term(k))
    }
}

/// Every factor that went into a chunk's final score
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub base: f64,
    pub file_type: f64,
    pub chunk_type: f64,
    pub confidence: f64,
    pub freshness: f64,
    pub length: f64,
    pub exact_match: f64,
    pub score: f64,
}

impl ScoreBreakdown {
    /// Whether the chunk has any signal at all for this query
    #[must_use]
    pub fn has_signal(&self) -> bool {
        self.base > 0.0 || self.exact_match > 0.0
    }
}

/// Turns raw similarities into boosted relevance scores in [0, 1]
#[derive(Debug, Clone, Default)]
pub struct RelevanceScorer {
    config: ScoringConfig,
}

impl RelevanceScorer {
    #[must_use]
    pub const fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn score(&self, chunk: &Chunk, base: f64, ctx: &QueryContext) -> f64 {
        self.breakdown(chunk, base, ctx).score
    }

    #[must_use]
    pub fn breakdown(&self, chunk: &Chunk, base: f64, ctx: &QueryContext) -> ScoreBreakdown {
        let base = if base.is_finite() { base.clamp(0.0, 1.0) } else { 0.0 };
        let file_type = self
            .config
            .file_type_boosts
            .get(ctx.intent)
            .get(chunk.file_type_category);
        let chunk_type = self.chunk_type_boost(chunk.chunk_type, ctx.intent);
        let confidence = chunk.confidence;
        let freshness = self.freshness_boost(chunk, ctx.now);
        let length = self.length_boost(chunk.char_len());
        let exact_match = self.exact_match_boost(chunk, ctx);

        let raw = base * file_type * chunk_type * confidence * freshness * length + exact_match;
        let score = if raw.is_finite() { raw.clamp(0.0, 1.0) } else { 0.0 };

        ScoreBreakdown {
            base,
            file_type,
            chunk_type,
            confidence,
            freshness,
            length,
            exact_match,
            score,
        }
    }

    fn chunk_type_boost(&self, chunk_type: ChunkType, intent: Intent) -> f64 {
        let favored = self.config.chunk_type_favored;
        let disfavored = self.config.chunk_type_disfavored;
        match intent {
            Intent::Technical if chunk_type.is_definition() => favored,
            Intent::Technical if chunk_type.is_documentation() => disfavored,
            Intent::Documentation | Intent::TaskManagement if chunk_type.is_documentation() => {
                favored
            }
            Intent::Mixed if chunk_type.is_definition() || chunk_type.is_documentation() => {
                favored
            }
            _ => 1.0,
        }
    }

    fn freshness_boost(&self, chunk: &Chunk, now: DateTime<Utc>) -> f64 {
        let Some(modified) = chunk.last_modified else {
            return 1.0;
        };
        let rules = &self.config.freshness;
        let days = (now - modified).num_days();
        if days <= rules.recent_days {
            rules.recent
        } else if days <= rules.month_days {
            rules.month
        } else {
            1.0
        }
    }

    fn length_boost(&self, chars: usize) -> f64 {
        let rules = &self.config.length;
        if chars < rules.short_below {
            rules.short
        } else if (rules.ideal_min..=rules.ideal_max).contains(&chars) {
            rules.ideal
        } else if chars > rules.long_above {
            rules.long
        } else {
            1.0
        }
    }

    /// Additive bonus for query terms that appear in the file name or match
    /// what the file's extension and location imply
    #[must_use]
    pub fn exact_match_boost(&self, chunk: &Chunk, ctx: &QueryContext) -> f64 {
        if ctx.terms.is_empty() {
            return 0.0;
        }
        let weights = &self.config.exact_match;
        let file_name = chunk.file_name.to_lowercase();
        let stem = Path::new(&file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name.as_str())
            .to_string();
        let components: Vec<&str> = stem
            .split(['_', '-', '.', ' '])
            .filter(|c| !c.is_empty())
            .collect();

        let mut boost = 0.0;
        for term in &ctx.terms {
            if components.contains(&term.as_str()) {
                boost += weights.component;
            } else if term.chars().count() >= 3 && stem.contains(term.as_str()) {
                boost += weights.substring;
            }
        }

        if PLATFORM_KEYWORDS
            .iter()
            .any(|platform| ctx.has_term(platform) && file_name.contains(platform))
        {
            boost += weights.platform;
        }

        if let Some(ext) = chunk.extension() {
            if extension_context(&ext).iter().any(|word| ctx.has_term(word)) {
                boost += weights.extension_context;
            }
        }

        if ctx.is_setup_query() && chunk.is_root_level() {
            boost += weights.root_setup;
        }

        boost
    }

    /// Score every chunk with signal, apply the filter and relevance floor,
    /// and return the survivors in relevance order with scores attached.
    #[must_use]
    pub fn rank_candidates(
        &self,
        chunks: &[Chunk],
        similarities: &[(usize, f64)],
        ctx: &QueryContext,
        filter: &FileTypeFilter,
        min_relevance: f64,
    ) -> Vec<Chunk> {
        let mut candidates: Vec<Chunk> = similarities
            .iter()
            .filter_map(|(idx, base)| chunks.get(*idx).map(|chunk| (chunk, *base)))
            .filter(|(chunk, _)| filter.matches(chunk))
            .filter_map(|(chunk, base)| {
                let breakdown = self.breakdown(chunk, base, ctx);
                if !breakdown.has_signal() || breakdown.score < min_relevance {
                    return None;
                }
                let mut scored = chunk.clone();
                scored.relevance_score = breakdown.score;
                Some(scored)
            })
            .collect();
        sort_by_relevance(&mut candidates);
        candidates
    }
}

/// Relevance descending, then source path and start line ascending
pub fn compare_relevance(a: &Chunk, b: &Chunk) -> Ordering {
    b.relevance_score
        .total_cmp(&a.relevance_score)
        .then_with(|| a.source_path.cmp(&b.source_path))
        .then_with(|| a.start_line.cmp(&b.start_line))
}

pub fn sort_by_relevance(chunks: &mut [Chunk]) {
    chunks.sort_by(compare_relevance);
}
