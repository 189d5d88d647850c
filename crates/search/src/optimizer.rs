use std::collections::HashSet;

use context_corpus::Chunk;
use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::{DiversityConfig, OptimizerConfig};
use crate::diversity::DiversitySelector;
use crate::query_classifier::Intent;
use crate::scoring::sort_by_relevance;

const ELLIPSIS: &str = "...";

const CODE_CONSTRUCTS: &[&str] = &[
    "fn ", "def ", "class ", "function ", "function(", "return ", "import ", "#include",
    "=>", "->", "struct ", "impl ", "const ", "let ", "var ", "public ", "private ",
    "@echo", "export ", "if [", "};",
];

/// One chunk as it lands in the final context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextEntry {
    pub chunk: Chunk,
    /// Text actually included; shorter than `chunk.text` when truncated
    pub text: String,
    pub estimated_tokens: usize,
    pub truncated: bool,
}

/// How many chunks each optimization stage removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OptimizationStats {
    pub input: usize,
    pub below_threshold: usize,
    pub low_quality: usize,
    pub duplicates: usize,
    pub rebalanced: usize,
    pub over_budget: usize,
}

/// Token-budgeted, deduplicated context ready for prompt assembly
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContextBundle {
    pub entries: Vec<ContextEntry>,
    pub quality_score: f64,
    pub total_tokens: usize,
    /// Relevance threshold computed for this input
    pub threshold: f64,
    pub stats: OptimizationStats,
}

impl ContextBundle {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entry texts joined with blank lines
    #[must_use]
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| e.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Relevance forced into [0, 1]; NaN and infinities count as no relevance
#[must_use]
pub fn unit_relevance(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Relevance cutoff adapted to how strong the best candidates are
#[must_use]
pub fn dynamic_threshold(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let max = scores.iter().copied().fold(f64::MIN, f64::max);
    #[allow(clippy::cast_precision_loss)]
    let avg = scores.iter().sum::<f64>() / scores.len() as f64;
    if max > 0.8 {
        (0.8 * avg).max(0.7)
    } else if max > 0.6 {
        (0.7 * avg).max(0.6)
    } else {
        (0.6 * avg).max(0.5)
    }
}

/// Heuristic content quality in [0, 1]
#[must_use]
pub fn chunk_quality(text: &str) -> f64 {
    let trimmed = text.trim();
    let len = trimmed.chars().count();
    let mut quality: f64 = 0.5;
    if len > 200 {
        quality += 0.2;
    } else if len < 50 {
        quality -= 0.2;
    }
    if CODE_CONSTRUCTS.iter().any(|c| trimmed.contains(c)) {
        quality += 0.1;
    }
    if trimmed.chars().filter(|c| c.is_alphanumeric()).count() < 10 {
        quality -= 0.3;
    }
    quality.clamp(0.0, 1.0)
}

fn token_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Jaccard similarity of lowercase alphanumeric token sets
#[must_use]
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    jaccard(&token_set(a), &token_set(b))
}

#[must_use]
pub fn estimate_tokens(text: &str, chars_per_token: usize) -> usize {
    text.chars().count().div_ceil(chars_per_token.max(1))
}

/// Cut `text` to at most `max_chars` characters.
///
/// Prefers ending on a sentence boundary when that keeps at least half the
/// allowance; otherwise hard-cuts and appends `...`.
#[must_use]
pub fn smart_truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let mut kept = 0usize;
    let mut end = 0usize;
    let mut offset = 0usize;
    for sentence in text.split_sentence_bounds() {
        let len = sentence.chars().count();
        if kept + len > max_chars {
            break;
        }
        kept += len;
        offset += sentence.len();
        end = offset;
    }
    if end > 0 && kept * 2 >= max_chars {
        return text[..end].trim_end().to_string();
    }

    let budget = max_chars.saturating_sub(ELLIPSIS.len());
    let mut cut: String = text.chars().take(budget).collect();
    if max_chars >= ELLIPSIS.len() {
        cut.push_str(ELLIPSIS);
    }
    cut
}

/// Final-stage filter, dedup, rebalance and token budgeting
#[derive(Debug, Clone)]
pub struct ContextOptimizer {
    config: OptimizerConfig,
    selector: DiversitySelector,
}

impl Default for ContextOptimizer {
    fn default() -> Self {
        Self::new(OptimizerConfig::default(), &DiversityConfig::default())
    }
}

impl ContextOptimizer {
    #[must_use]
    pub fn new(config: OptimizerConfig, diversity: &DiversityConfig) -> Self {
        Self {
            config,
            selector: DiversitySelector::new(diversity),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    #[must_use]
    pub fn optimize(
        &self,
        mut chunks: Vec<Chunk>,
        max_tokens: usize,
        intent: Intent,
    ) -> ContextBundle {
        for chunk in &mut chunks {
            chunk.relevance_score = unit_relevance(chunk.relevance_score);
        }
        let mut stats = OptimizationStats {
            input: chunks.len(),
            ..OptimizationStats::default()
        };
        if chunks.is_empty() {
            return ContextBundle {
                stats,
                ..ContextBundle::default()
            };
        }

        let scores: Vec<f64> = chunks.iter().map(|c| c.relevance_score).collect();
        let threshold = dynamic_threshold(&scores);

        let filtered = self.filter(chunks, threshold, &mut stats);
        let unique = self.deduplicate(filtered, &mut stats);
        let balanced = self.balance(unique, intent, &mut stats);
        let entries = if max_tokens == 0 {
            stats.over_budget = balanced.len();
            Vec::new()
        } else {
            self.apply_token_budget(balanced, max_tokens, &mut stats)
        };

        let total_tokens = entries.iter().map(|e| e.estimated_tokens).sum();
        let quality_score = self.quality_score(&entries);
        log::debug!(
            "Context optimized: {} -> {} entries, {total_tokens} tokens, threshold {threshold:.3}",
            stats.input,
            entries.len()
        );

        ContextBundle {
            entries,
            quality_score,
            total_tokens,
            threshold,
            stats,
        }
    }

    /// Drop chunks below the relevance threshold or the quality floor.
    /// Survivors carry their quality score.
    pub fn filter(
        &self,
        chunks: Vec<Chunk>,
        threshold: f64,
        stats: &mut OptimizationStats,
    ) -> Vec<Chunk> {
        chunks
            .into_iter()
            .filter_map(|mut chunk| {
                if !chunk.relevance_score.is_finite() || chunk.relevance_score < threshold {
                    stats.below_threshold += 1;
                    return None;
                }
                let quality = chunk_quality(&chunk.text);
                if quality < self.config.min_quality {
                    stats.low_quality += 1;
                    return None;
                }
                chunk.quality_score = Some(quality);
                Some(chunk)
            })
            .collect()
    }

    /// Keep the higher-scored chunk of every near-duplicate pair
    pub fn deduplicate(&self, mut chunks: Vec<Chunk>, stats: &mut OptimizationStats) -> Vec<Chunk> {
        sort_by_relevance(&mut chunks);
        let mut accepted: Vec<(Chunk, HashSet<String>)> = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let tokens = token_set(&chunk.text);
            if self.is_duplicate(&tokens, accepted.iter().map(|(_, t)| t)) {
                stats.duplicates += 1;
                continue;
            }
            accepted.push((chunk, tokens));
        }
        accepted.into_iter().map(|(chunk, _)| chunk).collect()
    }

    fn is_duplicate<'a>(
        &self,
        tokens: &HashSet<String>,
        mut accepted: impl Iterator<Item = &'a HashSet<String>>,
    ) -> bool {
        accepted.any(|other| jaccard(tokens, other) > self.config.duplicate_threshold)
    }

    /// Diversity re-selection capped at `max_chunks`
    pub fn balance(
        &self,
        chunks: Vec<Chunk>,
        intent: Intent,
        stats: &mut OptimizationStats,
    ) -> Vec<Chunk> {
        let before = chunks.len();
        let n = before.min(self.config.max_chunks);
        let balanced = self.selector.select(chunks, n, intent);
        stats.rebalanced += before - balanced.len();
        balanced
    }

    /// Accumulate chunks in relevance order until the budget runs out.
    ///
    /// When the first chunk that does not fit leaves at least
    /// `min_truncation_tokens` of budget, a truncated copy of it is appended
    /// unless it duplicates an accepted entry.
    pub fn apply_token_budget(
        &self,
        mut chunks: Vec<Chunk>,
        max_tokens: usize,
        stats: &mut OptimizationStats,
    ) -> Vec<ContextEntry> {
        sort_by_relevance(&mut chunks);
        let cpt = self.config.chars_per_token.max(1);
        let mut entries: Vec<ContextEntry> = Vec::new();
        let mut used = 0usize;

        let mut iter = chunks.into_iter();
        while let Some(chunk) = iter.next() {
            let tokens = estimate_tokens(&chunk.text, cpt);
            if used + tokens <= max_tokens {
                used += tokens;
                entries.push(ContextEntry {
                    text: chunk.text.clone(),
                    chunk,
                    estimated_tokens: tokens,
                    truncated: false,
                });
                continue;
            }

            let remaining = max_tokens - used;
            let mut skipped = 1 + iter.len();
            if remaining >= self.config.min_truncation_tokens {
                if let Some(entry) = self.truncated_entry(chunk, remaining, &entries) {
                    entries.push(entry);
                    skipped -= 1;
                }
            }
            stats.over_budget += skipped;
            break;
        }
        entries
    }

    fn truncated_entry(
        &self,
        chunk: Chunk,
        remaining_tokens: usize,
        accepted: &[ContextEntry],
    ) -> Option<ContextEntry> {
        let cpt = self.config.chars_per_token.max(1);
        let text = smart_truncate(&chunk.text, remaining_tokens * cpt);
        let tokens = estimate_tokens(&text, cpt);
        if text.trim().is_empty() || tokens > remaining_tokens {
            return None;
        }
        let tail_tokens = token_set(&text);
        let accepted_sets: Vec<HashSet<String>> =
            accepted.iter().map(|e| token_set(&e.text)).collect();
        if self.is_duplicate(&tail_tokens, accepted_sets.iter()) {
            log::debug!("Truncated tail of {} duplicates an accepted entry", chunk.id());
            return None;
        }
        Some(ContextEntry {
            chunk,
            text,
            estimated_tokens: tokens,
            truncated: true,
        })
    }

    /// Mean of `length_weight * normalized_length + relevance_weight * relevance`
    #[must_use]
    pub fn quality_score(&self, entries: &[ContextEntry]) -> f64 {
        if entries.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let saturation = self.config.length_saturation_chars.max(1) as f64;
        let total: f64 = entries
            .iter()
            .map(|entry| {
                #[allow(clippy::cast_precision_loss)]
                let length = (entry.text.chars().count() as f64 / saturation).min(1.0);
                self.config.length_weight * length
                    + self.config.relevance_weight * unit_relevance(entry.chunk.relevance_score)
            })
            .sum();
        #[allow(clippy::cast_precision_loss)]
        let mean = total / entries.len() as f64;
        mean.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use context_corpus::ChunkType;
    use pretty_assertions::assert_eq;

    fn scored(path: &str, text: &str, score: f64) -> Chunk {
        let mut chunk = Chunk::new(path, 1, 10, text, ChunkType::Text);
        chunk.relevance_score = score;
        chunk
    }

    fn prose(words: usize, seed: &str) -> String {
        (0..words)
            .map(|i| format!("{seed}{i}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn threshold_tiers() {
        assert_close(dynamic_threshold(&[0.9, 0.9]), 0.72);
        assert_eq!(dynamic_threshold(&[0.9, 0.1]), 0.7);
        assert_eq!(dynamic_threshold(&[0.7, 0.7]), 0.6);
        assert_eq!(dynamic_threshold(&[0.3]), 0.5);
        assert_eq!(dynamic_threshold(&[]), 0.0);
    }

    #[test]
    fn quality_heuristic() {
        assert_close(chunk_quality(&"word ".repeat(60)), 0.7);
        assert_close(
            chunk_quality("fn main() { return; } with a few more words to pad this out"),
            0.6,
        );
        assert_close(chunk_quality("short text here"), 0.3);
        assert_close(chunk_quality("   ...   "), 0.0);
    }

    #[test]
    fn jaccard_basics() {
        assert_eq!(jaccard_similarity("", ""), 1.0);
        assert_eq!(jaccard_similarity("a b", "c d"), 0.0);
        assert_eq!(jaccard_similarity("Install Script", "install, script!"), 1.0);
        assert_eq!(jaccard_similarity("a b c d", "a b"), 0.5);
    }

    #[test]
    fn truncation_prefers_sentence_boundaries() {
        let text = "First sentence is here. Second sentence follows. Third one is long enough.";
        assert_eq!(
            smart_truncate(text, 50),
            "First sentence is here. Second sentence follows."
        );
    }

    #[test]
    fn truncation_hard_cuts_without_boundary() {
        let text = "a".repeat(40);
        let cut = smart_truncate(&text, 10);
        assert_eq!(cut, "aaaaaaa...");
        assert_eq!(cut.chars().count(), 10);
        assert_eq!(smart_truncate("short", 10), "short");
    }

    #[test]
    fn near_duplicates_keep_higher_score() {
        let optimizer = ContextOptimizer::default();
        let text = prose(60, "alpha");
        let mut stats = OptimizationStats::default();
        let kept = optimizer.deduplicate(
            vec![
                scored("b.md", &text, 0.8),
                scored("a.md", &format!("{text} extra"), 0.9),
                scored("c.md", &prose(60, "beta"), 0.7),
            ],
            &mut stats,
        );
        let paths: Vec<&str> = kept.iter().map(|c| c.source_path.as_str()).collect();
        assert_eq!(paths, vec!["a.md", "c.md"]);
        assert_eq!(stats.duplicates, 1);
    }

    #[test]
    fn budget_stops_at_first_overflow_and_truncates_tail() {
        let optimizer = ContextOptimizer::default();
        let mut stats = OptimizationStats::default();
        // 400 chars -> 100 tokens each
        let chunks = vec![
            scored("a.md", &"a".repeat(400), 0.9),
            scored("b.md", &prose(200, "tail"), 0.8),
            scored("c.md", &"c".repeat(40), 0.7),
        ];
        let entries = optimizer.apply_token_budget(chunks, 250, &mut stats);
        assert_eq!(entries.len(), 2);
        assert!(!entries[0].truncated);
        assert!(entries[1].truncated);
        let total: usize = entries.iter().map(|e| e.estimated_tokens).sum();
        assert!(total <= 250);
        assert_eq!(stats.over_budget, 1);
    }

    #[test]
    fn small_remaining_budget_skips_truncation() {
        let optimizer = ContextOptimizer::default();
        let mut stats = OptimizationStats::default();
        let chunks = vec![
            scored("a.md", &"a".repeat(400), 0.9),
            scored("b.md", &"b".repeat(800), 0.8),
        ];
        let entries = optimizer.apply_token_budget(chunks, 150, &mut stats);
        assert_eq!(entries.len(), 1);
        assert_eq!(stats.over_budget, 1);
    }

    #[test]
    fn optimize_runs_every_stage() {
        let optimizer = ContextOptimizer::default();
        let body = prose(50, "install");
        let bundle = optimizer.optimize(
            vec![
                scored("setup.sh", &body, 0.95),
                scored("copy.sh", &body, 0.9),
                scored("docs/other.md", &prose(50, "guide"), 0.92),
                scored("weak.md", &prose(50, "weak"), 0.2),
                scored("tiny.md", "tiny", 0.99),
            ],
            10_000,
            Intent::General,
        );
        let paths: Vec<&str> = bundle
            .entries
            .iter()
            .map(|e| e.chunk.source_path.as_str())
            .collect();
        assert_eq!(paths, vec!["setup.sh", "docs/other.md"]);
        assert_eq!(bundle.stats.below_threshold, 1);
        assert_eq!(bundle.stats.low_quality, 1);
        assert_eq!(bundle.stats.duplicates, 1);
        assert!(bundle.quality_score > 0.0 && bundle.quality_score <= 1.0);
        assert_eq!(
            bundle.total_tokens,
            bundle.entries.iter().map(|e| e.estimated_tokens).sum::<usize>()
        );
        assert!(bundle.entries.iter().all(|e| e.chunk.quality_score.is_some()));
    }

    #[test]
    fn nan_relevance_never_reaches_the_bundle() {
        let optimizer = ContextOptimizer::default();
        let bundle = optimizer.optimize(
            vec![scored("notes.md", &prose(80, "w"), f64::NAN)],
            1000,
            Intent::General,
        );
        assert!(bundle.is_empty());
        assert_eq!(bundle.stats.below_threshold, 1);
        assert_eq!(bundle.quality_score, 0.0);
        assert_close(bundle.threshold, 0.5);
    }

    #[test]
    fn out_of_range_relevance_is_clamped() {
        let optimizer = ContextOptimizer::default();
        let bundle = optimizer.optimize(
            vec![
                scored("a.md", &prose(50, "alpha"), 1.7),
                scored("b.md", &prose(50, "gamma"), 0.9),
                scored("c.md", &prose(50, "delta"), f64::INFINITY),
            ],
            10_000,
            Intent::General,
        );
        let scores: Vec<f64> = bundle
            .entries
            .iter()
            .map(|e| e.chunk.relevance_score)
            .collect();
        assert_eq!(scores, vec![1.0, 0.9]);
        assert_eq!(bundle.stats.below_threshold, 1);
        assert_close(bundle.threshold, 0.7);
        assert!((0.0..=1.0).contains(&bundle.quality_score));
    }

    #[test]
    fn filter_rejects_non_finite_scores() {
        let optimizer = ContextOptimizer::default();
        let mut stats = OptimizationStats::default();
        let kept = optimizer.filter(
            vec![scored("n.md", &prose(80, "w"), f64::NAN)],
            0.0,
            &mut stats,
        );
        assert!(kept.is_empty());
        assert_eq!(stats.below_threshold, 1);
        assert_eq!(unit_relevance(-0.4), 0.0);
        assert_eq!(unit_relevance(f64::NEG_INFINITY), 0.0);
    }

    #[test]
    fn empty_input_gives_empty_bundle() {
        let bundle = ContextOptimizer::default().optimize(Vec::new(), 1000, Intent::General);
        assert!(bundle.is_empty());
        assert_eq!(bundle.quality_score, 0.0);
    }

    #[test]
    fn balance_caps_at_max_chunks() {
        let config = OptimizerConfig {
            max_chunks: 3,
            ..OptimizerConfig::default()
        };
        let optimizer = ContextOptimizer::new(config, &DiversityConfig::default());
        let chunks: Vec<Chunk> = (0..6)
            .map(|i| scored(&format!("src/m{i}.rs"), &prose(50, &format!("w{i}x")), 0.9))
            .collect();
        let mut stats = OptimizationStats::default();
        let kept = optimizer.balance(chunks, Intent::Technical, &mut stats);
        assert_eq!(kept.len(), 3);
        assert_eq!(stats.rebalanced, 3);
    }
}
