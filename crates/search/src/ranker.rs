use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use context_corpus::{Chunk, ChunkId};
use context_vector_store::CorpusSnapshot;
use rayon::prelude::*;

/// Cooperative cancellation flag shared between a caller and a running search
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Per-chunk best similarity across evaluated query variants
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariantScores {
    /// Indexed like the snapshot's chunks
    pub scores: Vec<f64>,
    pub variants_evaluated: usize,
    pub cancelled: bool,
}

impl VariantScores {
    /// Chunk indices with their score, one entry per distinct [`ChunkId`].
    ///
    /// Duplicate identities keep the highest score; ties keep the lowest index.
    #[must_use]
    pub fn best_per_chunk(&self, chunks: &[Chunk]) -> Vec<(usize, f64)> {
        let mut best: HashMap<ChunkId, (usize, f64)> = HashMap::with_capacity(chunks.len());
        for (idx, (chunk, score)) in chunks.iter().zip(&self.scores).enumerate() {
            best.entry(chunk.id())
                .and_modify(|entry| {
                    if *score > entry.1 {
                        *entry = (idx, *score);
                    }
                })
                .or_insert((idx, *score));
        }
        let mut merged: Vec<(usize, f64)> = best.into_values().collect();
        merged.sort_unstable_by_key(|(idx, _)| *idx);
        merged
    }
}

/// Element-wise max of two score vectors; the shorter side is padded with zeros
#[must_use]
pub fn merge_max(mut left: Vec<f64>, right: Vec<f64>) -> Vec<f64> {
    if left.len() < right.len() {
        left.resize(right.len(), 0.0);
    }
    for (slot, score) in left.iter_mut().zip(right) {
        if score > *slot {
            *slot = score;
        }
    }
    left
}

pub struct SimilarityRanker;

impl SimilarityRanker {
    /// Score every chunk against one query text
    #[must_use]
    pub fn rank(snapshot: &CorpusSnapshot, query: &str) -> Vec<f64> {
        snapshot.similarities(query)
    }

    /// Score every chunk against each variant in parallel and keep the per-chunk max.
    ///
    /// The merge is order-independent. Variants not yet started when `cancel`
    /// fires are skipped and the result is flagged as cancelled.
    #[must_use]
    pub fn rank_variants(
        snapshot: &CorpusSnapshot,
        variants: &[String],
        cancel: &Cancellation,
    ) -> VariantScores {
        let n = snapshot.len();
        let (scores, evaluated) = variants
            .par_iter()
            .filter_map(|variant| {
                if cancel.is_cancelled() {
                    return None;
                }
                Some((snapshot.similarities(variant), 1usize))
            })
            .reduce(
                || (vec![0.0; n], 0),
                |(left, a), (right, b)| (merge_max(left, right), a + b),
            );

        let cancelled = cancel.is_cancelled() && evaluated < variants.len();
        if cancelled {
            log::debug!(
                "Variant ranking cancelled after {evaluated}/{} variants",
                variants.len()
            );
        }

        VariantScores {
            scores,
            variants_evaluated: evaluated,
            cancelled,
        }
    }
}
