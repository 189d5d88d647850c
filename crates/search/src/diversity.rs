use std::collections::HashMap;

use context_corpus::{Chunk, FileTypeCategory};

use crate::config::{CategoryWeights, DiversityConfig, IntentTable};
use crate::query_classifier::Intent;
use crate::scoring::sort_by_relevance;

/// Caps how much of a result set any one file category may take
#[derive(Debug, Clone)]
pub struct DiversitySelector {
    ratios: IntentTable<CategoryWeights>,
}

impl Default for DiversitySelector {
    fn default() -> Self {
        Self::new(&DiversityConfig::default())
    }
}

impl DiversitySelector {
    #[must_use]
    pub fn new(config: &DiversityConfig) -> Self {
        Self {
            ratios: config.ratios.clone(),
        }
    }

    /// Per-category slot targets, `floor(ratio * n)`
    #[must_use]
    pub fn targets(&self, n: usize, intent: Intent) -> HashMap<FileTypeCategory, usize> {
        let ratios = self.ratios.get(intent);
        FileTypeCategory::ALL
            .iter()
            .map(|category| {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let target = (ratios.get(*category) * n as f64).floor() as usize;
                (*category, target)
            })
            .collect()
    }

    /// Pick at most `n` chunks honoring the intent's category targets.
    ///
    /// Categories fill up to their target in relevance order; leftover slots go
    /// to the best remaining chunks regardless of category. The output is in
    /// relevance order. Inputs of `n` or fewer come back unchanged.
    #[must_use]
    pub fn select(&self, mut ranked: Vec<Chunk>, n: usize, intent: Intent) -> Vec<Chunk> {
        if ranked.len() <= n {
            return ranked;
        }
        if n == 0 {
            return Vec::new();
        }
        sort_by_relevance(&mut ranked);

        let mut remaining = self.targets(n, intent);
        let mut selected = Vec::with_capacity(n);
        let mut leftovers = Vec::new();
        for chunk in ranked {
            let slot = remaining.entry(chunk.file_type_category).or_default();
            if *slot > 0 && selected.len() < n {
                *slot -= 1;
                selected.push(chunk);
            } else {
                leftovers.push(chunk);
            }
        }

        let open = n.saturating_sub(selected.len());
        selected.extend(leftovers.into_iter().take(open));
        sort_by_relevance(&mut selected);

        log::debug!(
            "Diversity selection kept {} of {n} slots for {intent} intent",
            selected.len()
        );
        selected
    }
}
