use crate::analyzer::Analyzer;
use crate::error::{Result, VectorStoreError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Settings for the TF-IDF vector space
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizerConfig {
    /// Vocabulary cap, most frequent terms win
    pub max_features: usize,
    /// Smallest n-gram length
    pub ngram_min: usize,
    /// Largest n-gram length
    pub ngram_max: usize,
    /// Case-fold before tokenizing
    pub lowercase: bool,
    /// Drop English stop words
    pub stop_words: bool,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            max_features: 10_000,
            ngram_min: 1,
            ngram_max: 2,
            lowercase: true,
            stop_words: true,
        }
    }
}

impl VectorizerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_features == 0 {
            return Err(VectorStoreError::InvalidConfig(
                "max_features must be > 0".to_string(),
            ));
        }
        if self.ngram_min == 0 || self.ngram_min > self.ngram_max {
            return Err(VectorStoreError::InvalidConfig(format!(
                "invalid ngram range ({}, {})",
                self.ngram_min, self.ngram_max
            )));
        }
        Ok(())
    }

    #[must_use]
    pub const fn analyzer(&self) -> Analyzer {
        Analyzer {
            ngram_min: self.ngram_min,
            ngram_max: self.ngram_max,
            lowercase: self.lowercase,
            remove_stop_words: self.stop_words,
        }
    }
}

/// Sparse vector with strictly increasing indices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    indices: Vec<u32>,
    values: Vec<f64>,
}

impl SparseVector {
    fn from_sorted(entries: BTreeMap<u32, f64>) -> Self {
        let (indices, values) = entries.into_iter().unzip();
        Self { indices, values }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Number of stored (non-zero) entries
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    #[must_use]
    pub fn norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    fn normalize(&mut self) {
        let norm = self.norm();
        if norm > 0.0 {
            for value in &mut self.values {
                *value /= norm;
            }
        }
    }

    /// Dot product via a merge over both index lists
    #[must_use]
    pub fn dot(&self, other: &Self) -> f64 {
        let (mut i, mut j) = (0usize, 0usize);
        let mut sum = 0.0;
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    /// Cosine similarity clipped to [0, 1]; zero vectors score 0
    #[must_use]
    pub fn cosine(&self, other: &Self) -> f64 {
        let denom = self.norm() * other.norm();
        if denom <= f64::EPSILON {
            return 0.0;
        }
        (self.dot(other) / denom).clamp(0.0, 1.0)
    }
}

/// Document-term matrix, one L2-normalized row per document
#[derive(Debug, Clone, Default)]
pub struct TfIdfMatrix {
    rows: Vec<SparseVector>,
    n_features: usize,
}

impl TfIdfMatrix {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub const fn n_features(&self) -> usize {
        self.n_features
    }

    #[must_use]
    pub fn row(&self, idx: usize) -> Option<&SparseVector> {
        self.rows.get(idx)
    }

    /// Cosine similarity of `query` against every row, in row order
    #[must_use]
    pub fn cosine_similarities(&self, query: &SparseVector) -> Vec<f64> {
        if query.is_empty() {
            return vec![0.0; self.rows.len()];
        }
        self.rows.iter().map(|row| row.cosine(query)).collect()
    }
}

/// Fitted TF-IDF model: vocabulary plus smoothed idf weights
#[derive(Debug, Clone, Default)]
pub struct TfIdfVectorizer {
    config: VectorizerConfig,
    vocabulary: HashMap<String, u32>,
    idf: Vec<f64>,
}

impl TfIdfVectorizer {
    /// Fit a vector space over `documents` and return it with the document matrix.
    ///
    /// An empty document list yields an empty (valid) space. A non-empty list whose analyzer
    /// output is empty (all stop words, no word characters) is a `VectorizationFailure`.
    pub fn fit<S: AsRef<str> + Sync>(
        config: VectorizerConfig,
        documents: &[S],
    ) -> Result<(Self, TfIdfMatrix)> {
        config.validate()?;
        if documents.is_empty() {
            return Ok((
                Self {
                    config,
                    ..Self::default()
                },
                TfIdfMatrix::default(),
            ));
        }

        let analyzer = config.analyzer();
        let analyzed: Vec<Vec<String>> = documents
            .par_iter()
            .map(|doc| analyzer.analyze(doc.as_ref()))
            .collect();

        let mut term_freq: HashMap<&str, usize> = HashMap::new();
        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for terms in &analyzed {
            let mut seen = HashSet::new();
            for term in terms {
                *term_freq.entry(term.as_str()).or_insert(0) += 1;
                if seen.insert(term.as_str()) {
                    *doc_freq.entry(term.as_str()).or_insert(0) += 1;
                }
            }
        }

        if term_freq.is_empty() {
            return Err(VectorStoreError::VectorizationFailure(format!(
                "{} documents produced an empty vocabulary",
                documents.len()
            )));
        }

        let mut ranked: Vec<(&str, usize)> = term_freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(config.max_features);
        let mut selected: Vec<&str> = ranked.into_iter().map(|(term, _)| term).collect();
        selected.sort_unstable();

        let n_docs = documents.len() as f64;
        let mut vocabulary = HashMap::with_capacity(selected.len());
        let mut idf = Vec::with_capacity(selected.len());
        for (idx, term) in selected.iter().enumerate() {
            let df = doc_freq.get(term).copied().unwrap_or(0) as f64;
            idf.push(((1.0 + n_docs) / (1.0 + df)).ln() + 1.0);
            #[allow(clippy::cast_possible_truncation)]
            vocabulary.insert((*term).to_string(), idx as u32);
        }

        let vectorizer = Self {
            config,
            vocabulary,
            idf,
        };
        let rows: Vec<SparseVector> = analyzed
            .par_iter()
            .map(|terms| vectorizer.weigh(terms))
            .collect();
        let matrix = TfIdfMatrix {
            rows,
            n_features: vectorizer.idf.len(),
        };

        log::debug!(
            "TF-IDF space fitted: {} documents, {} features",
            matrix.len(),
            matrix.n_features()
        );
        Ok((vectorizer, matrix))
    }

    /// Project text into the fitted space without re-fitting
    #[must_use]
    pub fn transform(&self, text: &str) -> SparseVector {
        if self.vocabulary.is_empty() {
            return SparseVector::default();
        }
        let terms = self.config.analyzer().analyze(text);
        self.weigh(&terms)
    }

    fn weigh(&self, terms: &[String]) -> SparseVector {
        let mut counts: BTreeMap<u32, f64> = BTreeMap::new();
        for term in terms {
            if let Some(&idx) = self.vocabulary.get(term) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }
        for (idx, value) in &mut counts {
            *value *= self.idf[*idx as usize];
        }
        let mut vector = SparseVector::from_sorted(counts);
        vector.normalize();
        vector
    }

    #[must_use]
    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    #[must_use]
    pub fn contains_term(&self, term: &str) -> bool {
        self.vocabulary.contains_key(term)
    }

    #[must_use]
    pub const fn config(&self) -> &VectorizerConfig {
        &self.config
    }
}
