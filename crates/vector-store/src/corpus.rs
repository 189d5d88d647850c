use crate::tfidf::{TfIdfMatrix, TfIdfVectorizer, VectorizerConfig};
use context_corpus::{
    Chunk, ChunkSource, LoadReport, LoadWarning, StaticSource, WarningKind, MIN_CHUNK_TEXT_LEN,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, TryLockError};
use std::time::{Duration, Instant};

/// Default snapshot lifetime before a rebuild is triggered
pub const DEFAULT_CORPUS_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct CorpusOptions {
    pub ttl: Duration,
    /// Chunks whose trimmed text has at most this many characters are not indexed
    pub min_text_len: usize,
    pub vectorizer: VectorizerConfig,
}

impl Default for CorpusOptions {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CORPUS_TTL,
            min_text_len: MIN_CHUNK_TEXT_LEN,
            vectorizer: VectorizerConfig::default(),
        }
    }
}

/// Immutable (chunks, vector space) pair; never mutated after construction
#[derive(Debug)]
pub struct CorpusSnapshot {
    chunks: Vec<Chunk>,
    vectorizer: TfIdfVectorizer,
    matrix: TfIdfMatrix,
    warnings: Vec<LoadWarning>,
    built_at: Instant,
    generation: u64,
}

impl CorpusSnapshot {
    /// Vectorize a load report. Vectorization failure degrades to an empty snapshot.
    pub fn build(report: LoadReport, config: &VectorizerConfig, generation: u64) -> Self {
        let LoadReport {
            chunks,
            mut warnings,
            ..
        } = report;

        let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        match TfIdfVectorizer::fit(config.clone(), &texts) {
            Ok((vectorizer, matrix)) => Self {
                chunks,
                vectorizer,
                matrix,
                warnings,
                built_at: Instant::now(),
                generation,
            },
            Err(err) => {
                log::warn!("Vector space unavailable, serving empty corpus: {err}");
                warnings.push(LoadWarning::new(
                    "<corpus>",
                    WarningKind::VectorizationFailure,
                    err.to_string(),
                ));
                Self::empty(warnings, generation)
            }
        }
    }

    #[must_use]
    pub fn empty(warnings: Vec<LoadWarning>, generation: u64) -> Self {
        Self {
            chunks: Vec::new(),
            vectorizer: TfIdfVectorizer::default(),
            matrix: TfIdfMatrix::default(),
            warnings,
            built_at: Instant::now(),
            generation,
        }
    }

    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[must_use]
    pub const fn matrix(&self) -> &TfIdfMatrix {
        &self.matrix
    }

    #[must_use]
    pub const fn vectorizer(&self) -> &TfIdfVectorizer {
        &self.vectorizer
    }

    #[must_use]
    pub fn warnings(&self) -> &[LoadWarning] {
        &self.warnings
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn age(&self) -> Duration {
        self.built_at.elapsed()
    }

    /// Cosine similarity of `text` against every chunk, in chunk order
    #[must_use]
    pub fn similarities(&self, text: &str) -> Vec<f64> {
        if self.is_empty() {
            return Vec::new();
        }
        let query = self.vectorizer.transform(text);
        self.matrix.cosine_similarities(&query)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusStats {
    pub chunks: usize,
    pub features: usize,
    pub warnings: usize,
    pub generation: u64,
    pub builds: u64,
}

/// Shared handle to a TTL-cached corpus snapshot.
///
/// Readers clone an `Arc` to the current snapshot and never see a half-built vector space: a
/// rebuild happens off to the side and the pointer is swapped under a short write lock. While a
/// rebuild is in flight, other callers keep using the stale snapshot instead of waiting.
pub struct Corpus {
    source: Box<dyn ChunkSource>,
    options: CorpusOptions,
    current: RwLock<Option<Arc<CorpusSnapshot>>>,
    rebuild_lock: Mutex<()>,
    builds: AtomicU64,
}

impl Corpus {
    pub fn new(source: impl ChunkSource + 'static, options: CorpusOptions) -> Self {
        Self {
            source: Box::new(source),
            options,
            current: RwLock::new(None),
            rebuild_lock: Mutex::new(()),
            builds: AtomicU64::new(0),
        }
    }

    /// Corpus over an in-memory chunk list
    pub fn from_chunks(chunks: Vec<Chunk>, options: CorpusOptions) -> Self {
        let source = StaticSource::new(chunks).with_min_text_len(options.min_text_len);
        Self::new(source, options)
    }

    #[must_use]
    pub const fn options(&self) -> &CorpusOptions {
        &self.options
    }

    /// Current snapshot, rebuilding synchronously when missing or older than the TTL
    pub fn get(&self) -> Arc<CorpusSnapshot> {
        if let Some(snapshot) = self.fresh_snapshot() {
            return snapshot;
        }

        match self.rebuild_lock.try_lock() {
            Ok(_guard) => {
                if let Some(snapshot) = self.fresh_snapshot() {
                    return snapshot;
                }
                self.rebuild()
            }
            Err(TryLockError::WouldBlock) => {
                if let Some(stale) = self.current_snapshot() {
                    log::debug!("Corpus rebuild in flight, serving stale snapshot");
                    return stale;
                }
                let _guard = self
                    .rebuild_lock
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                match self.current_snapshot() {
                    Some(snapshot) => snapshot,
                    None => self.rebuild(),
                }
            }
            Err(TryLockError::Poisoned(poisoned)) => {
                let _guard = poisoned.into_inner();
                self.rebuild()
            }
        }
    }

    /// Force a rebuild regardless of TTL
    pub fn refresh(&self) -> Arc<CorpusSnapshot> {
        let _guard = self
            .rebuild_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.rebuild()
    }

    /// Drop the cached snapshot; the next `get` rebuilds
    pub fn invalidate(&self) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if current.take().is_some() {
            log::debug!("Corpus snapshot invalidated ({})", self.source.describe());
        }
    }

    #[must_use]
    pub fn stats(&self) -> CorpusStats {
        let builds = self.builds.load(Ordering::Relaxed);
        match self.current_snapshot() {
            Some(snapshot) => CorpusStats {
                chunks: snapshot.len(),
                features: snapshot.matrix().n_features(),
                warnings: snapshot.warnings().len(),
                generation: snapshot.generation(),
                builds,
            },
            None => CorpusStats {
                chunks: 0,
                features: 0,
                warnings: 0,
                generation: 0,
                builds,
            },
        }
    }

    fn current_snapshot(&self) -> Option<Arc<CorpusSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn fresh_snapshot(&self) -> Option<Arc<CorpusSnapshot>> {
        self.current_snapshot()
            .filter(|snapshot| snapshot.age() < self.options.ttl)
    }

    /// Caller must hold `rebuild_lock`
    fn rebuild(&self) -> Arc<CorpusSnapshot> {
        let started = Instant::now();
        let generation = self.builds.fetch_add(1, Ordering::Relaxed) + 1;

        let snapshot = match self.source.load() {
            Ok(mut report) => {
                report.retain_longer_than(self.options.min_text_len, self.source.describe());
                CorpusSnapshot::build(report, &self.options.vectorizer, generation)
            }
            Err(err) => {
                log::warn!("Corpus unavailable, serving empty corpus: {err}");
                let warning = LoadWarning::new(
                    self.source.describe(),
                    WarningKind::CorpusUnavailable,
                    err.to_string(),
                );
                CorpusSnapshot::empty(vec![warning], generation)
            }
        };
        let snapshot = Arc::new(snapshot);

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&snapshot));

        log::info!(
            "Corpus built from {}: {} chunks, {} features, {} warnings in {:?}",
            self.source.describe(),
            snapshot.len(),
            snapshot.matrix().n_features(),
            snapshot.warnings().len(),
            started.elapsed()
        );
        snapshot
    }
}

impl std::fmt::Debug for Corpus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Corpus")
            .field("source", &self.source.describe())
            .field("ttl", &self.options.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use context_corpus::{ChunkType, CorpusError};
    use std::sync::atomic::AtomicUsize;

    struct CountingSource {
        loads: Arc<AtomicUsize>,
        chunks: Vec<Chunk>,
    }

    impl ChunkSource for CountingSource {
        fn load(&self) -> context_corpus::Result<LoadReport> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(LoadReport {
                chunks: self.chunks.clone(),
                warnings: Vec::new(),
                records_loaded: 1,
            })
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    struct FailingSource;

    impl ChunkSource for FailingSource {
        fn load(&self) -> context_corpus::Result<LoadReport> {
            Err(CorpusError::unavailable("/missing", "path does not exist"))
        }

        fn describe(&self) -> String {
            "/missing".to_string()
        }
    }

    fn sample_chunks() -> Vec<Chunk> {
        vec![
            Chunk::new("src/a.rs", 1, 4, "fn alpha() { install() }", ChunkType::Function),
            Chunk::new("docs/b.md", 1, 9, "Overview of the install guide", ChunkType::Documentation),
        ]
    }

    fn counting(ttl: Duration) -> (Corpus, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            loads: Arc::clone(&loads),
            chunks: sample_chunks(),
        };
        let options = CorpusOptions {
            ttl,
            ..CorpusOptions::default()
        };
        (Corpus::new(source, options), loads)
    }

    #[test]
    fn snapshot_is_cached_within_ttl() {
        let (corpus, loads) = counting(Duration::from_secs(60));
        let first = corpus.get();
        let second = corpus.get();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(first.len(), 2);
        assert_eq!(first.similarities("install").len(), 2);
    }

    #[test]
    fn expired_snapshot_is_rebuilt_and_old_readers_keep_theirs() {
        let (corpus, loads) = counting(Duration::ZERO);
        let first = corpus.get();
        let second = corpus.get();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        assert_eq!(first.len(), 2);
        assert!(second.generation() > first.generation());
    }

    #[test]
    fn invalidate_forces_rebuild() {
        let (corpus, loads) = counting(Duration::from_secs(60));
        let _ = corpus.get();
        corpus.invalidate();
        let _ = corpus.get();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        assert_eq!(corpus.stats().builds, 2);
    }

    #[test]
    fn min_text_len_applies_to_any_source() {
        let loads = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            loads,
            chunks: sample_chunks(),
        };
        let options = CorpusOptions {
            min_text_len: 25,
            ..CorpusOptions::default()
        };
        let snapshot = Corpus::new(source, options).get();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.chunks()[0].source_path, "docs/b.md");
        assert_eq!(snapshot.warnings()[0].kind, WarningKind::DroppedChunks);

        let lenient = CorpusOptions {
            min_text_len: 3,
            ..CorpusOptions::default()
        };
        let short = vec![Chunk::new("n.md", 1, 1, "deploy key", ChunkType::Text)];
        assert_eq!(Corpus::from_chunks(short.clone(), lenient).get().len(), 1);
        assert!(Corpus::from_chunks(short, CorpusOptions::default()).get().is_empty());
    }

    #[test]
    fn unavailable_source_degrades_to_empty_snapshot() {
        let corpus = Corpus::new(FailingSource, CorpusOptions::default());
        let snapshot = corpus.get();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.warnings().len(), 1);
        assert_eq!(snapshot.warnings()[0].kind, WarningKind::CorpusUnavailable);
        assert!(snapshot.similarities("anything").is_empty());
    }

    #[test]
    fn stop_word_corpus_degrades_to_empty_snapshot() {
        let chunks = vec![Chunk::new("a.md", 1, 1, "the and of it was", ChunkType::Text)];
        let corpus = Corpus::from_chunks(chunks, CorpusOptions::default());
        let snapshot = corpus.get();
        assert!(snapshot.is_empty());
        assert_eq!(
            snapshot.warnings().last().map(|w| w.kind),
            Some(WarningKind::VectorizationFailure)
        );
    }

    #[test]
    fn concurrent_readers_share_one_build() {
        let (corpus, loads) = counting(Duration::from_secs(60));
        let corpus = Arc::new(corpus);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let corpus = Arc::clone(&corpus);
                std::thread::spawn(move || corpus.get().len())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 2);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }
}
