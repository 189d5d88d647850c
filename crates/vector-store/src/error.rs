use thiserror::Error;

pub type Result<T> = std::result::Result<T, VectorStoreError>;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Corpus error: {0}")]
    Corpus(#[from] context_corpus::CorpusError),

    #[error("Vectorization failed: {0}")]
    VectorizationFailure(String),

    #[error("Invalid vectorizer configuration: {0}")]
    InvalidConfig(String),
}
