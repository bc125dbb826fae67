//! Error types for braid

use thiserror::Error;

/// Result type alias using braid's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for braid operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("tokenization failed: {0}")]
    Tokenization(String),

    #[error("prompt of {n_tokens} tokens exceeds context size {n_ctx}")]
    ContextOverflow { n_tokens: usize, n_ctx: usize },

    #[error("failed to initialize sampler chain")]
    SamplerInit,

    #[error("sampling failed: {0}")]
    Sampling(String),

    #[error("decode failed with status {0}")]
    Decode(i32),

    #[error("parallel generation failed: {0}")]
    Generation(String),
}
