//! Sampling parameters for text generation

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Parameters for the runtime's sampler chain.
///
/// Consumed once, at sampler construction. The scheduler builds one sampler
/// per concurrent stream so that a stream's sampling state is independent of
/// how streams happen to interleave.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Keep only the `top_k` most probable tokens. Non-positive disables.
    pub top_k: i32,
    /// Nucleus probability threshold in (0, 1].
    pub top_p: f32,
    /// Temperature for logit scaling. 0 selects greedy decoding.
    pub temperature: f32,
    /// Number of recent tokens the repetition penalty considers.
    pub penalty_last_n: i32,
    /// Repetition penalty factor. 1.0 disables the penalty.
    pub penalty_repeat: f32,
    /// PRNG seed. Negative means "derive from the wall clock" — see
    /// [`resolve_seed`]. Same non-negative seed + same input → same output.
    pub seed: i64,
    /// Minimum number of candidates every sampling stage must keep.
    pub min_keep: usize,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            top_k: 40,
            top_p: 0.95,
            temperature: 0.8,
            penalty_last_n: 64,
            penalty_repeat: 1.0,
            seed: -1,
            min_keep: 1,
        }
    }
}

/// Options for a generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Maximum number of new tokens per prompt. 0 generates nothing.
    pub max_tokens: usize,
    /// Sampler configuration, applied to every stream in the call.
    pub sampling: SamplingParams,
    /// Print a progress bar to stderr as prompts complete.
    pub show_progress: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            max_tokens: 128,
            sampling: SamplingParams::default(),
            show_progress: false,
        }
    }
}

/// Resolve a requested seed at sampler construction time.
///
/// Non-negative seeds pass through unchanged; negative seeds are replaced by
/// the wall clock, so every call gets a fresh one.
#[must_use]
pub fn resolve_seed(seed: i64) -> u64 {
    u64::try_from(seed).unwrap_or_else(|_| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs())
    })
}
