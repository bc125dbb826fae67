//! Backend trait: the seam between the scheduler and the tensor runtime.
//!
//! The scheduler is generic over `B: Backend`. A backend bundles the context
//! queries, the decode entry point, the KV memory, the vocabulary, and a
//! sampler factory. It owns all tensors; the scheduler never sees one.

use crate::batch::BatchView;
use crate::error::Result;
use crate::memory::KvMemory;
use crate::sampling::SamplingParams;
use crate::token::Token;
use crate::vocab::Vocab;

/// A tensor runtime context the scheduler can drive.
pub trait Backend: Sized {
    /// The runtime's vocabulary type.
    type Vocab: Vocab;
    /// The runtime's KV memory type.
    type Memory: KvMemory;
    /// The runtime's sampler chain type.
    type Sampler: Sampler<Self>;

    /// Maximum position count across all sequence ids combined.
    fn n_ctx(&self) -> usize;

    /// Maximum number of tokens the runtime accepts per decode call.
    fn n_batch(&self) -> usize;

    /// Number of concurrent sequence ids the context supports.
    fn n_seq_max(&self) -> usize;

    /// The model's vocabulary.
    fn vocab(&self) -> &Self::Vocab;

    /// The context's KV memory.
    fn memory(&mut self) -> &mut Self::Memory;

    /// Decode one contiguous batch window.
    ///
    /// Returns 0 on success. A positive status means the runtime could not
    /// find a KV slot for this window and a smaller one may still fit; a
    /// negative status is unrecoverable.
    fn decode(&mut self, batch: BatchView<'_>) -> i32;

    /// Build a fresh sampler chain, or `None` when the runtime refuses.
    fn sampler(&self, params: &SamplingParams) -> Option<Self::Sampler>;
}

/// A sampler chain owned by one generation stream.
pub trait Sampler<B: Backend> {
    /// Sample a token from the logits of `row` within the most recently
    /// decoded window.
    ///
    /// # Errors
    /// Returns an error when the runtime's sampling primitive fails.
    fn sample(&mut self, backend: &B, row: usize) -> Result<Token>;

    /// Record `token` as accepted so stateful stages (repetition penalties)
    /// stay coherent. `apply_penalty` forwards the runtime's grammar/penalty
    /// bookkeeping flag.
    fn accept(&mut self, token: Token, apply_penalty: bool);
}
