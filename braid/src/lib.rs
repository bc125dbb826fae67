//! braid: the runtime surface driven by the braid inference scheduler
//!
//! This crate defines the seam between the scheduler and a transformer-style
//! tensor runtime. The runtime owns the model, the KV memory and the sampler
//! chains; the scheduler only drives them through the traits defined here.
//!
//! ```text
//! braid_runtime::Engine<B>   ← prompts in, completions out
//!       └── B: Backend       ← decode / KV memory / vocabulary / samplers
//! ```

pub mod backend;
pub mod batch;
pub mod error;
pub mod memory;
pub mod sampling;
pub mod token;
pub mod vocab;

pub use backend::{Backend, Sampler};
pub use batch::{Batch, BatchView};
pub use error::{Error, Result};
pub use memory::KvMemory;
pub use sampling::{resolve_seed, GenerateOptions, SamplingParams};
pub use token::{SeqId, Token, TOKEN_NONE};
pub use vocab::{detokenize, tokenize, Vocab};
