//! braid-runtime: continuous-batching generation over a shared context
//!
//! The [`Engine`] multiplexes up to `n_seq_max` generation streams over one
//! backend context. Prompts that share a token prefix have it decoded once
//! under a reserved sequence id and cloned into each stream's KV rows, so
//! the most expensive part of inference is paid once per call.
//!
//! ```text
//! Engine<B>            ← prompts in, completions out
//!   ├── scheduler      ← slot table, admission, per-iteration batches
//!   │     ├── driver   ← adaptive-chunk submission to the runtime
//!   │     ├── slot     ← per-stream state (sampler, text, stop window)
//!   │     └── stop     ← end-of-generation detection
//!   ├── prefix         ← shared-prefix analysis
//!   └── cleaner        ← final-response cleanup
//! ```
//!
//! The engine is single-threaded and cooperative: every iteration submits
//! one combined batch spanning all live streams, and the runtime is free to
//! parallelise that batch internally. Results always come back in caller
//! order, and a fixed `(prompt, params, seed)` input reproduces the same
//! output on the same build.

mod cleaner;
mod driver;
mod engine;
mod prefix;
mod progress;
mod scheduler;
mod slot;
mod stop;

pub use engine::{Engine, RunStats};
pub use stop::{StopSequences, STOP_WINDOW};
