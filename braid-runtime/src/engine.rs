//! Prompt-level generation engine.
//!
//! The [`Engine`] wraps a backend context and exposes the two generation
//! entry points: [`Engine::generate_parallel`] for a batch of prompts and
//! [`Engine::generate`] for a single pre-tokenised prompt. Both drive the
//! same scheduler; single-prompt generation is the one-slot special case.

use std::time::{Duration, Instant};

use braid::{vocab, Backend, Error, GenerateOptions, KvMemory, Result, Token};
use tracing::{debug, warn};

use crate::prefix;
use crate::progress::ProgressBar;
use crate::scheduler::Scheduler;
use crate::stop::StopSequences;

/// Counters for the most recent generation call.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Prompt tokens admitted across all streams.
    pub prompt_tokens: u64,
    /// Tokens generated by successfully finalised streams.
    pub generated_tokens: u64,
    /// Times the batch driver halved its window under KV pressure.
    pub cache_misses: u64,
    /// Concurrent stream slots the call ran with.
    pub seq_capacity: usize,
    /// Wall-clock duration of the call.
    pub elapsed: Duration,
}

/// Generation engine multiplexing prompts over one backend context.
///
/// The engine borrows the backend's KV memory for the duration of each call
/// and leaves it empty afterwards, so calls are independent: a fixed
/// `(prompt, params, seed ≥ 0)` input reproduces the same output regardless
/// of what ran before.
pub struct Engine<B: Backend> {
    backend: B,
    stop_table: StopSequences,
    stats: RunStats,
}

impl<B: Backend> Engine<B> {
    /// Create an engine with the default multi-token stop table.
    pub fn new(backend: B) -> Self {
        Self::with_stop_sequences(backend, StopSequences::default())
    }

    /// Create an engine with an explicit multi-token stop table.
    pub fn with_stop_sequences(backend: B, stop_table: StopSequences) -> Self {
        Self {
            backend,
            stop_table,
            stats: RunStats::default(),
        }
    }

    /// Get a reference to the underlying backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Get a mutable reference to the underlying backend.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Counters for the most recent call.
    #[must_use]
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Generate a completion for every prompt, multiplexing them over the
    /// backend's sequence slots.
    ///
    /// The result vector has one entry per prompt, in caller order. Streams
    /// that fail individually (context overflow, sampler refusal, decode
    /// pressure) yield `"[ERROR] …"` sentinels without affecting the rest.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArguments`] for an empty prompt list,
    /// [`Error::Tokenization`] when a prompt cannot be tokenised, and
    /// [`Error::Generation`] on an unrecoverable decode failure — in which
    /// case the KV memory has been cleared and the context stays usable.
    pub fn generate_parallel(
        &mut self,
        prompts: &[&str],
        options: &GenerateOptions,
    ) -> Result<Vec<String>> {
        if prompts.is_empty() {
            return Err(Error::InvalidArguments("prompt list is empty".to_owned()));
        }

        let mut prompt_tokens = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            prompt_tokens.push(vocab::tokenize(self.backend.vocab(), prompt, true)?);
        }

        let seq_capacity = self.backend.n_seq_max().max(1);
        self.run(&prompt_tokens, options, seq_capacity)
    }

    /// Generate a completion for one pre-tokenised prompt.
    ///
    /// Runs the same engine as [`Engine::generate_parallel`] with a single
    /// stream slot.
    ///
    /// # Errors
    /// Returns [`Error::Generation`] on an unrecoverable decode failure.
    pub fn generate(&mut self, input_ids: &[Token], options: &GenerateOptions) -> Result<String> {
        let prompt_tokens = vec![input_ids.to_vec()];
        let mut results = self.run(&prompt_tokens, options, 1)?;
        Ok(results.pop().unwrap_or_default())
    }

    fn run(
        &mut self,
        prompts: &[Vec<Token>],
        options: &GenerateOptions,
        seq_capacity: usize,
    ) -> Result<Vec<String>> {
        let started = Instant::now();
        self.stats = RunStats {
            seq_capacity,
            ..RunStats::default()
        };

        let shared_prefix = prefix::shared_prefix_len(prompts);
        debug!(
            n_prompts = prompts.len(),
            shared_prefix, seq_capacity, "starting generation"
        );

        self.backend.memory().clear();
        let mut progress = options
            .show_progress
            .then(|| ProgressBar::new(prompts.len()));

        let outcome = Scheduler::new(
            &mut self.backend,
            prompts,
            options,
            &self.stop_table,
            &mut self.stats,
            &mut progress,
            seq_capacity,
        )
        .run(shared_prefix);

        if let Some(bar) = progress.as_mut() {
            bar.finish();
        }
        self.stats.elapsed = started.elapsed();

        match outcome {
            Ok(results) => {
                debug!(
                    prompt_tokens = self.stats.prompt_tokens,
                    generated_tokens = self.stats.generated_tokens,
                    cache_misses = self.stats.cache_misses,
                    elapsed = ?self.stats.elapsed,
                    "generation complete"
                );
                Ok(results)
            }
            Err(e) => {
                self.backend.memory().clear();
                warn!(error = %e, "generation aborted; KV memory cleared");
                Err(Error::Generation(e.to_string()))
            }
        }
    }
}
