//! Slot table, admission, and the main generation loop.
//!
//! One [`Scheduler`] drives one generation call. It owns the run state: the
//! fixed slot table (one KV sequence id per slot), the pending-prompt queue,
//! and the result vector. Each loop iteration tops up free slots from the
//! queue, assembles one batch row per live stream, submits it through the
//! driver, samples each stream as its window lands, and finalises streams
//! that reached a terminal state.

#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]

use std::collections::VecDeque;

use braid::{
    Backend, Batch, Error, GenerateOptions, KvMemory, Result, Sampler, SeqId, Token, Vocab,
};
use tracing::debug;

use crate::cleaner;
use crate::driver::{self, Submission};
use crate::engine::RunStats;
use crate::progress::ProgressBar;
use crate::slot::Slot;
use crate::stop::{self, StopSequences, TURN_MARKER_MIN_DECODED};

/// Sequence id reserved for the shared prompt prefix.
const PREFIX_SEQ: SeqId = 0;

/// Positions kept free below the context size when admitting a prompt, so
/// generation has room to grow.
const CONTEXT_HEADROOM: usize = 64;

pub struct Scheduler<'r, B: Backend> {
    backend: &'r mut B,
    prompts: &'r [Vec<Token>],
    options: &'r GenerateOptions,
    stop_table: &'r StopSequences,
    stats: &'r mut RunStats,
    progress: &'r mut Option<ProgressBar>,
    slots: Vec<Slot<B::Sampler>>,
    queue: VecDeque<usize>,
    results: Vec<String>,
    prefix_ready: bool,
    prefix_len: usize,
}

impl<'r, B: Backend> Scheduler<'r, B> {
    pub fn new(
        backend: &'r mut B,
        prompts: &'r [Vec<Token>],
        options: &'r GenerateOptions,
        stop_table: &'r StopSequences,
        stats: &'r mut RunStats,
        progress: &'r mut Option<ProgressBar>,
        seq_capacity: usize,
    ) -> Self {
        Self {
            backend,
            prompts,
            options,
            stop_table,
            stats,
            progress,
            slots: (0..seq_capacity).map(|_| Slot::new()).collect(),
            queue: (0..prompts.len()).collect(),
            results: vec![String::new(); prompts.len()],
            prefix_ready: false,
            prefix_len: 0,
        }
    }

    /// Run the call to completion: warm the shared prefix, loop until every
    /// prompt has a result, clean up.
    ///
    /// # Errors
    /// Returns an error on an unrecoverable decode failure. The caller is
    /// responsible for clearing the KV memory afterwards.
    pub fn run(mut self, shared_prefix: usize) -> Result<Vec<String>> {
        self.warm_prefix(shared_prefix)?;
        self.run_loop()?;
        Ok(self.finish())
    }

    /// Decode the shared prefix once under the reserved sequence id.
    ///
    /// A soft stall disables prefix reuse and generation proceeds with full
    /// per-slot prompts; a fatal status aborts the call.
    fn warm_prefix(&mut self, shared_prefix: usize) -> Result<()> {
        if shared_prefix == 0 {
            return Ok(());
        }
        let prefix = &self.prompts[0][..shared_prefix];
        let mut batch = Batch::with_capacity(prefix.len());
        for (j, &token) in prefix.iter().enumerate() {
            batch.add(token, j as i32, &[PREFIX_SEQ], j == prefix.len() - 1);
        }

        match driver::submit(
            &mut *self.backend,
            &batch,
            &mut self.stats.cache_misses,
            |_, _, _| {},
        ) {
            Submission::Complete => {
                self.prefix_ready = true;
                self.prefix_len = shared_prefix;
                Ok(())
            }
            Submission::Stalled { .. } => {
                debug!(shared_prefix, "prefix warm-up stalled; continuing without reuse");
                self.backend.memory().clear();
                self.prefix_ready = false;
                Ok(())
            }
            Submission::Fatal { status } => Err(Error::Decode(status)),
        }
    }

    fn run_loop(&mut self) -> Result<()> {
        loop {
            self.fill_slots();

            let mut batch = Batch::new();
            for slot in &mut self.slots {
                if !slot.active || slot.is_terminal() {
                    continue;
                }
                if slot.n_decoded >= self.options.max_tokens {
                    slot.finished = true;
                    continue;
                }
                slot.i_batch = Some(batch.len());
                let pos = (slot.n_past + slot.n_decoded) as i32;
                batch.add(slot.sampled, pos, &[slot.seq_id], true);
            }

            if batch.is_empty() {
                self.sweep();
                if self.queue.is_empty() && !self.slots.iter().any(|s| s.active) {
                    return Ok(());
                }
                continue;
            }

            let outcome = {
                let slots = &mut self.slots;
                let stop_table = self.stop_table;
                driver::submit(
                    &mut *self.backend,
                    &batch,
                    &mut self.stats.cache_misses,
                    |backend, start, len| {
                        process_window(backend, slots, stop_table, start, len);
                    },
                )
            };

            match outcome {
                Submission::Complete => {}
                Submission::Stalled { decoded } => {
                    // rows past the stall never produced logits; their
                    // streams fail, everyone else carries on
                    debug!(decoded, total = batch.len(), "generation batch stalled");
                    for slot in &mut self.slots {
                        if slot.active && !slot.is_terminal() && slot.i_batch.is_some() {
                            slot.fail("No KV slot available at minimum batch size");
                        }
                    }
                }
                Submission::Fatal { status } => return Err(Error::Decode(status)),
            }

            self.sweep();
        }
    }

    /// Finalise every terminal slot: drop its KV rows, store its result,
    /// release it for reassignment.
    fn sweep(&mut self) {
        for k in 0..self.slots.len() {
            if self.slots[k].active && self.slots[k].is_terminal() {
                self.finalize(k);
            }
        }
    }

    fn finalize(&mut self, k: usize) {
        let seq_id = self.slots[k].seq_id;
        if seq_id > PREFIX_SEQ {
            self.backend.memory().seq_remove(seq_id, 0, -1);
        }

        let global_index = self.slots[k].global_index;
        if self.slots[k].failed {
            debug!(prompt = global_index, error = %self.slots[k].error_msg, "stream failed");
            self.results[global_index] = error_sentinel(&self.slots[k].error_msg);
        } else {
            self.results[global_index] = cleaner::clean_response(&self.slots[k].response);
            self.stats.generated_tokens += self.slots[k].n_decoded as u64;
        }

        self.slots[k].release();
        if let Some(bar) = self.progress.as_mut() {
            bar.tick();
        }
    }

    /// Top up free slots from the pending queue, skipping prompts whose
    /// admission fails (their error result is already written).
    fn fill_slots(&mut self) {
        for k in 0..self.slots.len() {
            if self.queue.is_empty() {
                break;
            }
            if self.slots[k].active {
                continue;
            }
            while let Some(global_index) = self.queue.pop_front() {
                if self.try_assign(k, global_index) {
                    break;
                }
            }
        }
    }

    fn try_assign(&mut self, k: usize, global_index: usize) -> bool {
        let tokens = &self.prompts[global_index];
        let n_prompt = tokens.len();

        let Some(sampler) = self.backend.sampler(&self.options.sampling) else {
            self.results[global_index] = error_sentinel(&Error::SamplerInit.to_string());
            return false;
        };
        let n_ctx = self.backend.n_ctx();
        if n_prompt > n_ctx.saturating_sub(CONTEXT_HEADROOM) {
            let overflow = Error::ContextOverflow {
                n_tokens: n_prompt,
                n_ctx,
            };
            self.results[global_index] = error_sentinel(&overflow.to_string());
            return false;
        }
        if n_prompt == 0 {
            self.results[global_index] = error_sentinel("Prompt resulted in zero tokens");
            return false;
        }

        let prefix_len = if self.prefix_ready {
            self.prefix_len.min(n_prompt)
        } else {
            0
        };

        {
            let slot = &mut self.slots[k];
            slot.seq_id = k as SeqId + 1;
            slot.global_index = global_index;
            slot.prompt_len = n_prompt;
            slot.prefix_len = prefix_len;
            slot.suffix_tokens = tokens[prefix_len..].to_vec();
            slot.n_past = prefix_len;
            slot.n_decoded = 0;
            slot.i_batch = None;
            slot.sampled = tokens[n_prompt - 1];
            slot.sampler = Some(sampler);
        }
        self.stats.prompt_tokens += n_prompt as u64;

        if prefix_len > 0 {
            let seq_id = self.slots[k].seq_id;
            self.backend.memory().seq_copy(PREFIX_SEQ, seq_id, -1, -1);
        }

        if !self.decode_suffix(k) {
            let seq_id = self.slots[k].seq_id;
            self.backend.memory().seq_remove(seq_id, 0, -1);
            self.results[global_index] = error_sentinel(&self.slots[k].error_msg);
            self.slots[k].release();
            return false;
        }

        self.slots[k].active = true;
        true
    }

    /// Decode the slot's prompt tail, continuing from the copied prefix.
    fn decode_suffix(&mut self, k: usize) -> bool {
        if self.slots[k].suffix_tokens.is_empty() {
            self.slots[k].n_past = self.slots[k].prompt_len;
            return true;
        }

        let batch = {
            let slot = &self.slots[k];
            let mut batch = Batch::with_capacity(slot.suffix_tokens.len());
            let last = slot.suffix_tokens.len() - 1;
            for (j, &token) in slot.suffix_tokens.iter().enumerate() {
                let pos = (slot.prefix_len + j) as i32;
                batch.add(token, pos, &[slot.seq_id], j == last);
            }
            batch
        };

        match driver::submit(
            &mut *self.backend,
            &batch,
            &mut self.stats.cache_misses,
            |_, _, _| {},
        ) {
            Submission::Complete => {
                self.slots[k].n_past = self.slots[k].prompt_len;
                true
            }
            Submission::Stalled { .. } | Submission::Fatal { .. } => {
                self.slots[k].error_msg = "Failed to decode prompt tokens".to_owned();
                false
            }
        }
    }

    /// Success-path cleanup: release every slot and drop the shared prefix.
    fn finish(&mut self) -> Vec<String> {
        for slot in &mut self.slots {
            slot.release();
        }
        if self.prefix_ready {
            self.backend.memory().seq_remove(PREFIX_SEQ, 0, -1);
        }
        std::mem::take(&mut self.results)
    }
}

/// Sample every stream whose batch row landed in the decoded window
/// `[start, start + len)`, while the window's logits are current.
fn process_window<B: Backend>(
    backend: &mut B,
    slots: &mut [Slot<B::Sampler>],
    stop_table: &StopSequences,
    start: usize,
    len: usize,
) {
    for slot in slots.iter_mut() {
        if !slot.active || slot.is_terminal() {
            continue;
        }
        let Some(row) = slot.i_batch else { continue };
        if row < start || row >= start + len {
            continue;
        }

        let Some(sampler) = slot.sampler.as_mut() else {
            continue;
        };
        let token = match sampler.sample(&*backend, row - start) {
            Ok(token) => token,
            Err(e) => {
                slot.fail(e.to_string());
                continue;
            }
        };
        sampler.accept(token, true);

        let vocab = backend.vocab();
        let mut stopping = token == vocab.eos() || vocab.is_eog(token);
        if !stopping {
            slot.push_recent(token);
            if let Some(pattern) = slot.recent_window().and_then(|w| stop_table.matches(w)) {
                // the first six tokens already landed in the response; take
                // their rendering back out before stopping
                let tail = stop::retraction(vocab, pattern);
                if slot.response.ends_with(&tail) {
                    let keep = slot.response.len() - tail.len();
                    slot.response.truncate(keep);
                }
                stopping = true;
            } else {
                slot.response.push_str(&vocab.piece(token));
                if slot.n_decoded > TURN_MARKER_MIN_DECODED
                    && stop::hits_turn_marker(&slot.response)
                {
                    stopping = true;
                }
            }
        }

        slot.sampled = token;
        slot.n_decoded += 1;
        slot.i_batch = None;
        if stopping {
            slot.finished = true;
        }
    }
}

fn error_sentinel(msg: &str) -> String {
    if msg.is_empty() {
        "[ERROR] Unknown error".to_owned()
    } else {
        format!("[ERROR] {msg}")
    }
}
