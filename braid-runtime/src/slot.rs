//! Per-stream slot state.
//!
//! The scheduler keeps a fixed table of `n_seq_max` slots; a slot's index is
//! stable for the life of a call and pins its KV sequence id. Everything
//! else resets when the slot is released back for reassignment.

use braid::{SeqId, Token, TOKEN_NONE};

use crate::stop::STOP_WINDOW;

/// State of one concurrent generation stream.
pub struct Slot<S> {
    /// Whether the slot currently owns a prompt.
    pub active: bool,
    /// Terminal failure flag; the slot still needs finalisation.
    pub failed: bool,
    /// Terminal success flag; the slot still needs finalisation.
    pub finished: bool,
    /// KV sequence id, slot index + 1. Id 0 is the shared prefix.
    pub seq_id: SeqId,
    /// Index into the caller's prompt vector.
    pub global_index: usize,
    /// Token count of the assigned prompt.
    pub prompt_len: usize,
    /// Tokens reused from the shared prefix.
    pub prefix_len: usize,
    /// Prompt tail not covered by the shared prefix.
    pub suffix_tokens: Vec<Token>,
    /// Positions already decoded for this sequence id.
    pub n_past: usize,
    /// Tokens generated so far.
    pub n_decoded: usize,
    /// Row index in the in-flight batch, `None` when no row is pending.
    pub i_batch: Option<usize>,
    /// Last accepted token; fed back as the next batch row.
    pub sampled: Token,
    /// Sampler chain; `Some` exactly while the slot is active.
    pub sampler: Option<S>,
    /// Accumulated response text.
    pub response: String,
    /// Sliding window of the last accepted tokens, newest last.
    pub recent: Vec<Token>,
    /// Failure description for the result sentinel.
    pub error_msg: String,
}

impl<S> Default for Slot<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Slot<S> {
    pub fn new() -> Self {
        Self {
            active: false,
            failed: false,
            finished: false,
            seq_id: 0,
            global_index: 0,
            prompt_len: 0,
            prefix_len: 0,
            suffix_tokens: Vec::new(),
            n_past: 0,
            n_decoded: 0,
            i_batch: None,
            sampled: TOKEN_NONE,
            sampler: None,
            response: String::new(),
            recent: Vec::new(),
            error_msg: String::new(),
        }
    }

    /// Reset to the empty state, dropping the sampler.
    pub fn release(&mut self) {
        self.active = false;
        self.failed = false;
        self.finished = false;
        self.seq_id = 0;
        self.global_index = 0;
        self.prompt_len = 0;
        self.prefix_len = 0;
        self.suffix_tokens.clear();
        self.n_past = 0;
        self.n_decoded = 0;
        self.i_batch = None;
        self.sampled = TOKEN_NONE;
        self.sampler = None;
        self.response.clear();
        self.recent.clear();
        self.error_msg.clear();
    }

    /// Push an accepted token into the recent-token window.
    pub fn push_recent(&mut self, token: Token) {
        self.recent.push(token);
        if self.recent.len() > STOP_WINDOW {
            self.recent.remove(0);
        }
    }

    /// The full recent window, once enough tokens have accumulated.
    pub fn recent_window(&self) -> Option<&[Token]> {
        (self.recent.len() == STOP_WINDOW).then_some(self.recent.as_slice())
    }

    /// Mark the slot terminally failed.
    pub fn fail(&mut self, msg: impl Into<String>) {
        self.failed = true;
        self.error_msg = msg.into();
        self.i_batch = None;
    }

    /// Whether the slot reached a terminal state and awaits finalisation.
    pub fn is_terminal(&self) -> bool {
        self.finished || self.failed
    }
}
