//! Token batches submitted to the runtime.
//!
//! A [`Batch`] is an ordered list of `(token, position, sequence ids,
//! emit-logits)` rows. The runtime decodes contiguous windows of a batch,
//! borrowed as [`BatchView`]s, and produces logits only for rows whose
//! emit-logits flag is set.

use crate::token::{SeqId, Token};

/// An owned batch of token rows.
#[derive(Debug, Default, Clone)]
pub struct Batch {
    tokens: Vec<Token>,
    pos: Vec<i32>,
    seq_ids: Vec<Vec<SeqId>>,
    logits: Vec<bool>,
}

impl Batch {
    /// Create an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty batch with room for `n` rows.
    #[must_use]
    pub fn with_capacity(n: usize) -> Self {
        Self {
            tokens: Vec::with_capacity(n),
            pos: Vec::with_capacity(n),
            seq_ids: Vec::with_capacity(n),
            logits: Vec::with_capacity(n),
        }
    }

    /// Append one row. `logits` marks the row's output logits for sampling;
    /// only rows that will actually be sampled need it.
    pub fn add(&mut self, token: Token, pos: i32, seq_ids: &[SeqId], logits: bool) {
        self.tokens.push(token);
        self.pos.push(pos);
        self.seq_ids.push(seq_ids.to_vec());
        self.logits.push(logits);
    }

    /// Number of rows in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the batch has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Borrow the contiguous window `[start, start + len)`.
    ///
    /// # Panics
    /// Panics if the window exceeds the batch bounds.
    #[must_use]
    pub fn view(&self, start: usize, len: usize) -> BatchView<'_> {
        let end = start + len;
        BatchView {
            tokens: &self.tokens[start..end],
            pos: &self.pos[start..end],
            seq_ids: &self.seq_ids[start..end],
            logits: &self.logits[start..end],
        }
    }
}

/// A borrowed contiguous window of a [`Batch`], as handed to the runtime's
/// decode call.
#[derive(Debug, Clone, Copy)]
pub struct BatchView<'a> {
    /// Token ids, one per row.
    pub tokens: &'a [Token],
    /// Per-sequence positions, one per row.
    pub pos: &'a [i32],
    /// Sequence ids each row belongs to.
    pub seq_ids: &'a [Vec<SeqId>],
    /// Emit-logits flags, one per row.
    pub logits: &'a [bool],
}

impl BatchView<'_> {
    /// Number of rows in the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the window has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
