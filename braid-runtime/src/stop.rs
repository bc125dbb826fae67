//! End-of-generation detection.
//!
//! Two layers run after every sampled token. The first is the vocabulary's
//! own classification: EOS or any token the model flags as end-of-generation
//! terminates the stream at once. The second catches chat-tuned models that
//! spell their end-of-turn marker as a run of ordinary sub-word tokens
//! instead of a dedicated control token: a sliding window of the last seven
//! accepted tokens is compared against a table of known control sequences.
//!
//! On a window match the six tokens that were already appended to the
//! response must be taken back out. The window only ever retracts the text
//! it rendered itself — a partial match reaching across an earlier
//! retraction is left alone.
//!
//! A third, cruder heuristic stops streams that start hallucinating the
//! next conversation turn ("\n\nUser:" / "\n\nHuman:").

use braid::{Token, Vocab};

/// Number of tokens in a tracked control sequence, and the size of each
/// stream's recent-token window.
pub const STOP_WINDOW: usize = 7;

/// Minimum number of decoded tokens before the turn-marker heuristic kicks
/// in, so short factual answers mentioning "User" are not cut off.
pub(crate) const TURN_MARKER_MIN_DECODED: usize = 5;

const TURN_MARKERS: [&str; 2] = ["\n\nUser:", "\n\nHuman:"];

/// Table of multi-token control sequences that terminate a stream.
///
/// The default entries are the spelled-out Llama-3 markers observed in the
/// wild: `<|eot_id|>` and `<|end_header_id|>` emitted as seven sub-word
/// tokens each. New chat templates get new entries rather than new code.
#[derive(Debug, Clone)]
pub struct StopSequences {
    patterns: Vec<[Token; STOP_WINDOW]>,
}

impl Default for StopSequences {
    fn default() -> Self {
        Self {
            patterns: vec![
                // <|eot_id|> spelled out
                [27, 91, 68, 354, 851, 91, 29],
                // <|end_header_id|> spelled out
                [27, 91, 408, 8932, 851, 91, 29],
            ],
        }
    }
}

impl StopSequences {
    /// Build a table from explicit patterns.
    pub fn new(patterns: impl IntoIterator<Item = [Token; STOP_WINDOW]>) -> Self {
        Self {
            patterns: patterns.into_iter().collect(),
        }
    }

    /// A table that matches nothing.
    #[must_use]
    pub fn none() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    /// Match `window` (the last [`STOP_WINDOW`] accepted tokens, newest
    /// last) against the table.
    #[must_use]
    pub(crate) fn matches(&self, window: &[Token]) -> Option<&[Token; STOP_WINDOW]> {
        if window.len() != STOP_WINDOW {
            return None;
        }
        self.patterns.iter().find(|pattern| pattern.as_slice() == window)
    }
}

/// Render the text a matched window contributed to the response before the
/// match completed: the pieces of its first six tokens, concatenated.
pub(crate) fn retraction<V: Vocab + ?Sized>(vocab: &V, pattern: &[Token; STOP_WINDOW]) -> String {
    pattern[..STOP_WINDOW - 1].iter().map(|&t| vocab.piece(t)).collect()
}

/// Whether the response has drifted into fabricating the next turn.
pub(crate) fn hits_turn_marker(response: &str) -> bool {
    TURN_MARKERS.iter().any(|marker| response.contains(marker))
}
