//! Shared-prefix analysis across a batch of tokenised prompts.
//!
//! Prompts that open with the same system preamble or instruction block
//! share a token prefix. Decoding that prefix once and cloning its KV rows
//! into each stream amortises prompt processing across the whole call; the
//! analysis here is what makes that reuse safe.

use braid::Token;

/// Length of the longest token prefix common to every prompt.
///
/// A single prompt shares its full length with itself. Two or more prompts
/// may share nothing, in which case the result is 0 and prefix reuse is
/// simply skipped.
#[must_use]
pub fn shared_prefix_len(prompts: &[Vec<Token>]) -> usize {
    let Some(first) = prompts.first() else {
        return 0;
    };
    let mut shared = first.len();
    for prompt in &prompts[1..] {
        let limit = shared.min(prompt.len());
        let mut common = 0;
        while common < limit && prompt[common] == first[common] {
            common += 1;
        }
        shared = common;
        if shared == 0 {
            break;
        }
    }
    shared
}
