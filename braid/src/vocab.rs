//! Vocabulary surface of the tensor runtime.
//!
//! The runtime owns the vocabulary; this trait exposes the queries the
//! scheduler needs — special-token ids, end-of-generation classification,
//! and the raw tokenizer calls. The free functions [`tokenize`] and
//! [`detokenize`] wrap the raw calls with buffer management and error
//! mapping, which is the only way the scheduler invokes them.

use crate::error::{Error, Result};
use crate::token::{Token, TOKEN_NONE};

/// Vocabulary queries and tokenizer entry points.
///
/// Optional special tokens default to [`TOKEN_NONE`] for models that do not
/// define them.
pub trait Vocab {
    /// Beginning-of-sequence token.
    fn bos(&self) -> Token;

    /// End-of-sequence token.
    fn eos(&self) -> Token;

    /// End-of-turn token.
    fn eot(&self) -> Token {
        TOKEN_NONE
    }

    /// Newline token.
    fn nl(&self) -> Token {
        TOKEN_NONE
    }

    /// Padding token.
    fn pad(&self) -> Token {
        TOKEN_NONE
    }

    /// Separator token.
    fn sep(&self) -> Token {
        TOKEN_NONE
    }

    /// Fill-in-the-middle prefix token.
    fn fim_pre(&self) -> Token {
        TOKEN_NONE
    }

    /// Fill-in-the-middle middle token.
    fn fim_mid(&self) -> Token {
        TOKEN_NONE
    }

    /// Fill-in-the-middle suffix token.
    fn fim_suf(&self) -> Token {
        TOKEN_NONE
    }

    /// Whether `token` ends generation (EOS, EOT, or model-specific markers).
    fn is_eog(&self, token: Token) -> bool;

    /// Whether `token` is a control token.
    fn is_control(&self, token: Token) -> bool {
        let _ = token;
        false
    }

    /// Render `token` as the text fragment it contributes to output.
    fn piece(&self, token: Token) -> String;

    /// The token's raw vocabulary text (may differ from [`Vocab::piece`] for
    /// byte-fallback and control tokens).
    fn text(&self, token: Token) -> String {
        self.piece(token)
    }

    /// The token's score in the vocabulary, 0.0 when unscored.
    fn score(&self, token: Token) -> f32 {
        let _ = token;
        0.0
    }

    /// The token's attribute bits, 0 when the model defines none.
    fn attr(&self, token: Token) -> i32 {
        let _ = token;
        0
    }

    /// Whether the model wants a BOS token prepended to prompts.
    fn add_bos(&self) -> bool {
        false
    }

    /// Whether the model wants an EOS token appended to prompts.
    fn add_eos(&self) -> bool {
        false
    }

    /// Raw tokenizer call. Writes at most `dst.len()` ids into `dst` and
    /// returns the number written, or a negative status on failure.
    /// `add_special` lets the model insert its leading special tokens.
    fn tokenize_raw(&self, text: &str, add_special: bool, dst: &mut [Token]) -> i32;

    /// Raw detokenizer call. Writes at most `dst.len()` bytes into `dst` and
    /// returns the number written, or a negative status on failure.
    fn detokenize_raw(&self, tokens: &[Token], dst: &mut [u8]) -> i32;
}

/// Tokenize `text` through the runtime's vocabulary.
///
/// The destination buffer is sized `text.len() + 2`, which bounds the token
/// count for any byte-level vocabulary plus leading/trailing specials.
///
/// # Errors
/// Returns [`Error::Tokenization`] when the runtime reports a negative count.
pub fn tokenize<V: Vocab + ?Sized>(vocab: &V, text: &str, add_special: bool) -> Result<Vec<Token>> {
    let mut tokens = vec![TOKEN_NONE; text.len() + 2];
    let n = vocab.tokenize_raw(text, add_special, &mut tokens);
    if n < 0 {
        return Err(Error::Tokenization(format!(
            "runtime returned status {n} for a {}-byte prompt",
            text.len()
        )));
    }
    tokens.truncate(usize::try_from(n).unwrap_or(0));
    Ok(tokens)
}

/// Detokenize `tokens` back into text.
///
/// The destination buffer is sized `8 * tokens.len() + 1`, enough for any
/// piece the runtime can emit per token.
///
/// # Errors
/// Returns [`Error::Tokenization`] when the runtime reports a negative count.
pub fn detokenize<V: Vocab + ?Sized>(vocab: &V, tokens: &[Token]) -> Result<String> {
    let mut buf = vec![0u8; tokens.len() * 8 + 1];
    let n = vocab.detokenize_raw(tokens, &mut buf);
    if n < 0 {
        return Err(Error::Tokenization(format!(
            "detokenization of {} tokens returned status {n}",
            tokens.len()
        )));
    }
    buf.truncate(usize::try_from(n).unwrap_or(0));
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
