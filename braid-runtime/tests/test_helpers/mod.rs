//! Shared mock runtime for engine integration tests.
//!
//! [`MockBackend`] plays the tensor runtime: it tracks KV rows per sequence
//! id (asserting dense appends), derives a deterministic "most probable"
//! next token for every logits row from the sequence's cached content, and
//! supports scripted continuations plus decode/sampler failure injection.
//!
//! The vocabulary is character-level: each char tokenises to its code
//! point, so prompts that share a leading substring share a token prefix.

#![allow(
    dead_code,
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap
)]

use std::cell::Cell;
use std::collections::HashMap;

use braid::{
    resolve_seed, Backend, BatchView, Error, GenerateOptions, KvMemory, Result, Sampler,
    SamplingParams, SeqId, Token, Vocab,
};

/// A generously sized backend: no KV pressure, four stream slots.
pub fn backend() -> MockBackend {
    MockBackend::new(4096, 64, 4)
}

/// Deterministic options: temperature 0, fixed seed.
pub fn greedy_options(max_tokens: usize) -> GenerateOptions {
    GenerateOptions {
        max_tokens,
        sampling: SamplingParams {
            temperature: 0.0,
            seed: 7,
            ..SamplingParams::default()
        },
        show_progress: false,
    }
}

pub const BOS: Token = 1;
pub const EOS: Token = 2;

// ---------------------------------------------------------------------------
// Vocabulary
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockVocab {
    pub add_bos: bool,
    /// Make `tokenize_raw` report failure.
    pub refuse_tokenize: bool,
    /// Extra tokens classified as end-of-generation.
    pub extra_eog: Vec<Token>,
    /// Per-token piece overrides; everything else renders as its char.
    pub pieces: HashMap<Token, String>,
}

impl Vocab for MockVocab {
    fn bos(&self) -> Token {
        BOS
    }

    fn eos(&self) -> Token {
        EOS
    }

    fn is_eog(&self, token: Token) -> bool {
        token == EOS || self.extra_eog.contains(&token)
    }

    fn piece(&self, token: Token) -> String {
        if let Some(piece) = self.pieces.get(&token) {
            return piece.clone();
        }
        u32::try_from(token)
            .ok()
            .and_then(char::from_u32)
            .map_or_else(String::new, |c| c.to_string())
    }

    fn tokenize_raw(&self, text: &str, add_special: bool, dst: &mut [Token]) -> i32 {
        if self.refuse_tokenize {
            return -1;
        }
        let mut n = 0;
        if add_special && self.add_bos {
            dst[n] = BOS;
            n += 1;
        }
        for c in text.chars() {
            if n >= dst.len() {
                return -2;
            }
            dst[n] = c as Token;
            n += 1;
        }
        i32::try_from(n).unwrap_or(-2)
    }

    fn detokenize_raw(&self, tokens: &[Token], dst: &mut [u8]) -> i32 {
        let mut out = String::new();
        for &t in tokens {
            if t == BOS || t == EOS {
                continue;
            }
            out.push_str(&self.piece(t));
        }
        if out.len() > dst.len() {
            return -1;
        }
        dst[..out.len()].copy_from_slice(out.as_bytes());
        i32::try_from(out.len()).unwrap_or(-2)
    }
}

// ---------------------------------------------------------------------------
// KV memory
// ---------------------------------------------------------------------------

/// Dense per-sequence rows: index == position.
#[derive(Default)]
pub struct MockMemory {
    pub seqs: HashMap<SeqId, Vec<Token>>,
}

fn clamp_range(p0: i32, p1: i32, len: usize) -> (usize, usize) {
    let a = if p0 < 0 {
        0
    } else {
        (p0 as usize).min(len)
    };
    let b = if p1 < 0 {
        len
    } else {
        (p1 as usize).min(len)
    };
    (a, b.max(a))
}

impl KvMemory for MockMemory {
    fn clear(&mut self) {
        self.seqs.clear();
    }

    fn seq_copy(&mut self, src: SeqId, dst: SeqId, p0: i32, p1: i32) {
        let rows = self.seqs.get(&src).cloned().unwrap_or_default();
        let (a, b) = clamp_range(p0, p1, rows.len());
        if a == b {
            return;
        }
        let entry = self.seqs.entry(dst).or_default();
        assert_eq!(entry.len(), a, "copy into seq {dst} must land at its tail");
        entry.extend_from_slice(&rows[a..b]);
    }

    fn seq_remove(&mut self, seq: SeqId, p0: i32, p1: i32) {
        if let Some(rows) = self.seqs.get_mut(&seq) {
            let (a, b) = clamp_range(p0, p1, rows.len());
            rows.drain(a..b);
            if rows.is_empty() {
                self.seqs.remove(&seq);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

type DecodeHook = Box<dyn FnMut(BatchView<'_>) -> i32>;

pub struct MockBackend {
    pub n_ctx: usize,
    pub n_batch: usize,
    pub n_seq_max: usize,
    pub vocab: MockVocab,
    pub memory: MockMemory,
    /// Exact-context continuations consulted before the default rule.
    script: HashMap<Vec<Token>, Token>,
    /// Next token per row of the most recently decoded window.
    last_logits: Vec<Option<Token>>,
    /// Inspect each decode before it lands; a non-zero return is passed to
    /// the driver and the window is not applied.
    pub decode_hook: Option<DecodeHook>,
    pub decode_calls: usize,
    pub sample_calls: Cell<usize>,
    /// Refuse to build samplers entirely.
    pub refuse_samplers: bool,
    /// Make the nth constructed sampler (0-based) error on its first sample.
    pub sampler_fail_nth: Option<usize>,
    samplers_built: Cell<usize>,
}

impl MockBackend {
    pub fn new(n_ctx: usize, n_batch: usize, n_seq_max: usize) -> Self {
        Self {
            n_ctx,
            n_batch,
            n_seq_max,
            vocab: MockVocab::default(),
            memory: MockMemory::default(),
            script: HashMap::new(),
            last_logits: Vec::new(),
            decode_hook: None,
            decode_calls: 0,
            sample_calls: Cell::new(0),
            refuse_samplers: false,
            sampler_fail_nth: None,
            samplers_built: Cell::new(0),
        }
    }

    /// Tokenise `text` the way the engine will (specials included).
    pub fn tokens_of(&self, text: &str) -> Vec<Token> {
        braid::tokenize(&self.vocab, text, true).expect("mock tokenize")
    }

    /// Script the continuation the model "prefers" after `prompt`.
    ///
    /// Accounts for the engine feeding the prompt's last token again as the
    /// first generation row.
    pub fn script_continuation(&mut self, prompt: &[Token], continuation: &[Token]) {
        let mut context = prompt.to_vec();
        context.push(*prompt.last().expect("non-empty prompt"));
        for &next in continuation {
            self.script.insert(context.clone(), next);
            context.push(next);
        }
    }

    /// Convenience: script a continuation for a text prompt.
    pub fn script_text_continuation(&mut self, prompt: &str, continuation: &[Token]) {
        let tokens = self.tokens_of(prompt);
        self.script_continuation(&tokens, continuation);
    }

    /// Total KV rows cached across all sequence ids.
    pub fn kv_rows_total(&self) -> usize {
        self.memory.seqs.values().map(Vec::len).sum()
    }
}

/// Deterministic stand-in for greedy decoding: a lowercase letter derived
/// from the sequence's cached content.
fn default_next(context: &[Token]) -> Token {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for &t in context {
        h = h.wrapping_mul(0x0100_0000_01b3) ^ (t as u64);
    }
    Token::from(b'a' + u8::try_from(h % 26).expect("mod 26 fits"))
}

impl Backend for MockBackend {
    type Vocab = MockVocab;
    type Memory = MockMemory;
    type Sampler = MockSampler;

    fn n_ctx(&self) -> usize {
        self.n_ctx
    }

    fn n_batch(&self) -> usize {
        self.n_batch
    }

    fn n_seq_max(&self) -> usize {
        self.n_seq_max
    }

    fn vocab(&self) -> &MockVocab {
        &self.vocab
    }

    fn memory(&mut self) -> &mut MockMemory {
        &mut self.memory
    }

    fn decode(&mut self, batch: BatchView<'_>) -> i32 {
        self.decode_calls += 1;
        if let Some(hook) = self.decode_hook.as_mut() {
            let status = hook(batch);
            if status != 0 {
                return status;
            }
        }

        self.last_logits = vec![None; batch.len()];
        for i in 0..batch.len() {
            let token = batch.tokens[i];
            let pos = batch.pos[i];
            for &seq in &batch.seq_ids[i] {
                let rows = self.memory.seqs.entry(seq).or_default();
                assert_eq!(
                    usize::try_from(pos).expect("non-negative position"),
                    rows.len(),
                    "non-dense append for seq {seq}"
                );
                rows.push(token);
            }
            if batch.logits[i] {
                let seq = batch.seq_ids[i][0];
                let context = &self.memory.seqs[&seq];
                let next = self
                    .script
                    .get(context)
                    .copied()
                    .unwrap_or_else(|| default_next(context));
                self.last_logits[i] = Some(next);
            }
        }
        0
    }

    fn sampler(&self, params: &SamplingParams) -> Option<MockSampler> {
        if self.refuse_samplers {
            return None;
        }
        let nth = self.samplers_built.get();
        self.samplers_built.set(nth + 1);
        Some(MockSampler {
            seed: resolve_seed(params.seed),
            accepted: Vec::new(),
            fail: self.sampler_fail_nth == Some(nth),
        })
    }
}

// ---------------------------------------------------------------------------
// Sampler
// ---------------------------------------------------------------------------

pub struct MockSampler {
    pub seed: u64,
    pub accepted: Vec<Token>,
    fail: bool,
}

impl Sampler<MockBackend> for MockSampler {
    fn sample(&mut self, backend: &MockBackend, row: usize) -> Result<Token> {
        backend.sample_calls.set(backend.sample_calls.get() + 1);
        if self.fail {
            return Err(Error::Sampling("sampler chain exploded".to_owned()));
        }
        Ok(backend.last_logits[row].expect("sampled a row that emitted no logits"))
    }

    fn accept(&mut self, token: Token, _apply_penalty: bool) {
        self.accepted.push(token);
    }
}
