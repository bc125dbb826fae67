//! Adaptive-chunk batch submission.
//!
//! The runtime bounds how many tokens one decode call may carry, and under
//! KV pressure it can refuse a window that would otherwise fit. The driver
//! walks a batch in contiguous windows capped by a tail length, halving the
//! cap whenever the runtime reports a soft failure and retrying the same
//! window. The cap stays halved for the rest of the submission; every new
//! submission starts fresh from `min(512, n_batch)`.

use braid::{Backend, Batch};

/// Upper bound on the initial tail cap, independent of the runtime's batch
/// capacity.
const TAIL_CAP_MAX: usize = 512;

/// Outcome of submitting one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Every window decoded.
    Complete,
    /// The runtime refused a window even at a single token; `decoded` rows
    /// made it in before the stall.
    Stalled { decoded: usize },
    /// The runtime reported an unrecoverable failure.
    Fatal { status: i32 },
}

/// Submit `batch` window by window, invoking `on_window(backend, start, len)`
/// after each window the runtime accepts.
///
/// The callback runs before the next window is decoded, while the window's
/// logits are still current — sampling must happen there.
///
/// Each halving retry bumps `cache_misses`.
pub fn submit<B, F>(backend: &mut B, batch: &Batch, cache_misses: &mut u64, mut on_window: F) -> Submission
where
    B: Backend,
    F: FnMut(&mut B, usize, usize),
{
    let mut cap = backend.n_batch().clamp(1, TAIL_CAP_MAX);
    let mut start = 0;
    while start < batch.len() {
        let len = cap.min(batch.len() - start);
        let status = backend.decode(batch.view(start, len));
        if status == 0 {
            on_window(backend, start, len);
            start += len;
            continue;
        }
        if status > 0 && cap > 1 {
            cap = (cap / 2).max(1);
            *cache_misses += 1;
            continue;
        }
        if status > 0 {
            return Submission::Stalled { decoded: start };
        }
        return Submission::Fatal { status };
    }
    Submission::Complete
}
