//! KV memory controller surface.
//!
//! The context's KV memory maps `(sequence id, position)` to cached
//! key/value rows. The scheduler is its sole mutator for the duration of a
//! call and only ever touches it through these three operations.

use crate::token::SeqId;

/// Mutation surface of the runtime's KV memory.
///
/// All operations must be idempotent when the addressed region is already
/// empty, and must never leave the memory in a state a later decode could
/// observe as inconsistent.
pub trait KvMemory {
    /// Drop every cached row for every sequence id.
    fn clear(&mut self);

    /// Make `dst`'s rows in `[p0, p1)` alias or duplicate `src`'s, so a
    /// subsequent decode under `dst` continues from position `p1`.
    /// `p0 = -1, p1 = -1` selects the whole of `src`.
    fn seq_copy(&mut self, src: SeqId, dst: SeqId, p0: i32, p1: i32);

    /// Drop `seq`'s rows in `[p0, p1)` and free their slots.
    /// `p0 = 0, p1 = -1` drops everything the sequence holds.
    fn seq_remove(&mut self, seq: SeqId, p0: i32, p1: i32);
}
