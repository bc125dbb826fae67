//! Token and sequence identifiers.

/// A vocabulary token id, as reported by the runtime.
pub type Token = i32;

/// A logical stream identifier inside the KV memory.
///
/// Unrelated to any transport-level sequence number. Id 0 is reserved by the
/// scheduler for the shared prompt prefix.
pub type SeqId = i32;

/// Sentinel returned by [`Vocab`](crate::Vocab) accessors when the model has
/// no such special token.
pub const TOKEN_NONE: Token = -1;
