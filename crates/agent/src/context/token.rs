//! Token estimation utilities.
//!
//! Character heuristic: ~4 characters per token, rounded up, plus a fixed
//! per-message overhead for the role and delimiters on the wire.

use agentloop_core::message::Message;

pub const MESSAGE_OVERHEAD: usize = 4;

/// Estimate the token count for a string.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Estimate tokens for a single message including per-message overhead.
pub fn estimate_message_tokens(message: &Message) -> usize {
    MESSAGE_OVERHEAD + estimate_tokens(message.content())
}
