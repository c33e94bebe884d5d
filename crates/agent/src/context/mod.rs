//! Conversation context handed to the reasoning engine.
//!
//! Prior turns are held in a [`MemoryBuffer`] and trimmed to a token budget,
//! oldest first, before each request.

pub mod memory;
pub mod token;

pub use memory::MemoryBuffer;
