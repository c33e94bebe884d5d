//! Reasoning engine implementations for agentloop.
//!
//! All engines implement the `agentloop_core::ReasoningEngine` trait.

pub mod openai_compat;
#[cfg(any(test, feature = "test-util"))]
pub mod scripted;

pub use openai_compat::OpenAiCompatEngine;
#[cfg(any(test, feature = "test-util"))]
pub use scripted::{ScriptedEngine, SeenRequest};
