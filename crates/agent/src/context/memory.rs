//! Token-bounded conversation memory.
//!
//! The buffer holds no state between requests. [`MemoryBuffer::trim`] fits a
//! history into the budget, and [`MemoryBuffer::record`] builds the history a
//! caller should send with its next request.

use agentloop_config::MemoryConfig;
use agentloop_core::agent::IntermediateStep;
use agentloop_core::message::{Message, Role};
use tracing::debug;

use super::token::estimate_message_tokens;

/// Role given to recorded tool observations.
pub const FUNCTION_ROLE: &str = "function";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryBuffer {
    max_tokens: usize,
    max_messages: Option<usize>,
}

impl MemoryBuffer {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            max_messages: None,
        }
    }

    pub fn from_config(config: &MemoryConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            max_messages: config.max_messages,
        }
    }

    pub fn with_max_messages(mut self, max: usize) -> Self {
        self.max_messages = Some(max);
        self
    }

    /// Keep the newest run of messages that fits the budget.
    ///
    /// Walks from the newest message back and stops at the first one that no
    /// longer fits, so the result is always a contiguous suffix. A message
    /// bigger than the whole budget therefore ends the walk.
    pub fn trim(&self, history: &[Message]) -> Vec<Message> {
        let max_messages = self.max_messages.unwrap_or(usize::MAX);
        let mut used = 0;
        let mut keep = 0;

        for message in history.iter().rev() {
            let cost = estimate_message_tokens(message);
            if keep == max_messages || used + cost > self.max_tokens {
                break;
            }
            used += cost;
            keep += 1;
        }

        let dropped = history.len() - keep;
        if dropped > 0 {
            debug!(dropped, kept = keep, tokens = used, "Trimmed conversation history");
        }
        history[dropped..].to_vec()
    }

    /// History for the next request: the prior turns, this input, one
    /// `function` message per tool observation, and the answer, trimmed.
    pub fn record(
        &self,
        history: &[Message],
        input: &str,
        steps: &[IntermediateStep],
        final_output: &str,
    ) -> Vec<Message> {
        let mut next = Vec::with_capacity(history.len() + steps.len() + 2);
        next.extend_from_slice(history);
        next.push(Message::user(input));
        next.extend(
            steps
                .iter()
                .map(|s| Message::new(Role::Other(FUNCTION_ROLE.into()), s.result.output.clone())),
        );
        next.push(Message::assistant(final_output));
        self.trim(&next)
    }
}

impl Default for MemoryBuffer {
    fn default() -> Self {
        Self::from_config(&MemoryConfig::default())
    }
}
