//! Message adapter: inbound chat records to canonical messages.
//!
//! Callers send loosely shaped `{role, content}` records. Every record must
//! carry both fields; only `user` and `assistant` turns take part in the
//! conversation, and the last of those is the message being answered.

use agentloop_core::error::InputError;
use agentloop_core::message::Message;
use serde::{Deserialize, Serialize};

/// One inbound chat entry, as received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl RawMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
            content: Some(content.into()),
        }
    }
}

/// A request split into prior history and the current input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turns {
    pub history: Vec<Message>,
    pub input: String,
}

/// Validate and convert every record, keeping unknown roles.
pub fn normalize(raw: &[RawMessage]) -> Result<Vec<Message>, InputError> {
    if raw.is_empty() {
        return Err(InputError::EmptyConversation);
    }

    raw.iter()
        .enumerate()
        .map(|(index, record)| {
            let role = record
                .role
                .as_deref()
                .ok_or(InputError::MissingRole { index })?;
            let content = record
                .content
                .as_deref()
                .ok_or(InputError::MissingContent { index })?;
            Ok(Message::new(role, content))
        })
        .collect()
}

/// Keep the user/assistant dialogue and split off its last entry.
pub fn split_turns(messages: Vec<Message>) -> Result<Turns, InputError> {
    let mut dialogue: Vec<Message> = messages
        .into_iter()
        .filter(|m| m.role().is_conversational())
        .collect();

    let last = dialogue.pop().ok_or(InputError::NoConversationalTurns)?;
    Ok(Turns {
        history: dialogue,
        input: last.content().to_string(),
    })
}

/// [`normalize`] then [`split_turns`].
pub fn adapt(raw: &[RawMessage]) -> Result<Turns, InputError> {
    split_turns(normalize(raw)?)
}
