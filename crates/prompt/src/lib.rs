//! # Prompt
//!
//! Assembles role-tagged chat turns for an OpenAI-compatible chat-completion call.
//!
//! ## Format
//!
//! - **System**: one instruction framing the roleplay scenario ([`roleplay_system_prompt`]).
//! - **Conversation**: strictly alternating `user` / `assistant` turns that start with `user`
//!   ([`collapse_turns`]).
//!
//! ## Usage
//!
//! The roleplay crate classifies channel history into turns and calls [`build_roleplay_prompt`];
//! the result goes straight to `llm_client::LlmClient`.

use serde::{Deserialize, Serialize};

/// Role of a message, one-to-one with OpenAI Chat Completions API `role` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instruction (API `role: "system"`).
    System,
    /// User message (API `role: "user"`).
    User,
    /// Assistant message (API `role: "assistant"`).
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// A single chat message, one-to-one with one element of OpenAI `messages` array.
/// Serializes as `{"role": "...", "content": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// System instruction that frames the scenario the user supplied.
pub fn roleplay_system_prompt(scenario: &str) -> String {
    format!(
        "Roleplay the following scenario provided by the user: {scenario}. \
         Engage in the roleplay by responding to their dialogue and actions in character."
    )
}

/// Collapses turns given **newest first** into a chronological, strictly alternating window.
///
/// Of every run of consecutive same-role turns only the most recent is kept. If the oldest
/// surviving turn is `assistant` it is dropped, so the window always opens with `user` (or is
/// empty). System turns in the input are ignored.
pub fn collapse_turns<I>(newest_first: I) -> Vec<ChatMessage>
where
    I: IntoIterator<Item = ChatMessage>,
{
    let mut window: Vec<ChatMessage> = Vec::new();
    for turn in newest_first {
        if turn.role == MessageRole::System {
            continue;
        }
        if window.last().is_some_and(|prev| prev.role == turn.role) {
            continue;
        }
        window.push(turn);
    }
    if window
        .last()
        .is_some_and(|oldest| oldest.role == MessageRole::Assistant)
    {
        window.pop();
    }
    window.reverse();
    window
}

/// Full request for one relay: the scenario system turn followed by the collapsed window.
pub fn build_roleplay_prompt<I>(scenario: &str, newest_first: I) -> Vec<ChatMessage>
where
    I: IntoIterator<Item = ChatMessage>,
{
    let mut messages = vec![ChatMessage::system(roleplay_system_prompt(scenario))];
    messages.extend(collapse_turns(newest_first));
    messages
}
