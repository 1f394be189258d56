//! Flatten client requests of either protocol into the plain conversation the
//! upstream transcript is built from.
//!
//! Only user and assistant text survives: system turns are dropped (the upstream
//! has no slot for them) and non-text content parts are ignored.

use super::anthropic_types::{MessagesRequest, Role};
use super::openai_types::ChatCompletionRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

/// Conversation turns of an OpenAI chat request.
pub fn openai_turns(req: &ChatCompletionRequest) -> Vec<Turn> {
    req.messages
        .iter()
        .filter_map(|msg| {
            let role = match msg.role.as_str() {
                "user" => TurnRole::User,
                "assistant" => TurnRole::Assistant,
                other => {
                    tracing::debug!(role = other, "Dropping message with unsupported role");
                    return None;
                }
            };
            let text = msg.content.as_ref().map(|c| c.as_text()).unwrap_or_default();
            Some(Turn { role, text })
        })
        .collect()
}

/// Conversation turns of an Anthropic messages request.
pub fn anthropic_turns(req: &MessagesRequest) -> Vec<Turn> {
    req.messages
        .iter()
        .map(|msg| Turn {
            role: match msg.role {
                Role::User => TurnRole::User,
                Role::Assistant => TurnRole::Assistant,
            },
            text: strip_control(&msg.content.as_text()),
        })
        .collect()
}

/// Claude clients sometimes embed `\x01` markers the upstream rejects.
fn strip_control(text: &str) -> String {
    text.replace('\u{1}', "")
}
