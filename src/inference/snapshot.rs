//! Selection of the latest answer from a `record-map` snapshot.

use super::events::{ThreadMessageRecord, AGENT_INFERENCE_TAG, MARKDOWN_CHAT_TAG, TEXT_TAG};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepType {
    AgentInference,
    MarkdownChat,
}

impl StepType {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            AGENT_INFERENCE_TAG => Some(Self::AgentInference),
            MARKDOWN_CHAT_TAG => Some(Self::MarkdownChat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotMessage {
    pub step_type: StepType,
    pub created_time: f64,
    pub text: String,
}

/// Decode one `thread_message` entry. Entries with an unrecognised step type,
/// an undecodable shape or no text yield `None`.
pub fn extract_message(raw: &Value) -> Option<SnapshotMessage> {
    let record: ThreadMessageRecord = serde_json::from_value(raw.clone()).ok()?;
    let message = record.into_message()?;
    let step = message.step?;
    let step_type = StepType::from_tag(&step.step_type)?;

    let text = match step_type {
        StepType::MarkdownChat => step.value.as_str().unwrap_or_default().to_string(),
        // The first text item decides, even when its content is missing.
        StepType::AgentInference => step
            .value
            .as_array()
            .and_then(|items| {
                items
                    .iter()
                    .find(|item| item.get("type").and_then(Value::as_str) == Some(TEXT_TAG))
            })
            .and_then(|item| item.get("content"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    };

    if text.is_empty() {
        return None;
    }

    Some(SnapshotMessage {
        step_type,
        created_time: message.created_time.unwrap_or_default(),
        text,
    })
}

/// Pick the message with the greatest `created_time`.
///
/// Entries are visited in ascending message-id order; on equal timestamps the
/// later-visited entry wins.
pub fn select_latest(thread_messages: &BTreeMap<String, Value>) -> Option<SnapshotMessage> {
    thread_messages
        .values()
        .filter_map(extract_message)
        .fold(None, |best: Option<SnapshotMessage>, candidate| match best {
            Some(current) if candidate.created_time < current.created_time => Some(current),
            _ => Some(candidate),
        })
}
