//! Streaming renditions of a finished answer.
//!
//! The answer is fully known before anything is emitted, so each protocol gets a
//! short fixed burst rather than per-token deltas: three chunks plus `[DONE]` for
//! OpenAI, six named events for Anthropic.

use super::anthropic_types::{
    Delta, DeltaUsage, MessageDeltaBody, MessagesResponse, ResponseContentBlock, StreamEvent, Usage,
};
use super::openai_types::{ChatCompletionChunk, ChunkChoice, ChunkDelta};
use super::response::{completion_id, message_id, ANTHROPIC_STOP_REASON, OPENAI_FINISH_REASON};
use crate::inference::NormalizedAnswer;

/// Stream terminator of the OpenAI protocol.
pub const OPENAI_DONE: &str = "[DONE]";

/// Role chunk, one content chunk carrying the whole answer, finish chunk.
pub fn openai_chunks(answer: &NormalizedAnswer, model: &str) -> Vec<ChatCompletionChunk> {
    let id = completion_id();
    let created = chrono::Utc::now().timestamp();
    let chunk = |delta: ChunkDelta, finish_reason: Option<&str>| ChatCompletionChunk {
        id: id.clone(),
        object: "chat.completion.chunk".to_string(),
        created,
        model: model.to_string(),
        choices: vec![ChunkChoice {
            index: 0,
            delta,
            finish_reason: finish_reason.map(String::from),
        }],
    };

    vec![
        chunk(
            ChunkDelta {
                role: Some("assistant".to_string()),
                content: None,
            },
            None,
        ),
        chunk(
            ChunkDelta {
                role: None,
                content: Some(answer.sanitized_text.clone()),
            },
            None,
        ),
        chunk(ChunkDelta::default(), Some(OPENAI_FINISH_REASON)),
    ]
}

/// `message_start` through `message_stop` with the answer as a single text delta.
pub fn anthropic_events(answer: &NormalizedAnswer, model: &str) -> Vec<StreamEvent> {
    vec![
        StreamEvent::MessageStart {
            message: MessagesResponse {
                id: message_id(),
                response_type: "message".to_string(),
                role: "assistant".to_string(),
                content: Vec::new(),
                model: model.to_string(),
                stop_reason: None,
                stop_sequence: None,
                usage: Usage::default(),
            },
        },
        StreamEvent::ContentBlockStart {
            index: 0,
            content_block: ResponseContentBlock::Text {
                text: String::new(),
            },
        },
        StreamEvent::ContentBlockDelta {
            index: 0,
            delta: Delta::TextDelta {
                text: answer.sanitized_text.clone(),
            },
        },
        StreamEvent::ContentBlockStop { index: 0 },
        StreamEvent::MessageDelta {
            delta: MessageDeltaBody {
                stop_reason: Some(ANTHROPIC_STOP_REASON.to_string()),
                stop_sequence: None,
            },
            usage: DeltaUsage {
                output_tokens: answer.output_chars(),
            },
        },
        StreamEvent::MessageStop,
    ]
}
