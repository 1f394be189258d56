//! Single-document responses for both protocols.

use super::anthropic_types::{ErrorResponse, MessagesResponse, ResponseContentBlock, Usage};
use super::openai_types::{
    ChatCompletionResponse, ChatErrorResponse, ChatUsage, Choice, ChoiceMessage,
};
use crate::error::ProxyError;
use crate::inference::NormalizedAnswer;

pub const OPENAI_FINISH_REASON: &str = "stop";
pub const ANTHROPIC_STOP_REASON: &str = "end_turn";

pub fn completion_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4())
}

pub fn message_id() -> String {
    format!("msg_{}", uuid::Uuid::new_v4().to_string().replace('-', ""))
}

/// OpenAI `chat.completion` document. Usage counters are always zero.
pub fn openai_completion(answer: &NormalizedAnswer, model: &str) -> ChatCompletionResponse {
    ChatCompletionResponse {
        id: completion_id(),
        object: "chat.completion".to_string(),
        created: chrono::Utc::now().timestamp(),
        model: model.to_string(),
        choices: vec![Choice {
            index: 0,
            message: ChoiceMessage {
                role: "assistant".to_string(),
                content: answer.sanitized_text.clone(),
            },
            finish_reason: Some(OPENAI_FINISH_REASON.to_string()),
        }],
        usage: ChatUsage::default(),
    }
}

/// Anthropic `message` document. Output "tokens" are the answer's character count.
pub fn anthropic_message(answer: &NormalizedAnswer, model: &str) -> MessagesResponse {
    MessagesResponse {
        id: message_id(),
        response_type: "message".to_string(),
        role: "assistant".to_string(),
        content: vec![ResponseContentBlock::Text {
            text: answer.sanitized_text.clone(),
        }],
        model: model.to_string(),
        stop_reason: Some(ANTHROPIC_STOP_REASON.to_string()),
        stop_sequence: None,
        usage: Usage {
            input_tokens: 0,
            output_tokens: answer.output_chars(),
        },
    }
}

pub fn openai_error(err: &ProxyError) -> ChatErrorResponse {
    ChatErrorResponse::new(err.openai_type(), err.to_string()).with_code(err.status().to_string())
}

pub fn anthropic_error(err: &ProxyError) -> ErrorResponse {
    ErrorResponse::new(err.anthropic_type(), err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(text: &str) -> NormalizedAnswer {
        NormalizedAnswer::new(text.to_string())
    }

    #[test]
    fn test_openai_completion_shape() {
        let resp = openai_completion(&answer("Hello there"), "claude-sonnet-4.5");
        let json = serde_json::to_value(&resp).unwrap();

        assert_eq!(json["object"], "chat.completion");
        assert_eq!(json["model"], "claude-sonnet-4.5");
        assert_eq!(json["choices"].as_array().unwrap().len(), 1);
        assert_eq!(json["choices"][0]["message"]["role"], "assistant");
        assert_eq!(json["choices"][0]["message"]["content"], "Hello there");
        assert_eq!(json["choices"][0]["finish_reason"], "stop");
        assert_eq!(json["usage"]["total_tokens"], 0);
        assert!(resp.id.starts_with("chatcmpl-"));
    }

    #[test]
    fn test_anthropic_message_shape() {
        let resp = anthropic_message(&answer("<thinking>x</thinking>héllo"), "gpt-5");
        let json = serde_json::to_value(&resp).unwrap();

        assert_eq!(json["type"], "message");
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][0]["text"], "héllo");
        assert_eq!(json["stop_reason"], "end_turn");
        assert!(json["stop_sequence"].is_null());
        assert_eq!(json["usage"]["input_tokens"], 0);
        assert_eq!(json["usage"]["output_tokens"], 5);
        assert!(resp.id.starts_with("msg_"));
    }

    #[test]
    fn test_error_documents() {
        let err = ProxyError::quota("quota exhausted (5/5)");

        let openai = serde_json::to_value(openai_error(&err)).unwrap();
        assert_eq!(openai["error"]["type"], "insufficient_quota");
        assert_eq!(openai["error"]["code"], "402");
        assert_eq!(openai["error"]["message"], "quota exhausted (5/5)");

        let anthropic = serde_json::to_value(anthropic_error(&err)).unwrap();
        assert_eq!(anthropic["type"], "error");
        assert_eq!(anthropic["error"]["type"], "billing_error");
    }
}
