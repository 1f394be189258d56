//! Client-facing API formats.
//!
//! Wire types for the OpenAI and Anthropic protocols, flattening of their
//! requests, and the documents and event bursts a finished answer is rendered
//! into. All translation functions are pure (no I/O).

pub mod anthropic_types;
pub mod openai_types;
pub mod request;
pub mod response;
pub mod streaming;

/// Client protocol a request arrived on; decides every output shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    OpenAi,
    Anthropic,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::OpenAi => "openai",
            Protocol::Anthropic => "anthropic",
        }
    }
}
