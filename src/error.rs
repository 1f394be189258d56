//! Error types for the proxy.

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProxyError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("{message}")]
    QuotaExceeded { message: String },

    #[error("{message}")]
    Unauthorized { message: String },

    #[error("{message}")]
    Forbidden { message: String },

    #[error("Upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned status {status}")]
    UpstreamStatus { status: u16, body: String },

    #[error("No usable answer received from Notion AI")]
    EmptyAnswer,

    #[error("Request cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ProxyError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: msg.into(),
        }
    }

    pub fn quota(msg: impl Into<String>) -> Self {
        Self::QuotaExceeded {
            message: msg.into(),
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: msg.into(),
        }
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden {
            message: msg.into(),
        }
    }

    /// HTTP status this error is reported with when no response has started yet.
    pub fn status(&self) -> u16 {
        match self {
            Self::InvalidRequest { .. } => 400,
            Self::Unauthorized { .. } => 401,
            Self::QuotaExceeded { .. } => 402,
            Self::Forbidden { .. } => 403,
            Self::Http(e) if e.is_timeout() => 504,
            Self::Http(_) | Self::UpstreamStatus { .. } => 502,
            Self::Cancelled => 503,
            Self::Config { .. }
            | Self::EmptyAnswer
            | Self::Io(_)
            | Self::Json(_)
            | Self::Toml(_) => 500,
        }
    }

    /// Error `type` string in the OpenAI error document.
    pub fn openai_type(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request_error",
            Self::Unauthorized { .. } | Self::Forbidden { .. } => "authentication_error",
            Self::QuotaExceeded { .. } => "insufficient_quota",
            Self::Http(_) | Self::UpstreamStatus { .. } => "upstream_error",
            _ => "internal_server_error",
        }
    }

    /// Error `type` string in the Anthropic error document.
    pub fn anthropic_type(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request_error",
            Self::Unauthorized { .. } | Self::Forbidden { .. } => "authentication_error",
            Self::QuotaExceeded { .. } => "billing_error",
            Self::Cancelled => "overloaded_error",
            _ => "api_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ProxyError::quota("used up").status(), 402);
        assert_eq!(ProxyError::EmptyAnswer.status(), 500);
        assert_eq!(ProxyError::invalid_request("bad").status(), 400);
        assert_eq!(
            ProxyError::UpstreamStatus {
                status: 503,
                body: String::new()
            }
            .status(),
            502
        );
    }

    #[test]
    fn test_quota_message_is_passed_through() {
        let err = ProxyError::quota("Notion AI quota exhausted (5/5)");
        assert_eq!(err.to_string(), "Notion AI quota exhausted (5/5)");
        assert_eq!(err.anthropic_type(), "billing_error");
        assert_eq!(err.openai_type(), "insufficient_quota");
    }
}
