//! Normalisation of the upstream inference stream.
//!
//! Upstream lines are classified into [`Fragment`]s ([`classify`]), reduced to a
//! single answer ([`aggregate`]) and cleaned of model-internal markup
//! ([`sanitize`]). All functions here are pure; I/O lives in `upstream` and `proxy`.

pub mod aggregate;
pub mod classify;
pub mod events;
pub mod patch;
pub mod sanitize;
pub mod snapshot;

pub use aggregate::ResponseAggregator;
pub use classify::classify_line;
pub use sanitize::sanitize;

/// One unit of answer text or a terminal signal extracted from the upstream stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// A piece of an answer still being produced.
    Incremental(String),
    /// A complete, authoritative answer.
    Final(String),
    /// Terminal condition reported by the upstream.
    Error { message: String, kind: FragmentErrorKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentErrorKind {
    /// The upstream reported usage numbers for an exhausted quota.
    QuotaExhausted,
    /// The feature is unavailable without further detail.
    FeatureUnavailable,
}

/// The reduced answer for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedAnswer {
    pub raw_text: String,
    pub sanitized_text: String,
}

impl NormalizedAnswer {
    pub fn new(raw_text: String) -> Self {
        let sanitized_text = sanitize(&raw_text);
        Self {
            raw_text,
            sanitized_text,
        }
    }

    /// Output size reported to clients: characters, not tokens.
    pub fn output_chars(&self) -> u64 {
        self.sanitized_text.chars().count() as u64
    }
}
