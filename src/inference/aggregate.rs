//! Reduction of a request's fragment sequence to one answer.

use super::Fragment;
use crate::error::{ProxyError, Result};

/// Single-pass reducer over the fragments of one request.
///
/// A `Final` fragment outranks any amount of incremental text regardless of
/// arrival order; among several `Final`s the last one seen wins.
#[derive(Debug, Default)]
pub struct ResponseAggregator {
    incremental: Vec<String>,
    final_text: Option<String>,
}

impl ResponseAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one fragment. An `Error` fragment is returned as `Err` and the
    /// caller must stop feeding the aggregator.
    pub fn push(&mut self, fragment: Fragment) -> Result<()> {
        match fragment {
            Fragment::Incremental(text) => self.incremental.push(text),
            Fragment::Final(text) => self.final_text = Some(text),
            Fragment::Error { message, .. } => return Err(ProxyError::quota(message)),
        }
        Ok(())
    }

    pub fn has_final(&self) -> bool {
        self.final_text.is_some()
    }

    pub fn fragment_count(&self) -> usize {
        self.incremental.len()
    }

    /// The answer text, or [`ProxyError::EmptyAnswer`] when nothing usable arrived.
    pub fn finish(self) -> Result<String> {
        if let Some(text) = self.final_text.filter(|t| !t.is_empty()) {
            return Ok(text);
        }
        let joined = self.incremental.concat();
        if joined.is_empty() {
            return Err(ProxyError::EmptyAnswer);
        }
        Ok(joined)
    }
}
