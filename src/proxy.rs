use crate::error::{ProxyError, Result};
use crate::inference::{classify_line, NormalizedAnswer, ResponseAggregator};
use crate::translate::request::Turn;
use crate::translate::streaming::{anthropic_events, openai_chunks, OPENAI_DONE};
use crate::translate::Protocol;
use crate::upstream::UpstreamClient;

use futures::stream::{Stream, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// One server-sent event, already rendered for the client protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Named event type; OpenAI streams use unnamed `data:` events.
    pub event: Option<&'static str>,
    pub data: String,
}

impl SseEvent {
    fn data(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
        }
    }
}

/// Drain the upstream lines into a single answer.
///
/// Stops early on a quota signal or when `cancel` fires; dropping the line
/// stream releases the upstream connection.
pub async fn collect_answer<S>(lines: S, cancel: &CancellationToken) -> Result<NormalizedAnswer>
where
    S: Stream<Item = Result<String>>,
{
    tokio::pin!(lines);
    let mut aggregator = ResponseAggregator::new();
    let mut line_count = 0usize;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(lines = line_count, "Inference cancelled");
                return Err(ProxyError::Cancelled);
            }
            next = lines.next() => next,
        };
        let Some(line) = next else { break };
        let line = line?;
        line_count += 1;

        for fragment in classify_line(&line) {
            aggregator.push(fragment)?;
        }
    }

    debug!(
        lines = line_count,
        fragments = aggregator.fragment_count(),
        has_final = aggregator.has_final(),
        "Upstream stream exhausted"
    );

    let answer = NormalizedAnswer::new(aggregator.finish()?);
    info!(
        raw_chars = answer.raw_text.chars().count(),
        chars = answer.output_chars(),
        "Answer ready"
    );
    Ok(answer)
}

/// Run one inference to completion for a non-streaming response.
pub async fn complete(
    upstream: &UpstreamClient,
    upstream_model: &str,
    turns: &[Turn],
    cancel: &CancellationToken,
) -> Result<NormalizedAnswer> {
    let lines = upstream.run_inference(upstream_model, turns).await?;
    collect_answer(lines, cancel).await
}

/// Render a finished answer as the protocol's streaming burst.
///
/// Every event is serialized before any is returned, so a failure surfaces as
/// an error while the response status can still be set.
pub fn render_answer(
    protocol: Protocol,
    answer: &NormalizedAnswer,
    model: &str,
) -> Result<Vec<SseEvent>> {
    let events = match protocol {
        Protocol::OpenAi => {
            let mut events = openai_chunks(answer, model)
                .iter()
                .map(|chunk| to_json(chunk).map(SseEvent::data))
                .collect::<Result<Vec<_>>>()?;
            events.push(SseEvent::data(OPENAI_DONE));
            events
        }
        Protocol::Anthropic => anthropic_events(answer, model)
            .iter()
            .map(|event| {
                to_json(event).map(|data| SseEvent {
                    event: Some(event.event_name()),
                    data,
                })
            })
            .collect::<Result<Vec<_>>>()?,
    };
    Ok(events)
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}
