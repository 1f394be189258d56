//! HTTP client for the Notion AI inference endpoint.
//!
//! Builds the `runInferenceTranscript` payload from a flattened conversation,
//! sends it with browser-like headers and exposes the NDJSON response body as a
//! stream of lines.

use crate::config::{ProxyConfig, UpstreamConfig};
use crate::error::{ProxyError, Result};
use crate::translate::request::{Turn, TurnRole};

use bytes::{Bytes, BytesMut};
use chrono::{SecondsFormat, Utc};
use futures::stream::{Stream, StreamExt};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde_json::{json, Map, Value};
use std::pin::Pin;
use tracing::{info, warn};
use uuid::Uuid;

const INFERENCE_PATH: &str = "/api/v3/runInferenceTranscript";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
/// Longest NDJSON line kept; longer lines are dropped.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Thread-config switches sent with every inference request.
const THREAD_FLAGS: &[(&str, bool)] = &[
    ("modelFromUser", true),
    ("useWebSearch", true),
    ("useReadOnlyMode", false),
    ("writerMode", false),
    ("isCustomAgent", false),
    ("isCustomAgentBuilder", false),
    ("useCustomAgentDraft", false),
    ("enableAgentAutomations", false),
    ("enableAgentIntegrations", false),
    ("enableBackgroundAgents", false),
    ("enableCustomAgents", false),
    ("enableExperimentalIntegrations", false),
    ("enableAgentViewNotificationsTool", false),
    ("enableAgentRevertTool", false),
    ("enableAgentDiffs", false),
    ("enableAgentCreateDbTemplate", false),
    ("enableCsvAttachmentSupport", true),
    ("enableDatabaseAgents", false),
    ("enableAgentThreadTools", false),
    ("enableRunAgentTool", false),
    ("enableAgentDashboards", false),
    ("enableAgentCardCustomization", true),
    ("enableSystemPromptAsPage", false),
    ("enableUserSessionContext", false),
    ("enableComputer", false),
    ("enableScriptAgent", false),
    ("enableAgentGenerateImage", false),
    ("enableAgentTodos", false),
    ("enableSpeculativeSearch", false),
    ("enableQueryCalendar", false),
    ("enableQueryMail", false),
    ("enableUpdatePageV2Tool", true),
    ("enableUpdatePageAutofixer", true),
    ("enableUpdateAgentV2Tools", true),
    ("enableUpdatePageMarkdownTree", false),
    ("enableUpdatePageTreeDiff", false),
    ("enableUpdatePageOrderUpdates", true),
    ("enableUpdatePageTreeDiffMetrics", false),
];

/// Lines of one upstream response body, in arrival order.
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: String,
    headers: HeaderMap,
    settings: UpstreamConfig,
}

impl UpstreamClient {
    /// `cookie` is the full `Cookie` header value.
    pub fn new(config: &ProxyConfig, cookie: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .pool_max_idle_per_host(100)
            .build()?;

        Ok(Self {
            client,
            base_url: config.upstream.base_url.trim_end_matches('/').to_string(),
            headers: request_headers(&config.upstream, cookie)?,
            settings: config.upstream.clone(),
        })
    }

    pub fn inference_url(&self) -> String {
        format!("{}{}", self.base_url, INFERENCE_PATH)
    }

    /// Best-effort page load so the session looks like a browser's. Never fails.
    pub async fn warmup(&self) {
        let mut headers = self.headers.clone();
        headers.remove(header::ACCEPT);

        match self
            .client
            .get(format!("{}/", self.base_url))
            .headers(headers)
            .send()
            .await
        {
            Ok(resp) => info!(status = resp.status().as_u16(), "Session warm-up done"),
            Err(e) => warn!(error = %e, "Session warm-up failed"),
        }
    }

    /// Start an inference run and return its body as NDJSON lines.
    pub async fn run_inference(&self, upstream_model: &str, turns: &[Turn]) -> Result<LineStream> {
        let thread_id = Uuid::new_v4().to_string();
        let payload = transcript_payload(&self.settings, upstream_model, turns, &thread_id);
        let url = self.inference_url();

        info!(
            url = %url,
            model = upstream_model,
            thread_type = thread_type(upstream_model),
            turns = turns.len(),
            "POST inference"
        );

        let response = self
            .client
            .post(&url)
            .headers(self.headers.clone())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %truncate(&body, 500), "Upstream rejected inference");
            return Err(ProxyError::UpstreamStatus {
                status: status.as_u16(),
                body: truncate(&body, 500).to_string(),
            });
        }

        Ok(Box::pin(ndjson_lines(response.bytes_stream())))
    }
}

/// Vertex-hosted models answer in markdown-chat threads, everything else in workflow threads.
pub fn thread_type(upstream_model: &str) -> &'static str {
    if upstream_model.starts_with("vertex-") {
        "markdown-chat"
    } else {
        "workflow"
    }
}

fn request_headers(settings: &UpstreamConfig, cookie: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/x-ndjson"));
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    headers.insert(header::ORIGIN, HeaderValue::from_static("https://www.notion.so"));
    headers.insert(header::REFERER, HeaderValue::from_static("https://www.notion.so/"));
    headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));

    let dynamic = [
        ("cookie", cookie),
        ("x-notion-space-id", settings.space_id.as_str()),
        ("x-notion-active-user-header", settings.user_id.as_str()),
        ("x-notion-client-version", settings.client_version.as_str()),
        ("notion-audit-log-platform", "web"),
    ];
    for (name, value) in dynamic {
        let value = HeaderValue::from_str(value)
            .map_err(|e| ProxyError::config(format!("Invalid value for header {name}: {e}")))?;
        headers.insert(HeaderName::from_static(name), value);
    }

    Ok(headers)
}

/// The JSON body of one `runInferenceTranscript` call.
pub fn transcript_payload(
    settings: &UpstreamConfig,
    upstream_model: &str,
    turns: &[Turn],
    thread_id: &str,
) -> Value {
    let thread_type = thread_type(upstream_model);
    let now = Utc::now();

    let mut config = Map::new();
    config.insert("type".into(), json!(thread_type));
    config.insert("model".into(), json!(upstream_model));
    for (flag, enabled) in THREAD_FLAGS {
        config.insert((*flag).into(), json!(enabled));
    }
    config.insert("availableConnectors".into(), json!([]));
    config.insert("searchScopes".into(), json!([{"type": "everything"}]));

    let mut transcript = vec![
        json!({"id": Uuid::new_v4().to_string(), "type": "config", "value": config}),
        json!({
            "id": Uuid::new_v4().to_string(),
            "type": "context",
            "value": {
                "timezone": settings.timezone,
                "userName": settings.user_name,
                "userId": settings.user_id,
                "userEmail": settings.user_email,
                "spaceName": format!("{}'s Workspace", settings.user_name),
                "spaceId": settings.space_id,
                "currentDatetime": now.to_rfc3339_opts(SecondsFormat::Nanos, true),
                "surface": "ai_module",
            }
        }),
    ];

    transcript.extend(turns.iter().map(|turn| match turn.role {
        TurnRole::User => json!({
            "id": Uuid::new_v4().to_string(),
            "type": "user",
            "value": [[turn.text]],
            "userId": settings.user_id,
            "createdAt": now.to_rfc3339_opts(SecondsFormat::Secs, true),
        }),
        TurnRole::Assistant => json!({
            "id": Uuid::new_v4().to_string(),
            "type": "agent-inference",
            "value": [{"type": "text", "content": turn.text}],
        }),
    }));

    json!({
        "traceId": Uuid::new_v4().to_string(),
        "spaceId": settings.space_id,
        "transcript": transcript,
        "threadId": thread_id,
        "threadParentPointer": {
            "table": "space",
            "id": settings.space_id,
            "spaceId": settings.space_id,
        },
        "createThread": true,
        "isPartialTranscript": false,
        "asPatchResponse": false,
        "generateTitle": true,
        "saveAllThreadOperations": true,
        "threadType": thread_type,
        "isUserInAnySalesAssistedSpace": false,
        "isSpaceSalesAssisted": false,
        "debugOverrides": {
            "emitAgentSearchExtractedResults": true,
            "cachedInferences": {},
            "annotationInferences": {},
            "emitInferences": false,
        },
    })
}

/// Split a response byte stream into lines. Chunk boundaries may fall anywhere,
/// including inside a multi-byte character; a body read error ends the stream.
pub fn ndjson_lines<S>(byte_stream: S) -> impl Stream<Item = Result<String>> + Send + 'static
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send + 'static,
{
    async_stream::stream! {
        let mut buffer = BytesMut::new();
        // Bytes of `buffer` already known to hold no newline.
        let mut scanned = 0usize;
        // Set while skipping the remainder of an oversized line.
        let mut discarding = false;

        tokio::pin!(byte_stream);

        while let Some(chunk) = byte_stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    warn!(error = %e, "Upstream body read failed");
                    yield Err(ProxyError::Http(e));
                    return;
                }
            };
            buffer.extend_from_slice(&chunk);

            while let Some(offset) = buffer[scanned..].iter().position(|b| *b == b'\n') {
                let pos = scanned + offset;
                let line = buffer.split_to(pos + 1);
                scanned = 0;
                if discarding {
                    discarding = false;
                    continue;
                }
                if pos > MAX_LINE_BYTES {
                    warn!(bytes = pos, "Dropping oversized upstream line");
                    continue;
                }
                yield Ok(decode_line(&line[..pos]));
            }
            scanned = buffer.len();

            if buffer.len() > MAX_LINE_BYTES {
                warn!(bytes = buffer.len(), "Dropping oversized upstream line");
                buffer.clear();
                scanned = 0;
                discarding = true;
            }
        }

        if !buffer.is_empty() && !discarding {
            yield Ok(decode_line(&buffer));
        }
    }
}

fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\r')
        .to_string()
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> UpstreamConfig {
        UpstreamConfig {
            base_url: "http://localhost".to_string(),
            cookie_env: "NOTION_COOKIE".to_string(),
            space_id: "space-1".to_string(),
            user_id: "user-1".to_string(),
            user_name: "Ada".to_string(),
            user_email: "ada@example.com".to_string(),
            client_version: "1.0".to_string(),
            timezone: "UTC".to_string(),
        }
    }

    fn collect_lines(chunks: Vec<&'static [u8]>) -> Vec<String> {
        let stream = futures::stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<Bytes, reqwest::Error>(Bytes::from_static(c))),
        );
        tokio_test::block_on(
            ndjson_lines(stream)
                .map(|line| line.unwrap())
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn test_lines_split_across_chunks() {
        let lines = collect_lines(vec![&b"{\"a\":1}\n{\"b\""[..], &b":2}\r\n\n{\"c\":3}"[..]]);
        assert_eq!(lines, vec!["{\"a\":1}", "{\"b\":2}", "", "{\"c\":3}"]);
    }

    #[test]
    fn test_multibyte_char_split_between_chunks() {
        // "é" is 0xC3 0xA9
        let lines = collect_lines(vec![&b"caf\xC3"[..], &b"\xA9\n"[..]]);
        assert_eq!(lines, vec!["café"]);
    }

    #[test]
    fn test_oversized_line_in_one_chunk_is_dropped() {
        let mut chunk = vec![b'x'; MAX_LINE_BYTES + 10];
        chunk.extend_from_slice(b"\n{\"a\":1}\n");
        let stream = futures::stream::iter(vec![Ok::<Bytes, reqwest::Error>(Bytes::from(chunk))]);

        let lines: Vec<String> = tokio_test::block_on(
            ndjson_lines(stream)
                .map(|line| line.unwrap())
                .collect::<Vec<_>>(),
        );
        assert_eq!(lines, vec!["{\"a\":1}"]);
    }

    #[test]
    fn test_oversized_line_across_chunks_is_dropped() {
        let chunks = vec![
            Bytes::from(b"{\"a\":1}\n".to_vec()),
            Bytes::from(vec![b'x'; MAX_LINE_BYTES / 2 + 1]),
            Bytes::from(vec![b'x'; MAX_LINE_BYTES / 2 + 1]),
            Bytes::from(b"xxx\n{\"b\":2}".to_vec()),
        ];
        let stream = futures::stream::iter(chunks.into_iter().map(Ok::<Bytes, reqwest::Error>));

        let lines: Vec<String> = tokio_test::block_on(
            ndjson_lines(stream)
                .map(|line| line.unwrap())
                .collect::<Vec<_>>(),
        );
        assert_eq!(lines, vec!["{\"a\":1}", "{\"b\":2}"]);
    }

    #[test]
    fn test_line_at_limit_is_kept() {
        let mut chunk = vec![b'x'; MAX_LINE_BYTES];
        chunk.push(b'\n');
        let stream = futures::stream::iter(vec![Ok::<Bytes, reqwest::Error>(Bytes::from(chunk))]);

        let lines: Vec<String> = tokio_test::block_on(
            ndjson_lines(stream)
                .map(|line| line.unwrap())
                .collect::<Vec<_>>(),
        );
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), MAX_LINE_BYTES);
    }

    #[test]
    fn test_thread_type() {
        assert_eq!(thread_type("vertex-gemini-2.5-pro"), "markdown-chat");
        assert_eq!(thread_type("anthropic-sonnet-alt"), "workflow");
    }

    #[test]
    fn test_transcript_payload() {
        let turns = vec![
            Turn {
                role: TurnRole::User,
                text: "hi".to_string(),
            },
            Turn {
                role: TurnRole::Assistant,
                text: "hello".to_string(),
            },
        ];
        let payload = transcript_payload(&settings(), "openai-turbo", &turns, "thread-1");

        assert_eq!(payload["threadId"], "thread-1");
        assert_eq!(payload["threadType"], "workflow");
        assert_eq!(payload["createThread"], true);

        let transcript = payload["transcript"].as_array().unwrap();
        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript[0]["type"], "config");
        assert_eq!(transcript[0]["value"]["model"], "openai-turbo");
        assert_eq!(transcript[0]["value"]["useWebSearch"], true);
        assert_eq!(transcript[1]["value"]["spaceName"], "Ada's Workspace");
        assert_eq!(transcript[2]["type"], "user");
        assert_eq!(transcript[2]["value"], serde_json::json!([["hi"]]));
        assert_eq!(transcript[3]["type"], "agent-inference");
        assert_eq!(transcript[3]["value"][0]["content"], "hello");
    }

    #[test]
    fn test_request_headers() {
        let headers = request_headers(&settings(), "token_v2=abc").unwrap();
        assert_eq!(headers[header::COOKIE], "token_v2=abc");
        assert_eq!(headers["x-notion-space-id"], "space-1");
        assert_eq!(headers[header::ACCEPT], "application/x-ndjson");
        assert!(request_headers(&settings(), "bad\nvalue").is_err());
    }
}
