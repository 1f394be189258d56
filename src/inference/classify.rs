//! Classification of single upstream NDJSON lines into [`Fragment`]s.

use super::events::{RawPatchOp, RecordMap, UpstreamEvent};
use super::patch::{self, PatchOp};
use super::snapshot;
use super::{Fragment, FragmentErrorKind};
use serde_json::Value;
use tracing::{debug, warn};

const MAX_LOGGED_LINE: usize = 200;

/// Classify one raw line. Blank lines, malformed JSON and unrecognised records
/// yield no fragments; nothing here fails the request.
pub fn classify_line(line: &str) -> Vec<Fragment> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }

    let raw: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, line = %truncate(line, MAX_LOGGED_LINE), "Skipping malformed upstream line");
            return Vec::new();
        }
    };

    match serde_json::from_value::<UpstreamEvent>(raw) {
        Ok(event) => classify_event(event),
        Err(e) => {
            debug!(error = %e, "Upstream record has no recognised shape");
            Vec::new()
        }
    }
}

/// Produce the fragments carried by one decoded event, in discovery order.
pub fn classify_event(event: UpstreamEvent) -> Vec<Fragment> {
    match event {
        UpstreamEvent::FeatureUnavailable {
            feature_availability,
        } => vec![quota_fragment(feature_availability.as_ref())],
        UpstreamEvent::MarkdownChat { value } => value
            .as_ref()
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(|text| {
                debug!(chars = text.len(), "Full answer from markdown-chat event");
                vec![Fragment::Final(text.to_string())]
            })
            .unwrap_or_default(),
        UpstreamEvent::Patch { v } => v
            .into_iter()
            .filter_map(|raw| serde_json::from_value::<RawPatchOp>(raw).ok())
            .flat_map(|raw| patch::interpret(&PatchOp::from(raw)))
            .inspect(|fragment| debug!(?fragment, "Fragment from patch operation"))
            .collect(),
        UpstreamEvent::RecordMap { record_map } => record_map
            .as_ref()
            .and_then(|RecordMap { thread_message }| snapshot::select_latest(thread_message))
            .map(|message| {
                debug!(
                    created_time = message.created_time,
                    "Final answer from record-map snapshot"
                );
                vec![Fragment::Final(message.text)]
            })
            .unwrap_or_default(),
        UpstreamEvent::Other => Vec::new(),
    }
}

fn quota_fragment(feature_availability: Option<&Value>) -> Fragment {
    let limit = feature_availability.and_then(|fa| fa.get("limit"));
    let current = limit.and_then(|l| l.get("current")).and_then(Value::as_f64);
    let total = limit.and_then(|l| l.get("total")).and_then(Value::as_f64);

    let fragment = match (current, total) {
        (Some(current), Some(total)) => Fragment::Error {
            message: format!(
                "Notion AI quota exhausted ({}/{}); upgrade the workspace plan or wait for the quota to reset",
                current as i64, total as i64
            ),
            kind: FragmentErrorKind::QuotaExhausted,
        },
        _ => Fragment::Error {
            message: "Notion AI is unavailable for this workspace; the quota may be exhausted or the plan may need an upgrade".to_string(),
            kind: FragmentErrorKind::FeatureUnavailable,
        },
    };
    warn!(?fragment, "Upstream reported feature unavailable");
    fragment
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
