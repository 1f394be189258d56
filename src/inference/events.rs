//! Wire types for the upstream `runInferenceTranscript` NDJSON stream.
//!
//! Every line is an object discriminated by its `type` field. Only the four
//! shapes below carry answer text or a terminal condition; every other tag
//! decodes to [`UpstreamEvent::Other`]. Fields inside a known variant are all
//! optional so that schema drift degrades to "no fragment" instead of a decode
//! failure for the whole line.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Full-markdown answer, both as a top-level tag and as an inner value tag.
pub const MARKDOWN_CHAT_TAG: &str = "markdown-chat";
/// Inner discriminator of a plain-text value item.
pub const TEXT_TAG: &str = "text";
/// Step type of an agent answer inside a snapshot.
pub const AGENT_INFERENCE_TAG: &str = "agent-inference";

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum UpstreamEvent {
    #[serde(rename = "premium-feature-unavailable")]
    FeatureUnavailable {
        #[serde(default, rename = "featureAvailability")]
        feature_availability: Option<Value>,
    },
    #[serde(rename = "markdown-chat")]
    MarkdownChat {
        #[serde(default)]
        value: Option<Value>,
    },
    #[serde(rename = "patch")]
    Patch {
        /// Raw operations; each is decoded on its own so one odd entry
        /// does not hide its siblings.
        #[serde(default)]
        v: Vec<Value>,
    },
    #[serde(rename = "record-map")]
    RecordMap {
        #[serde(default, rename = "recordMap")]
        record_map: Option<RecordMap>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordMap {
    /// Keyed by message id. A `BTreeMap` gives the lexicographic visiting
    /// order the snapshot tie-break relies on.
    #[serde(default)]
    pub thread_message: BTreeMap<String, Value>,
}

/// One patch operation, `{o, p, v}` on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPatchOp {
    #[serde(default)]
    pub o: String,
    #[serde(default)]
    pub p: String,
    #[serde(default)]
    pub v: Value,
}

/// `thread_message[id]`: `{ value: { value: { created_time, step } } }`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreadMessageRecord {
    #[serde(default)]
    pub value: Option<ThreadMessageEnvelope>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreadMessageEnvelope {
    #[serde(default)]
    pub value: Option<ThreadMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreadMessage {
    #[serde(default)]
    pub created_time: Option<f64>,
    #[serde(default)]
    pub step: Option<Step>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Step {
    #[serde(default, rename = "type")]
    pub step_type: String,
    #[serde(default)]
    pub value: Value,
}

impl ThreadMessageRecord {
    pub fn into_message(self) -> Option<ThreadMessage> {
        self.value.and_then(|envelope| envelope.value)
    }
}

/// Non-empty string stored under `key` of a JSON object.
pub(crate) fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_tag_is_other() {
        let event: UpstreamEvent =
            serde_json::from_value(json!({"type": "title", "value": "x"})).unwrap();
        assert!(matches!(event, UpstreamEvent::Other));
    }

    #[test]
    fn test_missing_tag_fails_to_decode() {
        assert!(serde_json::from_value::<UpstreamEvent>(json!({"value": "x"})).is_err());
    }

    #[test]
    fn test_quota_shape() {
        let event: UpstreamEvent = serde_json::from_value(json!({
            "type": "premium-feature-unavailable",
            "featureAvailability": {"limit": {"current": 5, "total": 5}}
        }))
        .unwrap();

        let UpstreamEvent::FeatureUnavailable {
            feature_availability: Some(availability),
        } = event
        else {
            panic!("expected quota event");
        };
        assert_eq!(availability["limit"]["current"], 5);
    }

    #[test]
    fn test_record_map_orders_ids() {
        let event: UpstreamEvent = serde_json::from_value(json!({
            "type": "record-map",
            "recordMap": {"thread_message": {"b": {}, "a": {}, "c": {}}}
        }))
        .unwrap();

        let UpstreamEvent::RecordMap {
            record_map: Some(map),
        } = event
        else {
            panic!("expected record map");
        };
        let ids: Vec<&str> = map.thread_message.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
