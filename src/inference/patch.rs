//! Interpretation of upstream patch operations.
//!
//! Patch events describe edits to a conceptual transcript document. Different
//! backend families put answer text at different paths, so each known shape has
//! its own predicate below. Paths are matched by suffix/substring only; the
//! upstream schema is undocumented and anything not listed here is ignored.

use super::events::{non_empty_str, RawPatchOp, MARKDOWN_CHAT_TAG, TEXT_TAG};
use super::Fragment;
use serde_json::Value;

/// Slot that receives whole markdown steps (markdown-chat backends).
const STEP_APPEND_SUFFIX: &str = "/s/-";
/// Segment of an in-progress markdown step.
const STEP_SEGMENT: &str = "/s/";
const VALUE_SUFFIX: &str = "/value";
/// Segment of an in-progress agent text item (agent-inference backends).
const VALUE_SEGMENT: &str = "/value/";
const VALUE_APPEND_SUFFIX: &str = "/value/-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOpKind {
    /// Wire code `a`.
    Append,
    /// Wire code `x`.
    Replace,
    Unknown,
}

impl PatchOpKind {
    pub fn from_code(code: &str) -> Self {
        match code {
            "a" => Self::Append,
            "x" => Self::Replace,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PatchOp {
    pub kind: PatchOpKind,
    pub path: String,
    pub value: Value,
}

impl From<RawPatchOp> for PatchOp {
    fn from(raw: RawPatchOp) -> Self {
        Self {
            kind: PatchOpKind::from_code(&raw.o),
            path: raw.p,
            value: raw.v,
        }
    }
}

/// Full markdown answer appended as a new step: `a …/s/-` with
/// `{type: "markdown-chat", value}`.
pub fn markdown_step_append(op: &PatchOp) -> Option<Fragment> {
    if op.kind != PatchOpKind::Append || !op.path.ends_with(STEP_APPEND_SUFFIX) {
        return None;
    }
    if op.value.get("type").and_then(Value::as_str) != Some(MARKDOWN_CHAT_TAG) {
        return None;
    }
    non_empty_str(&op.value, "value").map(|text| Fragment::Final(text.to_string()))
}

/// Incremental text on a markdown step: `x …/s/<n>/value`.
pub fn markdown_step_delta(op: &PatchOp) -> Option<Fragment> {
    if op.kind != PatchOpKind::Replace
        || !op.path.contains(STEP_SEGMENT)
        || !op.path.ends_with(VALUE_SUFFIX)
    {
        return None;
    }
    non_empty_string(&op.value).map(Fragment::Incremental)
}

/// Incremental text on an agent value item: `x …/value/<n>/…`.
pub fn agent_value_delta(op: &PatchOp) -> Option<Fragment> {
    if op.kind != PatchOpKind::Replace || !op.path.contains(VALUE_SEGMENT) {
        return None;
    }
    non_empty_string(&op.value).map(Fragment::Incremental)
}

/// Full text item appended to an agent answer: `a …/value/-` with
/// `{type: "text", content}`.
pub fn agent_text_append(op: &PatchOp) -> Option<Fragment> {
    if op.kind != PatchOpKind::Append || !op.path.ends_with(VALUE_APPEND_SUFFIX) {
        return None;
    }
    if op.value.get("type").and_then(Value::as_str) != Some(TEXT_TAG) {
        return None;
    }
    non_empty_str(&op.value, "content").map(|text| Fragment::Final(text.to_string()))
}

/// Run every dialect predicate against one operation, in a fixed order.
pub fn interpret(op: &PatchOp) -> Vec<Fragment> {
    [
        markdown_step_append(op),
        markdown_step_delta(op),
        agent_value_delta(op),
        agent_text_append(op),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn non_empty_string(value: &Value) -> Option<String> {
    value.as_str().filter(|s| !s.is_empty()).map(str::to_string)
}
