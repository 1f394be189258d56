//! Removal of model-internal markup and known preamble noise from answers.
//!
//! New backend-specific noise goes into [`NOISE_PATTERNS`]; the table is applied
//! top to bottom.

use regex::Regex;
use std::sync::LazyLock;

const NOISE_PATTERNS: &[&str] = &[
    // Language tag markers.
    r#"<lang primary="[^"]*"\s*/>\n*"#,
    // Reasoning blocks.
    r"<thinking>[\s\S]*?</thinking>\s*",
    r"<thought>[\s\S]*?</thought>\s*",
    // Self-explanatory preambles some backends prepend. The run-together words
    // match the text as the upstream emits it.
    r"(?i)^.*?Chinese whatmodel I am.*?Theyspecifically.*?requested.*?me.*?to.*?reply.*?in.*?Chinese\.\s*",
    r"(?i)^.*?This.*?is.*?a.*?straightforward.*?question.*?about.*?my.*?identity.*?asan.*?AI.*?assistant\.\s*",
    r"(?i)^.*?Idon't.*?need.*?to.*?use.*?any.*?tools.*?for.*?this.*?-\s*it's.*?asimple.*?informational.*?response.*?aboutwhat.*?I.*?am\.\s*",
    r"(?i)^.*?Sincethe.*?user.*?asked.*?in.*?Chinese.*?and.*?specifically.*?requested.*?a.*?Chinese.*?response.*?I.*?should.*?respond.*?in.*?Chinese\.\s*",
    r"(?i)^.*?What model are you.*?in Chinese and specifically requesting.*?me.*?to.*?reply.*?in.*?Chinese\.\s*",
    r"(?i)^.*?This.*?is.*?a.*?question.*?about.*?my.*?identity.*?not requiring.*?any.*?tool.*?use.*?I.*?should.*?respond.*?directly.*?to.*?the.*?user.*?in.*?Chinese.*?as.*?requested\.\s*",
    r"(?i)^.*?I.*?should.*?identify.*?myself.*?as.*?Notion.*?AI.*?as.*?mentioned.*?in.*?the.*?system.*?prompt.*?\s*",
    r"(?i)^.*?I.*?should.*?not.*?make.*?specific.*?claims.*?about.*?the.*?underlying.*?model.*?architecture.*?since.*?that.*?information.*?is.*?not.*?provided.*?in.*?my.*?context\.\s*",
];

static NOISE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    NOISE_PATTERNS
        .iter()
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::error!(pattern, error = %e, "Invalid sanitizer pattern");
                None
            }
        })
        .collect()
});

/// Strip every noise pattern in table order, then trim surrounding whitespace.
pub fn sanitize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut cleaned = text.to_string();
    for re in NOISE.iter() {
        if let std::borrow::Cow::Owned(replaced) = re.replace_all(&cleaned, "") {
            cleaned = replaced;
        }
    }
    cleaned.trim().to_string()
}
