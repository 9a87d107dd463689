//! Prompt construction and strict validation of the model's JSON reply.
//!
//! Nothing here touches the network, so the taxonomy rules are tested directly.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::event::{Classification, EventType, Impact, Region};

/// Why a single post could not be turned into a classification.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("model reply is not a JSON object: {0}")]
    Malformed(String),
    #[error("model reply is missing field `{0}`")]
    MissingField(&'static str),
    #[error("model reply has out-of-taxonomy {field}: {value:?}")]
    InvalidValue { field: &'static str, value: String },
    #[error("model reply has an empty explanation")]
    EmptyExplanation,
    #[error("llm request failed: {0}")]
    Transport(String),
    #[error("llm endpoint rejected credentials ({0})")]
    Unauthorized(u16),
}

impl ClassifyError {
    /// Credential rejections end the run; every other error skips one post.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ClassifyError::Unauthorized(_))
    }
}

fn quoted_list<T: std::fmt::Display>(items: &[T]) -> String {
    let parts: Vec<String> = items.iter().map(|v| format!("\"{v}\"")).collect();
    format!("[{}]", parts.join(", "))
}

/// System instruction sent with every post.
pub static SYSTEM_PROMPT: Lazy<String> = Lazy::new(|| {
    format!(
        "You are a senior financial news analyst.\n\
         \n\
         Your goal is to map tweets into a single structured financial event.\n\
         \n\
         Return ONLY a valid JSON object (no markdown, no backticks, no extra text) \
         with the following exact keys:\n\
         \n\
         - \"event_type\": one of {types}\n\
         - \"country_region\": one of {regions}\n\
         - \"impact\": one of {impacts}\n\
         - \"explanation\": 1-2 short sentences in English explaining how/why this tweet may matter for markets.\n\
         \n\
         If the tweet is not clearly financial, use event_type = \"OTHER\", \
         country_region = \"Global\", impact = \"Low\", \
         but still provide a short explanation in English.\n\
         \n\
         Always output valid JSON, nothing else.",
        types = quoted_list(&EventType::ALL),
        regions = quoted_list(&Region::ALL),
        impacts = quoted_list(&Impact::ALL),
    )
});

/// Strip a surrounding Markdown fence (```json ... ```) if the model added one.
fn strip_code_fence(raw: &str) -> &str {
    static RE_FENCE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\s*(.*?)\s*```$").expect("fence regex"));
    let trimmed = raw.trim();
    match RE_FENCE.captures(trimmed).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => trimmed,
    }
}

fn required_str<'a>(obj: &'a Map<String, Value>, field: &'static str) -> Result<&'a str, ClassifyError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(ClassifyError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(other) => Err(ClassifyError::InvalidValue {
            field,
            value: other.to_string(),
        }),
    }
}

fn taxonomy<T>(obj: &Map<String, Value>, field: &'static str) -> Result<T, ClassifyError>
where
    T: std::str::FromStr,
{
    let raw = required_str(obj, field)?;
    raw.trim().parse::<T>().map_err(|_| ClassifyError::InvalidValue {
        field,
        value: raw.to_string(),
    })
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse and validate one model reply. Values outside the taxonomy are
/// rejected, never mapped to a default.
pub fn parse_classification(raw: &str) -> Result<Classification, ClassifyError> {
    let body = strip_code_fence(raw);
    let value: Value =
        serde_json::from_str(body).map_err(|e| ClassifyError::Malformed(e.to_string()))?;
    let Value::Object(obj) = value else {
        return Err(ClassifyError::Malformed("top-level value is not an object".into()));
    };

    let event_type: EventType = taxonomy(&obj, "event_type")?;
    let country_region: Region = taxonomy(&obj, "country_region")?;
    let impact: Impact = taxonomy(&obj, "impact")?;
    let explanation = collapse_ws(required_str(&obj, "explanation")?);
    if explanation.is_empty() {
        return Err(ClassifyError::EmptyExplanation);
    }

    Ok(Classification {
        event_type,
        country_region,
        impact,
        explanation,
    })
}
