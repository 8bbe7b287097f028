use crate::errors::GateError;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

type Extractor = fn(&str) -> Option<Value>;

/// Tried in order; the first strategy that yields a JSON value wins.
const STRATEGIES: &[(&str, Extractor)] = &[
    ("whole_text", whole_text),
    ("fenced_block", fenced_block),
    ("brace_slice", brace_slice),
];

pub fn extract_json_object(text: &str) -> Result<Value, GateError> {
    let raw = text.trim();
    if raw.is_empty() {
        return Err(GateError::Parse("Model response is empty".into()));
    }
    for (name, strategy) in STRATEGIES {
        if let Some(v) = strategy(raw) {
            tracing::debug!(event = "structured.extracted", strategy = name);
            return Ok(v);
        }
    }
    Err(GateError::Parse(
        "Could not parse JSON from model response".into(),
    ))
}

fn whole_text(raw: &str) -> Option<Value> {
    serde_json::from_str(raw).ok()
}

fn fenced_block(raw: &str) -> Option<Value> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?is)```(?:json)?[^\S\n]*\n?(.*?)```").expect("static pattern")
    });
    let inner = re.captures(raw)?.get(1)?.as_str().trim();
    serde_json::from_str(inner).ok()
}

fn brace_slice(raw: &str) -> Option<Value> {
    let first = raw.find('{')?;
    let last = raw.rfind('}')?;
    if last <= first {
        return None;
    }
    serde_json::from_str(&raw[first..=last]).ok()
}
