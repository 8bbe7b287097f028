//! Request and response shaping shared by chat-completions style backends.

use super::{DEFAULT_MAX_TOKENS, DEFAULT_SYSTEM_PROMPT, DEFAULT_TEMPERATURE};
use crate::errors::{GateError, GateResult};
use crate::model::{GenerateInput, LlmResponse};
use serde_json::{json, Value};

pub fn chat_payload(input: &GenerateInput, default_model: &str) -> Value {
    let model = input.model.as_deref().unwrap_or(default_model);
    let system = input
        .system_prompt
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);
    json!({
        "model": model,
        "temperature": input.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        "max_tokens": input.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        "messages": [
            {"role": "system", "content": system},
            {"role": "user", "content": input.prompt},
        ]
    })
}

/// Parse `choices[0].message.content`; an absent or blank completion is an error.
pub fn chat_response(
    provider: &'static str,
    response: &Value,
    requested_model: &str,
) -> GateResult<LlmResponse> {
    let text = response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| GateError::provider(provider, "returned an empty completion"))?;

    Ok(LlmResponse {
        text: text.to_string(),
        provider: provider.to_string(),
        model: response
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(requested_model)
            .to_string(),
        usage: response.get("usage").filter(|u| !u.is_null()).cloned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_applies_defaults() {
        let p = chat_payload(&GenerateInput::new("list actors"), "gpt-4.1-mini");
        assert_eq!(p["model"], "gpt-4.1-mini");
        assert_eq!(p["temperature"], 0.0);
        assert_eq!(p["max_tokens"], 800);
        assert_eq!(p["messages"][0]["content"], DEFAULT_SYSTEM_PROMPT);
        assert_eq!(p["messages"][1]["content"], "list actors");
    }

    #[test]
    fn payload_honours_overrides() {
        let input = GenerateInput {
            prompt: "q".into(),
            system_prompt: Some("be terse".into()),
            model: Some("gpt-x".into()),
            temperature: Some(0.5),
            max_tokens: Some(64),
        };
        let p = chat_payload(&input, "unused");
        assert_eq!(p["model"], "gpt-x");
        assert_eq!(p["max_tokens"], 64);
        assert_eq!(p["messages"][0]["content"], "be terse");
    }

    #[test]
    fn response_text_model_and_usage() {
        let body = json!({
            "model": "gpt-4.1-mini-2025",
            "choices": [{"message": {"content": "SELECT 1;"}}],
            "usage": {"total_tokens": 12}
        });
        let r = chat_response("openai", &body, "gpt-4.1-mini").unwrap();
        assert_eq!(r.text, "SELECT 1;");
        assert_eq!(r.model, "gpt-4.1-mini-2025");
        assert_eq!(r.usage.unwrap()["total_tokens"], 12);
    }

    #[test]
    fn blank_completion_is_provider_error() {
        let body = json!({"choices": [{"message": {"content": "  "}}]});
        let err = chat_response("deepseek", &body, "deepseek-chat").unwrap_err();
        assert_eq!(err.kind(), "provider_error");
    }
}
