use super::{credential, http, LlmClient, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use crate::config::ProviderConfig;
use crate::errors::{GateError, GateResult};
use crate::model::{GenerateInput, LlmResponse};
use async_trait::async_trait;
use reqwest::Url;
use serde_json::{json, Value};
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Gemini authenticates with a `key` query parameter and returns text split
/// across content parts.
pub struct GeminiClient {
    pub api_key: String,
    pub default_model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub client: reqwest::Client,
}

impl GeminiClient {
    pub fn from_config(cfg: &ProviderConfig) -> Self {
        Self {
            api_key: credential::resolve_credential(cfg.api_key_ref.as_deref(), Some(API_KEY_ENV)),
            default_model: cfg
                .default_model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: cfg
                .base_url
                .as_deref()
                .and_then(http::non_empty)
                .unwrap_or(DEFAULT_BASE_URL)
                .to_string(),
            timeout: Duration::from_millis(cfg.timeout_ms()),
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, model: &str) -> GateResult<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            GateError::Configuration(format!("invalid Gemini base URL {}: {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| GateError::Configuration("Gemini base URL cannot be a base".into()))?
            .pop_if_empty()
            .push("models")
            .push(&format!("{}:generateContent", model));
        Ok(url)
    }
}

pub fn payload(input: &GenerateInput) -> Value {
    let mut body = json!({
        "contents": [{"role": "user", "parts": [{"text": input.prompt}]}],
        "generationConfig": {
            "temperature": input.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            "maxOutputTokens": input.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        }
    });
    if let Some(system) = input.system_prompt.as_deref().filter(|s| !s.trim().is_empty()) {
        body["systemInstruction"] = json!({"role": "system", "parts": [{"text": system}]});
    }
    body
}

/// Join `candidates[0].content.parts[].text` with newlines.
pub fn extract_text(response: &Value) -> String {
    response
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .map(|p| p.get("text").and_then(Value::as_str).unwrap_or(""))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[async_trait]
impl LlmClient for GeminiClient {
    fn provider_name(&self) -> &'static str {
        "gemini"
    }

    fn health_check(&self) -> GateResult<()> {
        if self.api_key.is_empty() {
            return Err(GateError::Configuration(
                "Gemini API key is not configured".into(),
            ));
        }
        Ok(())
    }

    async fn generate(&self, input: &GenerateInput) -> GateResult<LlmResponse> {
        self.health_check()?;

        let model = input.model.as_deref().unwrap_or(&self.default_model);
        let request = self
            .client
            .post(self.endpoint(model)?)
            .query(&[("key", self.api_key.as_str())]);

        let response = http::send_json("gemini", request, &payload(input), self.timeout).await?;
        let text = extract_text(&response);
        if text.is_empty() {
            return Err(GateError::provider("gemini", "returned an empty completion"));
        }

        Ok(LlmResponse {
            text,
            provider: "gemini".to_string(),
            model: model.to_string(),
            usage: response.get("usageMetadata").cloned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GeminiClient {
        GeminiClient::from_config(&ProviderConfig {
            api_key_ref: Some("plain:secret".into()),
            ..Default::default()
        })
    }

    #[test]
    fn system_instruction_only_when_given() {
        let mut input = GenerateInput::new("count films");
        assert!(payload(&input).get("systemInstruction").is_none());
        input.system_prompt = Some("sql only".into());
        let p = payload(&input);
        assert_eq!(p["systemInstruction"]["parts"][0]["text"], "sql only");
        assert_eq!(p["generationConfig"]["maxOutputTokens"], 800);
        assert_eq!(p["contents"][0]["parts"][0]["text"], "count films");
    }

    #[test]
    fn joins_parts() {
        let body = json!({"candidates": [{"content": {"parts": [{"text": "SELECT"}, {"text": "1;"}]}}]});
        assert_eq!(extract_text(&body), "SELECT\n1;");
        assert_eq!(extract_text(&json!({})), "");
    }

    #[test]
    fn endpoint_embeds_model() {
        let url = client().endpoint("gemini-2.0-flash").unwrap();
        assert_eq!(
            url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn missing_key_fails_health_check() {
        let mut c = client();
        c.api_key.clear();
        assert_eq!(c.health_check().unwrap_err().kind(), "configuration_error");
    }
}
