use super::{chat, credential, http, LlmClient};
use crate::config::ProviderConfig;
use crate::errors::{GateError, GateResult};
use crate::model::{GenerateInput, LlmResponse};
use async_trait::async_trait;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
pub const API_KEY_ENV: &str = "DEEPSEEK_API_KEY";

/// DeepSeek speaks the chat-completions dialect under its own base URL.
pub struct DeepSeekClient {
    pub api_key: String,
    pub default_model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub client: reqwest::Client,
}

impl DeepSeekClient {
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
                .trim_end_matches('/')
                .to_string(),
            timeout: Duration::from_millis(cfg.timeout_ms()),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmClient for DeepSeekClient {
    fn provider_name(&self) -> &'static str {
        "deepseek"
    }

    fn health_check(&self) -> GateResult<()> {
        if self.api_key.is_empty() {
            return Err(GateError::Configuration(
                "DeepSeek API key is not configured".into(),
            ));
        }
        Ok(())
    }

    async fn generate(&self, input: &GenerateInput) -> GateResult<LlmResponse> {
        self.health_check()?;

        let model = input.model.as_deref().unwrap_or(&self.default_model);
        let body = chat::chat_payload(input, &self.default_model);
        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key);

        let response = http::send_json("deepseek", request, &body, self.timeout).await?;
        chat::chat_response("deepseek", &response, model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_override_drops_trailing_slash() {
        let cfg = ProviderConfig {
            api_key_ref: Some("plain:k".into()),
            base_url: Some("http://localhost:9999/".into()),
            ..Default::default()
        };
        let c = DeepSeekClient::from_config(&cfg);
        assert_eq!(c.base_url, "http://localhost:9999");
        assert_eq!(c.api_key, "k");
        assert_eq!(c.default_model, DEFAULT_MODEL);
        assert_eq!(c.timeout, Duration::from_millis(15_000));
    }
}
