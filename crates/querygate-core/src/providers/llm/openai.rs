use super::{chat, credential, http, LlmClient};
use crate::config::ProviderConfig;
use crate::errors::{GateError, GateResult};
use crate::model::{GenerateInput, LlmResponse};
use async_trait::async_trait;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

pub struct OpenAIClient {
    pub api_key: String,
    pub default_model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub client: reqwest::Client,
}

impl OpenAIClient {
    pub fn new(api_key: String, default_model: String, timeout: Duration) -> Self {
        Self {
            api_key,
            default_model,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(cfg: &ProviderConfig) -> Self {
        let mut c = Self::new(
            credential::resolve_credential(cfg.api_key_ref.as_deref(), Some(API_KEY_ENV)),
            cfg.default_model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            Duration::from_millis(cfg.timeout_ms()),
        );
        if let Some(url) = cfg.base_url.as_deref().and_then(http::non_empty) {
            c.base_url = url.trim_end_matches('/').to_string();
        }
        c
    }

    fn chat_request(&self) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    fn provider_name(&self) -> &'static str {
        "openai"
    }

    fn health_check(&self) -> GateResult<()> {
        if self.api_key.is_empty() {
            return Err(GateError::Configuration(
                "OpenAI API key is not configured".into(),
            ));
        }
        Ok(())
    }

    async fn generate(&self, input: &GenerateInput) -> GateResult<LlmResponse> {
        self.health_check()?;

        let model = input.model.as_deref().unwrap_or(&self.default_model);
        let body = chat::chat_payload(input, &self.default_model);
        let response = http::send_json("openai", self.chat_request(), &body, self.timeout).await?;
        chat::chat_response("openai", &response, model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: Option<&str>) -> OpenAIClient {
        OpenAIClient::from_config(&ProviderConfig {
            api_key_ref: Some("plain:sk-test".into()),
            base_url: base_url.map(str::to_string),
            ..Default::default()
        })
    }

    #[test]
    fn chat_request_targets_completions_with_bearer_key() {
        let req = client(None).chat_request().build().unwrap();
        assert_eq!(req.method(), &reqwest::Method::POST);
        assert_eq!(req.url().as_str(), "https://api.openai.com/v1/chat/completions");
        assert_eq!(req.headers()[reqwest::header::AUTHORIZATION], "Bearer sk-test");
    }

    #[test]
    fn base_url_override_is_used() {
        let req = client(Some("http://localhost:4000/v1/")).chat_request().build().unwrap();
        assert_eq!(req.url().as_str(), "http://localhost:4000/v1/chat/completions");
    }

    #[test]
    fn defaults_apply_without_overrides() {
        let c = client(Some("   "));
        assert_eq!(c.base_url, DEFAULT_BASE_URL);
        assert_eq!(c.default_model, DEFAULT_MODEL);
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let mut c = client(None);
        c.api_key.clear();
        assert_eq!(c.health_check().unwrap_err().kind(), "configuration_error");
        let err = c.generate(&GenerateInput::new("count films")).await.unwrap_err();
        assert_eq!(err.kind(), "configuration_error");
    }
}
