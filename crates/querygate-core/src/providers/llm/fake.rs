use super::LlmClient;
use crate::errors::{GateError, GateResult};
use crate::model::{GenerateInput, LlmResponse};
use async_trait::async_trait;

/// Offline backend returning a fixed completion (or a fixed failure).
#[derive(Debug, Clone)]
pub struct FakeClient {
    reply: Result<String, String>,
}

impl FakeClient {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            reply: Ok(text.into()),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            reply: Err(message.into()),
        }
    }
}

#[async_trait]
impl LlmClient for FakeClient {
    fn provider_name(&self) -> &'static str {
        "fake"
    }

    fn health_check(&self) -> GateResult<()> {
        Ok(())
    }

    async fn generate(&self, input: &GenerateInput) -> GateResult<LlmResponse> {
        match &self.reply {
            Ok(text) if !text.trim().is_empty() => Ok(LlmResponse {
                text: text.clone(),
                provider: "fake".to_string(),
                model: input.model.clone().unwrap_or_else(|| "fake-model".to_string()),
                usage: None,
            }),
            Ok(_) => Err(GateError::provider("fake", "returned an empty completion")),
            Err(msg) => Err(GateError::provider("fake", msg.clone())),
        }
    }
}
