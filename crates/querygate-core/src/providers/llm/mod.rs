use crate::errors::{GateError, GateResult};
use crate::model::{GenerateInput, LlmResponse};
use async_trait::async_trait;

pub mod chat;
pub mod credential;
pub mod deepseek;
pub mod fake;
pub mod gemini;
pub mod http;
pub mod openai;
pub mod registry;
pub mod structured;

pub use registry::ProviderRegistry;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a SQL generation assistant.";
pub const DEFAULT_TEMPERATURE: f32 = 0.0;
pub const DEFAULT_MAX_TOKENS: u32 = 800;

/// One hosted completion backend. Variants are peers selected by name through
/// [`ProviderRegistry`]; none retries internally.
#[async_trait]
pub trait LlmClient: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Fails with a configuration error when no credential is available.
    fn health_check(&self) -> GateResult<()>;

    async fn generate(&self, input: &GenerateInput) -> GateResult<LlmResponse>;

    async fn generate_structured(&self, input: &GenerateInput) -> GateResult<serde_json::Value> {
        let output = self.generate(input).await?;
        structured::extract_json_object(&output.text)
    }

    async fn embed(&self, _text: &str) -> GateResult<Vec<f64>> {
        Err(GateError::NotImplemented(format!(
            "embed() is not implemented for the {} provider",
            self.provider_name()
        )))
    }
}
