use super::deepseek::DeepSeekClient;
use super::fake::FakeClient;
use super::gemini::GeminiClient;
use super::openai::OpenAIClient;
use super::LlmClient;
use crate::config::QuerygateConfig;
use crate::errors::{GateError, GateResult};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Name-keyed dispatch table of completion backends, built once at startup.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    clients: BTreeMap<String, Arc<dyn LlmClient>>,
    default: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(cfg: &QuerygateConfig) -> Self {
        let mut reg = Self::new();
        reg.register("openai", Arc::new(OpenAIClient::from_config(&cfg.provider("openai"))));
        reg.register("deepseek", Arc::new(DeepSeekClient::from_config(&cfg.provider("deepseek"))));
        reg.register("gemini", Arc::new(GeminiClient::from_config(&cfg.provider("gemini"))));
        reg.register(
            "fake",
            Arc::new(FakeClient::new(
                cfg.provider("fake").fixed_response.unwrap_or_default(),
            )),
        );
        reg.default = cfg.default_provider.as_deref().map(normalize);
        reg
    }

    pub fn register(&mut self, name: &str, client: Arc<dyn LlmClient>) {
        self.clients.insert(normalize(name), client);
    }

    pub fn with_default(mut self, name: &str) -> Self {
        self.default = Some(normalize(name));
        self
    }

    pub fn get(&self, name: &str) -> GateResult<Arc<dyn LlmClient>> {
        self.clients.get(&normalize(name)).cloned().ok_or_else(|| {
            GateError::Configuration(format!(
                "Unknown LLM provider: {} (known: {})",
                name,
                self.names().join(", ")
            ))
        })
    }

    /// The requested backend, else the configured default, else none (heuristic only).
    pub fn resolve(&self, requested: Option<&str>) -> GateResult<Option<Arc<dyn LlmClient>>> {
        match requested.filter(|r| !r.trim().is_empty()).or(self.default.as_deref()) {
            Some(name) => self.get(name).map(Some),
            None => Ok(None),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.clients.keys().cloned().collect()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}
