use crate::config::QuerygateConfig;
use crate::providers::llm::ProviderRegistry;
use crate::rag::RetrievalContextBuilder;
use crate::sql::SqlValidator;
use crate::storage::Store;
use anyhow::Context;

/// Process-wide handles, built once at startup and passed by reference.
#[derive(Clone)]
pub struct PipelineContext {
    pub config: QuerygateConfig,
    pub store: Store,
    pub providers: ProviderRegistry,
}

impl PipelineContext {
    pub fn open(config: QuerygateConfig) -> anyhow::Result<Self> {
        let store = Store::open(&config.store.path)
            .with_context(|| format!("failed to open store {}", config.store.path.display()))?;
        Self::with_store(config, store)
    }

    pub fn in_memory(config: QuerygateConfig) -> anyhow::Result<Self> {
        Self::with_store(config, Store::memory()?)
    }

    pub fn with_store(config: QuerygateConfig, store: Store) -> anyhow::Result<Self> {
        store.init_schema()?;
        let providers = ProviderRegistry::from_config(&config);
        Ok(Self {
            config,
            store,
            providers,
        })
    }

    pub fn validator(&self) -> SqlValidator {
        SqlValidator::new(
            self.config.validator.default_schema.clone(),
            self.config.validator.max_rows,
        )
    }

    pub fn retrieval(&self) -> RetrievalContextBuilder {
        RetrievalContextBuilder::from_config(&self.config.rag)
    }
}
