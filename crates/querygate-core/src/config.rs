use crate::budget::{Budget, DEFAULT_MAX_PLAN_ROWS, DEFAULT_MAX_TOTAL_COST};
use crate::embeddings::local::DEFAULT_DIM;
use crate::errors::GateError;
use crate::sql::validate::{DEFAULT_MAX_ROWS, DEFAULT_SCHEMA};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;
pub const DEFAULT_CONFIG_FILE: &str = "querygate.yaml";
pub const DEFAULT_STORE_PATH: &str = ".querygate/querygate.db";

pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_RAG_WINDOW: usize = 400;
pub const DEFAULT_RAG_LIMIT: usize = 12;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerygateConfig {
    #[serde(alias = "configVersion")]
    pub version: u32,
    /// Provider used when a request names none.
    pub default_provider: Option<String>,
    pub providers: BTreeMap<String, ProviderConfig>,
    pub validator: ValidatorConfig,
    pub budget: BudgetConfig,
    pub rag: RagConfig,
    pub gates: GateThresholds,
    pub store: StoreConfig,
}

impl Default for QuerygateConfig {
    fn default() -> Self {
        Self {
            version: SUPPORTED_CONFIG_VERSION,
            default_provider: None,
            providers: BTreeMap::new(),
            validator: ValidatorConfig::default(),
            budget: BudgetConfig::default(),
            rag: RagConfig::default(),
            gates: GateThresholds::default(),
            store: StoreConfig::default(),
        }
    }
}

impl QuerygateConfig {
    pub fn provider(&self, name: &str) -> ProviderConfig {
        self.providers.get(name).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Literal key, `env:NAME`, or `plain:VALUE`.
    pub api_key_ref: Option<String>,
    pub default_model: Option<String>,
    pub timeout_ms: Option<u64>,
    pub base_url: Option<String>,
    /// Completion returned by the `fake` backend.
    pub fixed_response: Option<String>,
}

impl ProviderConfig {
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.filter(|t| *t > 0).unwrap_or(DEFAULT_TIMEOUT_MS)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub default_schema: String,
    pub max_rows: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            default_schema: DEFAULT_SCHEMA.to_string(),
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub enabled: bool,
    pub max_total_cost: f64,
    pub max_plan_rows: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_total_cost: DEFAULT_MAX_TOTAL_COST,
            max_plan_rows: DEFAULT_MAX_PLAN_ROWS,
        }
    }
}

impl BudgetConfig {
    pub fn budget(&self) -> Budget {
        Budget {
            max_total_cost: self.max_total_cost,
            max_plan_rows: self.max_plan_rows,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub window: usize,
    pub limit: usize,
    pub dim: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_RAG_WINDOW,
            limit: DEFAULT_RAG_LIMIT,
            dim: DEFAULT_DIM,
        }
    }
}

/// Release gate thresholds; a run ships only when every gate holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateThresholds {
    pub min_correctness_rate: f64,
    pub max_critical_safety_violations: usize,
    pub max_p95_latency_ms: u64,
    pub min_sql_validation_pass_rate: f64,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            min_correctness_rate: 0.85,
            max_critical_safety_violations: 0,
            max_p95_latency_ms: 8_000,
            min_sql_validation_pass_rate: 0.98,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORE_PATH),
        }
    }
}

pub fn load_config(path: &Path, strict: bool) -> Result<QuerygateConfig, GateError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        GateError::Configuration(format!("failed to read config {}: {}", path.display(), e))
    })?;
    parse_config(&raw, strict)
        .map_err(|e| GateError::Configuration(format!("{} (file: {})", e, path.display())))
}

/// Load `path` when it exists; fall back to defaults otherwise.
pub fn load_or_default(path: &Path, strict: bool) -> Result<QuerygateConfig, GateError> {
    if path.exists() {
        load_config(path, strict)
    } else {
        tracing::debug!(event = "config.defaults", path = %path.display());
        Ok(QuerygateConfig::default())
    }
}

pub fn parse_config(raw: &str, strict: bool) -> Result<QuerygateConfig, String> {
    if raw.trim().is_empty() {
        return Ok(QuerygateConfig::default());
    }

    let mut ignored_keys = BTreeSet::new();
    let deserializer = serde_yaml::Deserializer::from_str(raw);
    let cfg: QuerygateConfig = serde_ignored::deserialize(deserializer, |path| {
        ignored_keys.insert(path.to_string());
    })
    .map_err(|e| format!("failed to parse YAML: {}", e))?;

    // anchors and extension keys are allowed to ride along
    let unknown: Vec<&String> = ignored_keys
        .iter()
        .filter(|k| !k.starts_with('_') && !k.starts_with("x-"))
        .collect();
    if !unknown.is_empty() {
        if strict {
            return Err(format!("Unknown fields detected in strict mode: {:?}", unknown));
        }
        tracing::warn!(event = "config.unknown_fields", fields = ?unknown);
    }

    if cfg.version != SUPPORTED_CONFIG_VERSION {
        return Err(format!(
            "unsupported config version {} (supported: {})",
            cfg.version, SUPPORTED_CONFIG_VERSION
        ));
    }
    if cfg.validator.max_rows == 0 {
        return Err("validator.max_rows must be greater than zero".into());
    }

    Ok(cfg)
}

pub fn write_sample_config(path: &Path) -> Result<(), GateError> {
    std::fs::write(
        path,
        r#"version: 1
default_provider: openai
providers:
  openai:
    api_key_ref: env:OPENAI_API_KEY
    default_model: gpt-4.1-mini
  deepseek:
    api_key_ref: env:DEEPSEEK_API_KEY
  gemini:
    api_key_ref: env:GEMINI_API_KEY
validator:
  default_schema: public
  max_rows: 1000
budget:
  enabled: false
  max_total_cost: 500000
  max_plan_rows: 1000000
store:
  path: .querygate/querygate.db
"#,
    )
    .map_err(|e| GateError::Configuration(format!("failed to write sample config: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = parse_config("", true).unwrap();
        assert_eq!(cfg.validator.max_rows, 1000);
        assert_eq!(cfg.rag.window, 400);
        assert_eq!(cfg.gates.max_p95_latency_ms, 8000);
        assert!(!cfg.budget.enabled);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = parse_config(
            "version: 1\nbudget:\n  enabled: true\n  max_total_cost: 10\nproviders:\n  gemini:\n    timeout_ms: 500\n",
            true,
        )
        .unwrap();
        assert!(cfg.budget.enabled);
        assert_eq!(cfg.budget.max_total_cost, 10.0);
        assert_eq!(cfg.budget.max_plan_rows, 1_000_000.0);
        assert_eq!(cfg.provider("gemini").timeout_ms(), 500);
        assert_eq!(cfg.provider("openai").timeout_ms(), DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn unknown_keys_fail_only_in_strict_mode() {
        let raw = "version: 1\nvalidator:\n  max_row: 5\n";
        let err = parse_config(raw, true).unwrap_err();
        assert!(err.contains("validator.max_row"), "{}", err);
        assert!(parse_config(raw, false).is_ok());
        assert!(parse_config("version: 1\nx-anchor: 1\n", true).is_ok());
    }

    #[test]
    fn rejects_unsupported_version() {
        assert!(parse_config("version: 7\n", false)
            .unwrap_err()
            .contains("unsupported config version 7"));
    }

    #[test]
    fn sample_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        write_sample_config(&path).unwrap();
        let cfg = load_config(&path, true).unwrap();
        assert_eq!(cfg.default_provider.as_deref(), Some("openai"));
        assert_eq!(cfg.providers.len(), 3);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_or_default(&dir.path().join("absent.yaml"), true).unwrap();
        assert_eq!(cfg.store.path, PathBuf::from(DEFAULT_STORE_PATH));
    }
}
