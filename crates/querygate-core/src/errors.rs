use thiserror::Error;

/// Error taxonomy shared by every pipeline stage and the benchmark harness.
///
/// Only `Configuration` is fatal by itself; the harness decides separately which
/// setup failures end a run.
#[derive(Error, Debug)]
pub enum GateError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("provider error ({provider}): {message}")]
    Provider {
        provider: String,
        message: String,
        status: Option<u16>,
    },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("policy violation: {}", .0.join("; "))]
    Policy(Vec<String>),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("oracle error: {0}")]
    Oracle(String),

    #[error("publish error: {0}")]
    Publish(String),
}

impl GateError {
    pub fn provider(provider: &str, message: impl Into<String>) -> Self {
        GateError::Provider {
            provider: provider.to_string(),
            message: message.into(),
            status: None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GateError::Configuration(_) => "configuration_error",
            GateError::Provider { .. } => "provider_error",
            GateError::Parse(_) => "parse_error",
            GateError::Policy(_) => "policy_violation",
            GateError::NotImplemented(_) => "not_implemented",
            GateError::Oracle(_) => "oracle_error",
            GateError::Publish(_) => "publish_error",
        }
    }

    /// A missing capability (e.g. no embedding endpoint) is not a failure of the call.
    pub fn is_capability_gap(&self) -> bool {
        matches!(self, GateError::NotImplemented(_))
    }
}

pub type GateResult<T> = Result<T, GateError>;
