use crate::model::Row;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionResult {
    pub passed: bool,
    pub reason: Option<String>,
}

impl AssertionResult {
    pub fn pass() -> Self {
        Self {
            passed: true,
            reason: None,
        }
    }

    pub fn fail(reason: &str) -> Self {
        Self {
            passed: false,
            reason: Some(reason.to_string()),
        }
    }
}

/// Compares a generated result set against the oracle result set.
pub trait ResultAssertion: Send + Sync {
    /// Matches a case's `result_assertion` value.
    fn name(&self) -> &'static str;
    fn evaluate(&self, generated: &[Row], oracle: &[Row]) -> AssertionResult;
}
