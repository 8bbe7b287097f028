use querygate_core::metrics_api::{AssertionResult, ResultAssertion};
use querygate_core::model::Row;

/// Passes when the generated query returned anything at all.
pub struct NonEmptyAssertion;

impl ResultAssertion for NonEmptyAssertion {
    fn name(&self) -> &'static str {
        "non_empty"
    }

    fn evaluate(&self, generated: &[Row], _oracle: &[Row]) -> AssertionResult {
        if generated.is_empty() {
            AssertionResult::fail("generated_result_is_empty")
        } else {
            AssertionResult::pass()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use querygate_core::model::Cell;

    #[test]
    fn ignores_oracle_rows() {
        let oracle = vec![vec![Cell::Int(1)]];
        let r = NonEmptyAssertion.evaluate(&[], &oracle);
        assert_eq!(r.reason.as_deref(), Some("generated_result_is_empty"));
        assert!(NonEmptyAssertion.evaluate(&[vec![Cell::Null]], &[]).passed);
    }
}
