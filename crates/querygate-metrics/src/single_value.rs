use crate::canonical::first_scalar;
use querygate_core::metrics_api::{AssertionResult, ResultAssertion};
use querygate_core::model::Row;
use serde_json::Value;

const TOLERANCE: f64 = 1e-6;

/// Compares only the first column of the first row.
pub struct SingleValueEqualAssertion;

impl ResultAssertion for SingleValueEqualAssertion {
    fn name(&self) -> &'static str {
        "single_value_equal"
    }

    fn evaluate(&self, generated: &[Row], oracle: &[Row]) -> AssertionResult {
        let g = first_scalar(generated);
        let o = first_scalar(oracle);
        if values_equal(&g, &o) {
            AssertionResult::pass()
        } else {
            AssertionResult::fail(&format!("single_value_mismatch: generated={} oracle={}", g, o))
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => (x - y).abs() <= TOLERANCE,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use querygate_core::model::Cell;

    #[test]
    fn tolerates_tiny_numeric_drift() {
        let g = vec![vec![Cell::Float(10.0000004), Cell::Text("ignored".into())]];
        let o = vec![vec![Cell::Text("10".into())]];
        assert!(SingleValueEqualAssertion.evaluate(&g, &o).passed);
    }

    #[test]
    fn mismatch_reason_shows_both_values() {
        let g = vec![vec![Cell::Int(7)]];
        let o = vec![vec![Cell::Text("seven".into())]];
        let r = SingleValueEqualAssertion.evaluate(&g, &o);
        assert_eq!(
            r.reason.as_deref(),
            Some(r#"single_value_mismatch: generated=7 oracle="seven""#)
        );
    }

    #[test]
    fn empty_results_compare_as_null() {
        assert!(SingleValueEqualAssertion.evaluate(&[], &[]).passed);
        let r = SingleValueEqualAssertion.evaluate(&[], &[vec![Cell::Int(1)]]);
        assert_eq!(
            r.reason.as_deref(),
            Some("single_value_mismatch: generated=null oracle=1")
        );
    }
}
