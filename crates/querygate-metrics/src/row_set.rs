use crate::canonical::canonical_rows;
use querygate_core::metrics_api::{AssertionResult, ResultAssertion};
use querygate_core::model::Row;

/// Multiset equality of canonical rows; row order is ignored.
pub struct RowSetEquivalentAssertion;

impl ResultAssertion for RowSetEquivalentAssertion {
    fn name(&self) -> &'static str {
        "row_set_equivalent"
    }

    fn evaluate(&self, generated: &[Row], oracle: &[Row]) -> AssertionResult {
        let generated = canonical_rows(generated);
        let oracle = canonical_rows(oracle);

        if generated.len() != oracle.len() {
            return AssertionResult::fail(&format!(
                "row_count_mismatch: generated={} oracle={}",
                generated.len(),
                oracle.len()
            ));
        }

        match generated.iter().zip(&oracle).position(|(g, o)| g != o) {
            Some(i) => {
                tracing::debug!(
                    event = "assertion.row_mismatch",
                    index = i,
                    generated = %generated[i],
                    oracle = %oracle[i]
                );
                AssertionResult::fail(&format!("row_set_mismatch_at_index_{}", i))
            }
            None => AssertionResult::pass(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use querygate_core::model::Cell;

    fn rows(vals: &[&[Cell]]) -> Vec<Row> {
        vals.iter().map(|r| r.to_vec()).collect()
    }

    #[test]
    fn count_equality_across_types() {
        let generated = rows(&[&[Cell::Int(42)]]);
        let oracle = rows(&[&[Cell::Text("42".into())]]);
        let r = RowSetEquivalentAssertion.evaluate(&generated, &oracle);
        assert!(r.passed);
        assert_eq!(r.reason, None);
    }

    #[test]
    fn reordered_rows_are_equivalent() {
        let generated = rows(&[
            &[Cell::Text("b".into()), Cell::Int(2)],
            &[Cell::Text("a".into()), Cell::Int(1)],
        ]);
        let oracle = rows(&[
            &[Cell::Text("a".into()), Cell::Float(1.0)],
            &[Cell::Text("b".into()), Cell::Float(2.0)],
        ]);
        assert!(RowSetEquivalentAssertion.evaluate(&generated, &oracle).passed);
    }

    #[test]
    fn duplicates_count() {
        let generated = rows(&[&[Cell::Int(1)], &[Cell::Int(1)]]);
        let oracle = rows(&[&[Cell::Int(1)]]);
        let r = RowSetEquivalentAssertion.evaluate(&generated, &oracle);
        assert_eq!(
            r.reason.as_deref(),
            Some("row_count_mismatch: generated=2 oracle=1")
        );
    }

    #[test]
    fn reports_first_differing_sorted_index() {
        let generated = rows(&[&[Cell::Int(1)], &[Cell::Int(3)]]);
        let oracle = rows(&[&[Cell::Int(1)], &[Cell::Int(2)]]);
        let r = RowSetEquivalentAssertion.evaluate(&generated, &oracle);
        assert!(!r.passed);
        assert_eq!(r.reason.as_deref(), Some("row_set_mismatch_at_index_1"));
    }

    #[test]
    fn empty_sets_match() {
        assert!(RowSetEquivalentAssertion.evaluate(&[], &[]).passed);
    }
}
