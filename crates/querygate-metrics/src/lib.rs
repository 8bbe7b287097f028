use std::sync::Arc;

use querygate_core::metrics_api::ResultAssertion;

pub mod canonical;
mod non_empty;
mod row_set;
mod single_value;

pub use non_empty::NonEmptyAssertion;
pub use row_set::RowSetEquivalentAssertion;
pub use single_value::SingleValueEqualAssertion;

pub fn default_assertions() -> Vec<Arc<dyn ResultAssertion>> {
    vec![
        Arc::new(RowSetEquivalentAssertion),
        Arc::new(SingleValueEqualAssertion),
        Arc::new(NonEmptyAssertion),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_names_are_unique() {
        let names: Vec<&str> = default_assertions().iter().map(|a| a.name()).collect();
        assert_eq!(
            names,
            vec!["row_set_equivalent", "single_value_equal", "non_empty"]
        );
    }
}
