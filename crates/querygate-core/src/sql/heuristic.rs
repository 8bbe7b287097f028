use crate::errors::GateError;
use crate::model::SchemaObject;

const COUNT_MARKERS: &[&str] = &["count", "how many", "number of"];

/// Deterministic translator used when no model is configured or the model call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicSqlGenerator;

impl HeuristicSqlGenerator {
    pub fn generate(
        &self,
        question: &str,
        objects: &[SchemaObject],
        max_rows: u64,
    ) -> Result<String, GateError> {
        let Some(first) = objects.first() else {
            return Err(GateError::Configuration(
                "No schema objects available for selected data source. Run introspection first."
                    .into(),
            ));
        };

        let question = question.to_lowercase();
        let picked = pick_object(&question, objects).unwrap_or(first);
        let table = format!(
            "{}.{}",
            quote_ident(&picked.schema_name),
            quote_ident(&picked.object_name)
        );

        if is_count_question(&question) {
            Ok(format!("SELECT COUNT(*) AS total_count FROM {};", table))
        } else {
            Ok(format!("SELECT * FROM {} LIMIT {};", table, max_rows))
        }
    }
}

fn is_count_question(question: &str) -> bool {
    COUNT_MARKERS.iter().any(|m| question.contains(m))
}

fn pick_object<'a>(question: &str, objects: &'a [SchemaObject]) -> Option<&'a SchemaObject> {
    objects.iter().find(|o| {
        let qualified = format!("{}.{}", o.schema_name, o.object_name).to_lowercase();
        let simple = o.object_name.to_lowercase();
        question.contains(&qualified) || question.contains(&simple)
    })
}

pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn objects() -> Vec<SchemaObject> {
        vec![
            SchemaObject::new("public", "actor"),
            SchemaObject::new("public", "customer"),
        ]
    }

    #[test]
    fn count_intent_on_named_table() {
        let sql = HeuristicSqlGenerator
            .generate("How many customers do we have?", &objects(), 50)
            .unwrap();
        assert_eq!(
            sql,
            r#"SELECT COUNT(*) AS total_count FROM "public"."customer";"#
        );
    }

    #[test]
    fn falls_back_to_first_object_with_limit() {
        let sql = HeuristicSqlGenerator
            .generate("show me everything", &objects(), 50)
            .unwrap();
        assert_eq!(sql, r#"SELECT * FROM "public"."actor" LIMIT 50;"#);
    }

    #[test]
    fn empty_catalog_is_configuration_error() {
        let err = HeuristicSqlGenerator.generate("x", &[], 10).unwrap_err();
        assert_eq!(err.kind(), "configuration_error");
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        assert_eq!(quote_ident(r#"we"ird"#), r#""we""ird""#);
    }
}
