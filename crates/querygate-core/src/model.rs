use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One allowlisted table or view of a data source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaObject {
    pub schema_name: String,
    pub object_name: String,
}

impl SchemaObject {
    pub fn new(schema_name: impl Into<String>, object_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            object_name: object_name.into(),
        }
    }

    /// Lowercased `schema.object` key used for allowlist membership.
    pub fn key(&self) -> String {
        format!(
            "{}.{}",
            self.schema_name.to_lowercase(),
            self.object_name.to_lowercase()
        )
    }
}

/// A table reference resolved out of a candidate statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub schema: String,
    pub object: String,
    pub raw: String,
}

impl ObjectRef {
    pub fn key(&self) -> String {
        format!("{}.{}", self.schema, self.object)
    }
}

/// Created fresh per generation attempt; never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryCandidate {
    pub raw_text: String,
    pub sanitized_text: String,
    /// Final statement after normalization (row cap applied).
    pub sql: String,
    pub referenced_objects: Vec<ObjectRef>,
    pub errors: Vec<String>,
}

impl QueryCandidate {
    pub fn accepted_sql(&self) -> Option<&str> {
        if self.errors.is_empty() && !self.sql.is_empty() {
            Some(&self.sql)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagDocument {
    pub id: i64,
    pub doc_type: String,
    #[serde(default)]
    pub ref_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub data_source_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagEmbedding {
    pub rag_document_id: i64,
    pub embedding_model_id: String,
    pub vector: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredDocument {
    #[serde(flatten)]
    pub document: RagDocument,
    pub score: f64,
}

/// Labeled fixture for one benchmark question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkCase {
    pub id: String,
    pub nl_question: String,
    pub oracle_sql: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_assertion: Option<String>,
}

impl BenchmarkCase {
    pub fn assertion_name(&self) -> &str {
        self.result_assertion
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("row_set_equivalent")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub id: String,
    pub question: String,
    pub run_status: u16,
    pub error: Option<String>,
    pub correct: bool,
    pub mismatch_reason: Option<String>,
    pub critical_safety_violation: bool,
    pub e2e_latency_ms: Option<u64>,
    pub generated_sql: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub row_count_generated: Option<usize>,
    #[serde(default)]
    pub row_count_oracle: Option<usize>,
}

impl CaseResult {
    pub fn failed(case: &BenchmarkCase, run_status: u16, error: impl Into<String>) -> Self {
        Self {
            id: case.id.clone(),
            question: case.nl_question.clone(),
            run_status,
            error: Some(error.into()),
            correct: false,
            mismatch_reason: None,
            critical_safety_violation: false,
            e2e_latency_ms: None,
            generated_sql: None,
            provider: None,
            row_count_generated: None,
            row_count_oracle: None,
        }
    }

    pub fn run_succeeded(&self) -> bool {
        (200..300).contains(&self.run_status)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateInput {
    pub prompt: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl GenerateInput {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub usage: Option<serde_json::Value>,
}

/// A single result-set value, typed at the connection boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Bytes(Vec<u8>),
    List(Vec<Cell>),
    Object(BTreeMap<String, Cell>),
}

/// Column values in select-list order.
pub type Row = Vec<Cell>;

impl Cell {
    pub fn from_json(v: &serde_json::Value) -> Self {
        use serde_json::Value;
        match v {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Cell::Int(i),
                None => Cell::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Cell::Text(s.clone()),
            Value::Array(items) => Cell::List(items.iter().map(Cell::from_json).collect()),
            Value::Object(map) => Cell::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Cell::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// Rows as returned over JSON: objects keep their key order, arrays are taken as-is.
pub fn rows_from_json(rows: &serde_json::Value) -> Vec<Row> {
    let Some(items) = rows.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .map(|row| match row {
            serde_json::Value::Object(map) => map.values().map(Cell::from_json).collect(),
            serde_json::Value::Array(values) => values.iter().map(Cell::from_json).collect(),
            other => vec![Cell::from_json(other)],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_rows_keep_column_order() {
        let rows = rows_from_json(&json!([{"z": 1, "a": "x"}]));
        assert_eq!(rows, vec![vec![Cell::Int(1), Cell::Text("x".into())]]);
    }

    #[test]
    fn candidate_with_errors_is_never_accepted() {
        let mut c = QueryCandidate {
            sql: "SELECT 1 LIMIT 1;".into(),
            ..Default::default()
        };
        assert!(c.accepted_sql().is_some());
        c.errors.push("nope".into());
        assert!(c.accepted_sql().is_none());
    }

    #[test]
    fn blank_assertion_defaults_to_row_set() {
        let case = BenchmarkCase {
            id: "c1".into(),
            nl_question: "q".into(),
            oracle_sql: "SELECT 1".into(),
            result_assertion: Some(" ".into()),
        };
        assert_eq!(case.assertion_name(), "row_set_equivalent");
    }
}
