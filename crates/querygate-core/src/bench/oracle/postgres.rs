use super::ReferenceDb;
use crate::errors::{GateError, GateResult};
use crate::model::{Cell, Row};
use crate::pipeline::PlanSource;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Row as _, TypeInfo};

/// PostgreSQL reference held on a single long-lived connection.
pub struct PgReference {
    pool: PgPool,
}

impl PgReference {
    pub async fn connect(url: &str) -> GateResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(|e| {
                GateError::Configuration(format!("failed to connect to reference database: {}", e))
            })?;
        Ok(Self { pool })
    }
}

fn oracle(e: sqlx::Error) -> GateError {
    GateError::Oracle(e.to_string())
}

/// Reference rows come back over the simple-query protocol, so every value is
/// in PostgreSQL's text output form regardless of column type.
fn decode_row(row: &PgRow) -> GateResult<Row> {
    let mut cells = Vec::with_capacity(row.columns().len());
    for (i, col) in row.columns().iter().enumerate() {
        let text = row
            .try_get_unchecked::<Option<String>, _>(i)
            .map_err(|e| GateError::Oracle(format!("column {}: {}", col.name(), e)))?;
        cells.push(match text {
            Some(t) => cell_from_text(col.type_info().name(), &t),
            None => Cell::Null,
        });
    }
    Ok(cells)
}

/// Typed cell for the text form of a value of `type_name`. Types without a
/// dedicated arm (uuid, interval, tsvector, inet, money, arrays, enums, ...)
/// and values that do not parse stay as text.
pub fn cell_from_text(type_name: &str, text: &str) -> Cell {
    let typed = match type_name {
        "BOOL" => match text {
            "t" | "true" => Some(Cell::Bool(true)),
            "f" | "false" => Some(Cell::Bool(false)),
            _ => None,
        },
        "INT2" | "INT4" | "INT8" | "OID" => text.parse::<i64>().ok().map(Cell::Int),
        "FLOAT4" | "FLOAT8" => text.parse::<f64>().ok().map(Cell::Float),
        "DATE" => NaiveDate::parse_from_str(text, "%Y-%m-%d").ok().map(Cell::Date),
        "TIMESTAMP" => NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
            .ok()
            .map(|ts| Cell::Timestamp(ts.and_utc())),
        "TIMESTAMPTZ" => DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z")
            .ok()
            .map(|ts| Cell::Timestamp(ts.with_timezone(&Utc))),
        "BYTEA" => text
            .strip_prefix("\\x")
            .and_then(|h| hex::decode(h).ok())
            .map(Cell::Bytes),
        "JSON" | "JSONB" => serde_json::from_str::<serde_json::Value>(text)
            .ok()
            .map(|v| Cell::from_json(&v)),
        _ => None,
    };
    typed.unwrap_or_else(|| Cell::Text(text.to_string()))
}

#[async_trait]
impl ReferenceDb for PgReference {
    fn kind(&self) -> &'static str {
        "postgres"
    }

    async fn query(&self, sql: &str) -> GateResult<Vec<Row>> {
        let rows = sqlx::raw_sql(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(oracle)?;
        rows.iter().map(decode_row).collect()
    }

    async fn close(&self) -> GateResult<()> {
        self.pool.close().await;
        Ok(())
    }
}

#[async_trait]
impl PlanSource for PgReference {
    async fn explain(&self, sql: &str) -> GateResult<serde_json::Value> {
        let statement = format!(
            "EXPLAIN (FORMAT JSON) {}",
            sql.trim().trim_end_matches(';')
        );
        let row = sqlx::query(&statement)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| GateError::Parse(format!("EXPLAIN failed: {}", e)))?;
        let plan: serde_json::Value = row
            .try_get(0)
            .map_err(|e| GateError::Parse(format!("Could not parse EXPLAIN output: {}", e)))?;
        Ok(serde_json::json!([{ "QUERY PLAN": plan }]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn scalar_types_decode_from_text() {
        assert_eq!(cell_from_text("BOOL", "t"), Cell::Bool(true));
        assert_eq!(cell_from_text("INT8", "16044"), Cell::Int(16044));
        assert_eq!(cell_from_text("FLOAT8", "2.5"), Cell::Float(2.5));
        assert_eq!(cell_from_text("NUMERIC", "4.99"), Cell::Text("4.99".into()));
        assert_eq!(
            cell_from_text("DATE", "2006-02-15"),
            Cell::Date(NaiveDate::from_ymd_opt(2006, 2, 15).unwrap())
        );
    }

    #[test]
    fn timestamps_normalize_to_utc() {
        let want = Utc.with_ymd_and_hms(2013, 5, 26, 14, 49, 45).unwrap();
        assert_eq!(
            cell_from_text("TIMESTAMP", "2013-05-26 14:49:45"),
            Cell::Timestamp(want)
        );
        assert_eq!(
            cell_from_text("TIMESTAMPTZ", "2013-05-26 16:49:45+02"),
            Cell::Timestamp(want)
        );
        assert_eq!(
            cell_from_text("TIMESTAMP", "infinity"),
            Cell::Text("infinity".into())
        );
    }

    #[test]
    fn bytea_and_json() {
        assert_eq!(cell_from_text("BYTEA", "\\x0102"), Cell::Bytes(vec![1, 2]));
        assert_eq!(cell_from_text("JSONB", r#"{"a": 1}"#), Cell::from_json(&serde_json::json!({"a": 1})));
    }

    #[test]
    fn types_without_a_decoder_stay_text() {
        for (ty, text) in [
            ("TSVECTOR", "'academi':1 'battl':15 'canadian':20"),
            ("UUID", "a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11"),
            ("INTERVAL", "3 days 04:05:06"),
            ("MONEY", "$4.99"),
            ("TEXT[]", "{Trailers,\"Deleted Scenes\"}"),
            ("mpaa_rating", "PG-13"),
        ] {
            assert_eq!(cell_from_text(ty, text), Cell::Text(text.into()), "{}", ty);
        }
    }
}
