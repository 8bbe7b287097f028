use super::ReferenceDb;
use crate::errors::{GateError, GateResult};
use crate::model::{Cell, Row};
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::sync::Mutex;

/// SQLite reference database, opened read-only when backed by a file.
pub struct SqliteReference {
    conn: Mutex<Option<Connection>>,
}

impl SqliteReference {
    pub fn open(path: &str) -> GateResult<Self> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
        }
        .map_err(|e| {
            GateError::Configuration(format!("failed to open reference db {}: {}", path, e))
        })?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(Some(conn)),
        }
    }

    fn run(&self, sql: &str) -> GateResult<Vec<Row>> {
        let guard = self
            .conn
            .lock()
            .map_err(|_| GateError::Oracle("reference connection lock poisoned".into()))?;
        let conn = guard
            .as_ref()
            .ok_or_else(|| GateError::Oracle("reference connection is closed".into()))?;

        let oracle = |e: rusqlite::Error| GateError::Oracle(e.to_string());
        let mut stmt = conn.prepare(sql).map_err(oracle)?;
        let width = stmt.column_count();
        let mut rows = stmt.query([]).map_err(oracle)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(oracle)? {
            let mut cells = Vec::with_capacity(width);
            for i in 0..width {
                cells.push(cell(row.get_ref(i).map_err(oracle)?));
            }
            out.push(cells);
        }
        Ok(out)
    }
}

fn cell(v: ValueRef<'_>) -> Cell {
    match v {
        ValueRef::Null => Cell::Null,
        ValueRef::Integer(i) => Cell::Int(i),
        ValueRef::Real(f) => Cell::Float(f),
        ValueRef::Text(t) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Cell::Bytes(b.to_vec()),
    }
}

#[async_trait]
impl ReferenceDb for SqliteReference {
    fn kind(&self) -> &'static str {
        "sqlite"
    }

    async fn query(&self, sql: &str) -> GateResult<Vec<Row>> {
        self.run(sql)
    }

    async fn close(&self) -> GateResult<()> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| GateError::Oracle("reference connection lock poisoned".into()))?;
        if let Some(conn) = guard.take() {
            conn.close()
                .map_err(|(_, e)| GateError::Oracle(format!("failed to close reference db: {}", e)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> SqliteReference {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE customer (id INTEGER, name TEXT, balance REAL, avatar BLOB);
             INSERT INTO customer VALUES (1, 'Mary', 10.5, x'0102'), (2, 'Pat', NULL, NULL);",
        )
        .unwrap();
        SqliteReference::from_connection(conn)
    }

    #[tokio::test]
    async fn decodes_typed_cells() {
        let rows = db().query("SELECT * FROM customer ORDER BY id").await.unwrap();
        assert_eq!(
            rows[0],
            vec![
                Cell::Int(1),
                Cell::Text("Mary".into()),
                Cell::Float(10.5),
                Cell::Bytes(vec![1, 2])
            ]
        );
        assert_eq!(rows[1][2], Cell::Null);
    }

    #[tokio::test]
    async fn bad_sql_is_oracle_error() {
        let err = db().query("SELECT nope FROM customer").await.unwrap_err();
        assert_eq!(err.kind(), "oracle_error");
    }

    #[tokio::test]
    async fn closed_connection_rejects_queries() {
        let db = db();
        db.close().await.unwrap();
        db.close().await.unwrap();
        assert_eq!(db.query("SELECT 1").await.unwrap_err().kind(), "oracle_error");
    }
}
