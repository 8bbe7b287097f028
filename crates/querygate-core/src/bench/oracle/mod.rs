//! Reference connections that execute oracle SQL during a benchmark run.

use crate::errors::{GateError, GateResult};
use crate::model::Row;
use async_trait::async_trait;

#[cfg(feature = "postgres")]
pub mod postgres;
pub mod sqlite;

pub use sqlite::SqliteReference;

#[async_trait]
pub trait ReferenceDb: Send + Sync {
    fn kind(&self) -> &'static str;

    /// Execute `sql` and return rows in select-list order.
    async fn query(&self, sql: &str) -> GateResult<Vec<Row>>;

    async fn close(&self) -> GateResult<()>;
}

/// Open a reference connection from a connection string.
///
/// `postgres://` and `postgresql://` select PostgreSQL; `sqlite:` or a bare
/// filesystem path select SQLite.
pub async fn connect(url: &str) -> GateResult<Box<dyn ReferenceDb>> {
    let url = url.trim();
    if url.is_empty() {
        return Err(GateError::Configuration(
            "reference connection string is empty".into(),
        ));
    }

    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        return connect_postgres(url).await;
    }

    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    Ok(Box::new(SqliteReference::open(path)?))
}

#[cfg(feature = "postgres")]
async fn connect_postgres(url: &str) -> GateResult<Box<dyn ReferenceDb>> {
    Ok(Box::new(postgres::PgReference::connect(url).await?))
}

#[cfg(not(feature = "postgres"))]
async fn connect_postgres(_url: &str) -> GateResult<Box<dyn ReferenceDb>> {
    Err(GateError::Configuration(
        "PostgreSQL reference connections need the `postgres` feature".into(),
    ))
}
