use crate::embeddings::util::{decode_vec_f64, encode_vec_f64, sha256_hex};
use crate::embeddings::LocalEmbedding;
use crate::model::{CaseResult, RagDocument, SchemaObject};
use anyhow::Context;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub struct Store {
    pub conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Clone, Default)]
pub struct NewRagDocument {
    pub data_source_id: String,
    pub doc_type: String,
    pub ref_id: Option<String>,
    pub content: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BenchRunRow {
    pub id: i64,
    pub started_at: String,
    pub status: String,
    pub dataset_file: Option<String>,
    pub data_source_id: Option<String>,
    pub provider: Option<String>,
    pub summary: Option<serde_json::Value>,
}

impl Store {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create store dir {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite db {}", path.display()))?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory sqlite db")?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(crate::storage::schema::DDL)
            .context("failed to apply store schema")?;
        Ok(())
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("store connection lock poisoned"))
    }

    // rag documents

    /// Insert a document and index it with `embedder` in one transaction.
    pub fn insert_rag_document(
        &self,
        doc: &NewRagDocument,
        embedder: &LocalEmbedding,
    ) -> anyhow::Result<i64> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = now_rfc3339();
        tx.execute(
            "INSERT INTO rag_documents
               (data_source_id, doc_type, ref_id, content, metadata_json, content_sha256, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                doc.data_source_id,
                doc.doc_type,
                doc.ref_id,
                doc.content,
                serde_json::to_string(&normalize_metadata(&doc.metadata))?,
                sha256_hex(&doc.content),
                now
            ],
        )?;
        let id = tx.last_insert_rowid();

        let vec = embedder.embed(&doc.content);
        tx.execute(
            "INSERT OR REPLACE INTO rag_embeddings
               (rag_document_id, embedding_model_id, dims, vec, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, embedder.model_id(), vec.len() as i64, encode_vec_f64(&vec), now],
        )?;
        tx.commit()?;

        tracing::debug!(event = "rag.document_indexed", id, data_source_id = %doc.data_source_id);
        Ok(id)
    }

    pub fn put_embedding(&self, doc_id: i64, model_id: &str, vec: &[f64]) -> anyhow::Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO rag_embeddings
               (rag_document_id, embedding_model_id, dims, vec, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![doc_id, model_id, vec.len() as i64, encode_vec_f64(vec), now_rfc3339()],
        )?;
        Ok(())
    }

    /// Newest `window` documents of a data source with their embedding for
    /// `model_id`, if one exists. Vectors from other models are never returned.
    pub fn recent_documents(
        &self,
        data_source_id: &str,
        window: usize,
        model_id: &str,
    ) -> anyhow::Result<Vec<(RagDocument, Option<Vec<f64>>)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT d.id, d.doc_type, d.ref_id, d.content, d.metadata_json, d.data_source_id,
                    d.created_at, e.vec
             FROM rag_documents d
             LEFT JOIN rag_embeddings e
               ON e.rag_document_id = d.id AND e.embedding_model_id = ?2
             WHERE d.data_source_id = ?1
             ORDER BY d.created_at DESC, d.id DESC
             LIMIT ?3",
        )?;

        let rows = stmt.query_map(params![data_source_id, model_id, window as i64], |row| {
            let metadata: String = row.get(4)?;
            Ok((
                RagDocument {
                    id: row.get(0)?,
                    doc_type: row.get(1)?,
                    ref_id: row.get(2)?,
                    content: row.get(3)?,
                    metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
                    data_source_id: row.get(5)?,
                    created_at: row.get(6)?,
                },
                row.get::<_, Option<Vec<u8>>>(7)?,
            ))
        })?;

        let mut out = Vec::new();
        for r in rows {
            let (doc, blob) = r?;
            let vec = match blob {
                Some(b) => Some(decode_vec_f64(&b).with_context(|| {
                    format!("corrupt embedding for rag document {}", doc.id)
                })?),
                None => None,
            };
            out.push((doc, vec));
        }
        Ok(out)
    }

    // catalog

    /// Replace the catalog snapshot of a data source wholesale.
    pub fn replace_schema_objects(
        &self,
        data_source_id: &str,
        objects: &[SchemaObject],
    ) -> anyhow::Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM schema_objects WHERE data_source_id = ?1",
            params![data_source_id],
        )?;
        let now = now_rfc3339();
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO schema_objects (data_source_id, schema_name, object_name, imported_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for o in objects {
                inserted += stmt.execute(params![data_source_id, o.schema_name, o.object_name, now])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn list_schema_objects(&self, data_source_id: &str) -> anyhow::Result<Vec<SchemaObject>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT schema_name, object_name FROM schema_objects
             WHERE data_source_id = ?1
             ORDER BY schema_name, object_name",
        )?;
        let rows = stmt.query_map(params![data_source_id], |row| {
            Ok(SchemaObject::new(
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
            ))
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    // benchmark history

    pub fn create_bench_run(
        &self,
        dataset_file: &str,
        data_source_id: Option<&str>,
        provider: Option<&str>,
        model: Option<&str>,
    ) -> anyhow::Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO bench_runs(started_at, status, dataset_file, data_source_id, provider, model)
             VALUES (?1, 'running', ?2, ?3, ?4, ?5)",
            params![now_rfc3339(), dataset_file, data_source_id, provider, model],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_bench_result(&self, run_id: i64, result: &CaseResult) -> anyhow::Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO bench_results
               (run_id, case_id, run_status, correct, critical_safety_violation, latency_ms,
                mismatch_reason, case_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                run_id,
                result.id,
                result.run_status as i64,
                result.correct,
                result.critical_safety_violation,
                result.e2e_latency_ms.map(|v| v as i64),
                result.mismatch_reason,
                serde_json::to_string(result)?
            ],
        )?;
        Ok(())
    }

    pub fn finalize_bench_run(
        &self,
        run_id: i64,
        status: &str,
        summary: &serde_json::Value,
    ) -> anyhow::Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE bench_runs SET status = ?1, summary_json = ?2 WHERE id = ?3",
            params![status, serde_json::to_string(summary)?, run_id],
        )?;
        Ok(())
    }

    pub fn list_bench_runs(&self, limit: u32) -> anyhow::Result<Vec<BenchRunRow>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, started_at, status, dataset_file, data_source_id, provider, summary_json
             FROM bench_runs ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            let summary: Option<String> = row.get(6)?;
            Ok(BenchRunRow {
                id: row.get(0)?,
                started_at: row.get(1)?,
                status: row.get(2)?,
                dataset_file: row.get(3)?,
                data_source_id: row.get(4)?,
                provider: row.get(5)?,
                summary: summary.and_then(|s| serde_json::from_str(&s).ok()),
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn count_bench_results(&self, run_id: i64) -> anyhow::Result<u64> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM bench_results WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }
}

fn normalize_metadata(v: &serde_json::Value) -> serde_json::Value {
    if v.is_null() {
        serde_json::json!({})
    } else {
        v.clone()
    }
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
