pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS rag_documents (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  data_source_id TEXT NOT NULL,
  doc_type TEXT NOT NULL,
  ref_id TEXT,
  content TEXT NOT NULL,
  metadata_json TEXT NOT NULL DEFAULT '{}',
  content_sha256 TEXT NOT NULL,
  created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_rag_documents_source
  ON rag_documents(data_source_id, created_at DESC, id DESC);

CREATE TABLE IF NOT EXISTS rag_embeddings (
  rag_document_id INTEGER NOT NULL REFERENCES rag_documents(id) ON DELETE CASCADE,
  embedding_model_id TEXT NOT NULL,
  dims INTEGER NOT NULL,
  vec BLOB NOT NULL,
  created_at TEXT NOT NULL,
  PRIMARY KEY (rag_document_id, embedding_model_id)
);

CREATE TABLE IF NOT EXISTS schema_objects (
  data_source_id TEXT NOT NULL,
  schema_name TEXT NOT NULL,
  object_name TEXT NOT NULL,
  imported_at TEXT NOT NULL,
  PRIMARY KEY (data_source_id, schema_name, object_name)
);

CREATE TABLE IF NOT EXISTS bench_runs (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  started_at TEXT NOT NULL,
  status TEXT NOT NULL,
  dataset_file TEXT,
  data_source_id TEXT,
  provider TEXT,
  model TEXT,
  summary_json TEXT
);

CREATE TABLE IF NOT EXISTS bench_results (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  run_id INTEGER NOT NULL REFERENCES bench_runs(id),
  case_id TEXT NOT NULL,
  run_status INTEGER NOT NULL,
  correct INTEGER NOT NULL,
  critical_safety_violation INTEGER NOT NULL,
  latency_ms INTEGER,
  mismatch_reason TEXT,
  case_json TEXT NOT NULL
);
"#;
