//! SQL migration definitions for the urlharvest document database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: documents, ingest_runs",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Opaque JSON documents grouped by (store_name, namespace)
CREATE TABLE IF NOT EXISTS documents (
    id          TEXT PRIMARY KEY,
    store_name  TEXT NOT NULL,
    namespace   TEXT NOT NULL,
    body        TEXT NOT NULL CHECK (json_type(body) = 'object'),
    inserted_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(store_name, namespace);

-- Ingestion run history
CREATE TABLE IF NOT EXISTS ingest_runs (
    id          TEXT PRIMARY KEY,
    store_name  TEXT NOT NULL,
    namespace   TEXT NOT NULL,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

CREATE INDEX IF NOT EXISTS idx_ingest_runs_namespace ON ingest_runs(store_name, namespace);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
