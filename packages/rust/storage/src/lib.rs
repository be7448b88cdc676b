//! Document store layer for harvested URL records.
//!
//! The pipeline only needs one write operation: an unordered bulk insert of
//! opaque JSON documents into a collection addressed by
//! `(store_name, namespace)`. That seam is the [`DocumentStore`] trait.
//!
//! Implementations:
//! - [`Storage`]: libSQL database file (read-write via [`Storage::open`],
//!   read-only via [`Storage::open_readonly`])
//! - [`MemoryStore`]: in-process, for dry runs and tests

mod memory;
mod migrations;

use std::fmt;
use std::future::Future;
use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};
use urlharvest_shared::{HarvestError, Result};
use uuid::Uuid;

pub use memory::MemoryStore;

/// An opaque, store-agnostic document.
pub type Document = serde_json::Value;

// ---------------------------------------------------------------------------
// Collection addressing
// ---------------------------------------------------------------------------

/// A document collection: a namespace inside a named store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Collection {
    pub store: String,
    pub namespace: String,
}

impl Collection {
    pub fn new(store: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.store, self.namespace)
    }
}

/// Outcome of a successful bulk insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertManyResult {
    /// Identifiers assigned to the inserted documents.
    pub inserted_ids: Vec<String>,
}

impl InsertManyResult {
    pub fn inserted(&self) -> usize {
        self.inserted_ids.len()
    }
}

// ---------------------------------------------------------------------------
// DocumentStore
// ---------------------------------------------------------------------------

/// A document store supporting unordered bulk insert.
pub trait DocumentStore: Send + Sync {
    /// Insert `docs` into `collection` without ordering guarantees.
    ///
    /// Every document is attempted even if an earlier one fails, and failed
    /// documents do not roll back successful ones. If any document fails, the
    /// call returns [`HarvestError::Persistence`] after the batch. An empty
    /// batch is a successful no-op.
    fn insert_many(
        &self,
        collection: &Collection,
        docs: Vec<Document>,
    ) -> impl Future<Output = Result<InsertManyResult>> + Send;

    /// Number of documents in `collection`.
    fn count(&self, collection: &Collection) -> impl Future<Output = Result<u64>> + Send;

    /// All documents in `collection`, in insertion order.
    fn find_all(
        &self,
        collection: &Collection,
    ) -> impl Future<Output = Result<Vec<Document>>> + Send;
}

/// Build the error reported for a partially failed unordered batch.
pub(crate) fn batch_error(
    collection: &Collection,
    total: usize,
    failures: &[(usize, String)],
) -> HarvestError {
    let (index, first) = &failures[0];
    HarvestError::persistence(format!(
        "{} of {total} documents rejected by {collection} (first: document {index}: {first})",
        failures.len()
    ))
}

// ---------------------------------------------------------------------------
// libSQL storage
// ---------------------------------------------------------------------------

/// libSQL-backed document store.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| HarvestError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| HarvestError::persistence(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| HarvestError::persistence(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| HarvestError::persistence(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| HarvestError::persistence(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    HarvestError::persistence(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(HarvestError::persistence(
                "database is opened in read-only mode",
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Namespace overview
    // -----------------------------------------------------------------------

    /// Document counts per namespace in `store`. Returns `Vec<(namespace, count)>`.
    pub async fn namespaces(&self, store: &str) -> Result<Vec<(String, u64)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT namespace, COUNT(*) FROM documents
                 WHERE store_name = ?1 GROUP BY namespace ORDER BY namespace",
                params![store],
            )
            .await
            .map_err(|e| HarvestError::persistence(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let namespace: String = row
                .get(0)
                .map_err(|e| HarvestError::persistence(e.to_string()))?;
            let count: i64 = row
                .get(1)
                .map_err(|e| HarvestError::persistence(e.to_string()))?;
            results.push((namespace, count as u64));
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Ingest run history
    // -----------------------------------------------------------------------

    /// Record the start of an ingest run. Returns the generated run ID.
    pub async fn insert_run(&self, collection: &Collection) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO ingest_runs (id, store_name, namespace, started_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    id.as_str(),
                    collection.store.as_str(),
                    collection.namespace.as_str(),
                    now.as_str()
                ],
            )
            .await
            .map_err(|e| HarvestError::persistence(e.to_string()))?;
        Ok(id)
    }

    /// Mark an ingest run finished with its stats.
    pub async fn finish_run(&self, run_id: &str, stats_json: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE ingest_runs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, run_id],
            )
            .await
            .map_err(|e| HarvestError::persistence(e.to_string()))?;
        Ok(())
    }

    /// Stats JSON of a finished run, `None` while the run is open or unknown.
    pub async fn run_stats(&self, run_id: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT stats_json FROM ingest_runs WHERE id = ?1",
                params![run_id],
            )
            .await
            .map_err(|e| HarvestError::persistence(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<String>(0).ok()),
            Ok(None) => Ok(None),
            Err(e) => Err(HarvestError::persistence(e.to_string())),
        }
    }
}

impl DocumentStore for Storage {
    async fn insert_many(
        &self,
        collection: &Collection,
        docs: Vec<Document>,
    ) -> Result<InsertManyResult> {
        if docs.is_empty() {
            return Ok(InsertManyResult::default());
        }
        self.check_writable()?;

        let total = docs.len();
        let now = Utc::now().to_rfc3339();
        let mut inserted_ids = Vec::with_capacity(total);
        let mut failures: Vec<(usize, String)> = Vec::new();

        // One transaction for throughput. A rejected statement only rolls
        // back itself, so the rest of the batch still commits.
        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| HarvestError::persistence(e.to_string()))?;

        for (index, doc) in docs.iter().enumerate() {
            let body = match serde_json::to_string(doc) {
                Ok(body) => body,
                Err(e) => {
                    failures.push((index, e.to_string()));
                    continue;
                }
            };
            let id = Uuid::now_v7().to_string();

            let result = tx
                .execute(
                    "INSERT INTO documents (id, store_name, namespace, body, inserted_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        id.as_str(),
                        collection.store.as_str(),
                        collection.namespace.as_str(),
                        body.as_str(),
                        now.as_str()
                    ],
                )
                .await;

            match result {
                Ok(_) => inserted_ids.push(id),
                Err(e) => failures.push((index, e.to_string())),
            }
        }

        tx.commit()
            .await
            .map_err(|e| HarvestError::persistence(format!("commit failed: {e}")))?;

        tracing::debug!(
            %collection,
            inserted = inserted_ids.len(),
            failed = failures.len(),
            "bulk insert finished"
        );

        if !failures.is_empty() {
            return Err(batch_error(collection, total, &failures));
        }
        Ok(InsertManyResult { inserted_ids })
    }

    async fn count(&self, collection: &Collection) -> Result<u64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM documents WHERE store_name = ?1 AND namespace = ?2",
                params![collection.store.as_str(), collection.namespace.as_str()],
            )
            .await
            .map_err(|e| HarvestError::persistence(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| HarvestError::persistence(e.to_string()))?;
                Ok(count as u64)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(HarvestError::persistence(e.to_string())),
        }
    }

    async fn find_all(&self, collection: &Collection) -> Result<Vec<Document>> {
        let mut rows = self
            .conn
            .query(
                "SELECT body FROM documents
                 WHERE store_name = ?1 AND namespace = ?2 ORDER BY rowid",
                params![collection.store.as_str(), collection.namespace.as_str()],
            )
            .await
            .map_err(|e| HarvestError::persistence(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let body: String = row
                .get(0)
                .map_err(|e| HarvestError::persistence(e.to_string()))?;
            let doc = serde_json::from_str(&body)
                .map_err(|e| HarvestError::persistence(format!("corrupt document: {e}")))?;
            results.push(doc);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("uh_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn urls(namespace: &str) -> Collection {
        Collection::new("urls", namespace)
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("uh_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn insert_many_and_read_back() {
        let storage = test_storage().await;
        let docs = vec![
            json!({"loc": "https://example.com/1", "lastmod": "2024-01-01"}),
            json!({"loc": "https://example.com/2"}),
            json!({"loc": "https://example.com/3", "priority": "0.4"}),
        ];

        let result = storage
            .insert_many(&urls("un"), docs.clone())
            .await
            .expect("insert many");
        assert_eq!(result.inserted(), 3);

        assert_eq!(storage.count(&urls("un")).await.unwrap(), 3);
        assert_eq!(storage.find_all(&urls("un")).await.unwrap(), docs);

        // Other namespaces are untouched.
        assert_eq!(storage.count(&urls("other")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_batch_is_noop() {
        let storage = test_storage().await;
        let result = storage.insert_many(&urls("un"), Vec::new()).await.unwrap();
        assert_eq!(result.inserted(), 0);
        assert_eq!(storage.count(&urls("un")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unordered_insert_keeps_good_documents() {
        let storage = test_storage().await;
        // Non-object bodies violate the table's CHECK constraint.
        let docs = vec![
            json!({"loc": "https://example.com/1"}),
            json!("not an object"),
            json!({"loc": "https://example.com/3"}),
        ];

        let err = storage.insert_many(&urls("un"), docs).await.unwrap_err();
        assert!(matches!(err, HarvestError::Persistence(_)));
        assert!(err.to_string().contains("1 of 3 documents"));
        assert!(err.to_string().contains("document 1"));

        let stored = storage.find_all(&urls("un")).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1]["loc"], "https://example.com/3");
    }

    #[tokio::test]
    async fn repeated_inserts_duplicate() {
        let storage = test_storage().await;
        let docs = vec![json!({"loc": "https://example.com/1"})];
        storage.insert_many(&urls("un"), docs.clone()).await.unwrap();
        storage.insert_many(&urls("un"), docs).await.unwrap();
        assert_eq!(storage.count(&urls("un")).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn namespace_overview() {
        let storage = test_storage().await;
        storage
            .insert_many(&urls("b"), vec![json!({"loc": "x"}), json!({"loc": "y"})])
            .await
            .unwrap();
        storage
            .insert_many(&urls("a"), vec![json!({"loc": "z"})])
            .await
            .unwrap();
        storage
            .insert_many(&Collection::new("other", "a"), vec![json!({"loc": "w"})])
            .await
            .unwrap();

        let namespaces = storage.namespaces("urls").await.unwrap();
        assert_eq!(namespaces, vec![("a".to_string(), 1), ("b".to_string(), 2)]);
    }

    #[tokio::test]
    async fn run_lifecycle() {
        let storage = test_storage().await;
        let run_id = storage.insert_run(&urls("un")).await.expect("insert run");
        assert!(!run_id.is_empty());
        assert_eq!(storage.run_stats(&run_id).await.unwrap(), None);

        storage
            .finish_run(&run_id, r#"{"documents": 10}"#)
            .await
            .expect("finish run");
        let stats = storage.run_stats(&run_id).await.unwrap().unwrap();
        assert!(stats.contains("10"));
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("uh_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.insert_many(&urls("un"), vec![json!({"loc": "x"})])
            .await
            .unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        assert_eq!(ro.count(&urls("un")).await.unwrap(), 1);

        let result = ro.insert_many(&urls("un"), vec![json!({"loc": "y"})]).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));
    }
}
