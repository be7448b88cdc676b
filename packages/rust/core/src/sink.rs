//! Persistence sink: URL records in, one unordered bulk insert out.

use tracing::debug;

use urlharvest_shared::{HarvestError, Result, UrlRecord};
use urlharvest_storage::{Collection, Document, DocumentStore};

/// Writes decoded record batches into a store, one collection per namespace.
pub struct PersistenceSink<'a, S> {
    store: &'a S,
    store_name: String,
}

impl<'a, S: DocumentStore> PersistenceSink<'a, S> {
    pub fn new(store: &'a S, store_name: impl Into<String>) -> Self {
        Self {
            store,
            store_name: store_name.into(),
        }
    }

    /// The collection records for `namespace` land in.
    pub fn collection(&self, namespace: &str) -> Collection {
        Collection::new(self.store_name.as_str(), namespace)
    }

    /// Persist `records` under `namespace` with a single bulk insert.
    ///
    /// Returns the number of documents written. Store errors are returned
    /// unchanged.
    pub async fn insert_batch(&self, namespace: &str, records: Vec<UrlRecord>) -> Result<usize> {
        let docs = to_documents(records)?;
        let count = docs.len();
        let collection = self.collection(namespace);

        let result = self.store.insert_many(&collection, docs).await?;
        debug!(%collection, count, inserted = result.inserted(), "batch persisted");
        Ok(count)
    }
}

/// One document per record, order preserved.
pub fn to_documents(records: Vec<UrlRecord>) -> Result<Vec<Document>> {
    records
        .into_iter()
        .map(|record| {
            serde_json::to_value(record)
                .map_err(|e| HarvestError::persistence(format!("failed to encode record: {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use urlharvest_storage::MemoryStore;

    fn record(loc: &str) -> UrlRecord {
        UrlRecord {
            loc: loc.into(),
            lastmod: Some("2024-05-01".into()),
            changefreq: Some("weekly".into()),
            priority: None,
        }
    }

    #[test]
    fn documents_keep_order_and_fields() {
        let docs = to_documents(vec![record("https://a"), record("https://b")]).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["loc"], "https://a");
        assert_eq!(docs[1]["loc"], "https://b");
        assert_eq!(docs[0]["changefreq"], "weekly");
        assert!(docs[0].get("priority").is_none());
    }

    #[tokio::test]
    async fn insert_batch_targets_namespace() {
        let store = MemoryStore::new();
        let sink = PersistenceSink::new(&store, "urls");

        let written = sink
            .insert_batch("un", vec![record("https://a"), record("https://b")])
            .await
            .unwrap();
        assert_eq!(written, 2);

        let stored = store.find_all(&Collection::new("urls", "un")).await.unwrap();
        let back: Vec<UrlRecord> = stored
            .into_iter()
            .map(|d| serde_json::from_value(d).unwrap())
            .collect();
        assert_eq!(back, vec![record("https://a"), record("https://b")]);
    }

    #[tokio::test]
    async fn empty_batch_succeeds() {
        let store = MemoryStore::new();
        let sink = PersistenceSink::new(&store, "urls");
        assert_eq!(sink.insert_batch("un", Vec::new()).await.unwrap(), 0);
        assert_eq!(store.total(), 0);
    }
}
