//! In-process document store.

use std::collections::HashMap;
use std::sync::Mutex;

use urlharvest_shared::{HarvestError, Result};
use uuid::Uuid;

use crate::{Collection, Document, DocumentStore, InsertManyResult, batch_error};

/// A [`DocumentStore`] held entirely in memory.
///
/// Accepts only JSON objects, matching the libSQL store, so both reject the
/// same documents.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<Collection, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total documents across all collections.
    pub fn total(&self) -> usize {
        self.lock().map(|c| c.values().map(Vec::len).sum()).unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Collection, Vec<Document>>>> {
        self.collections
            .lock()
            .map_err(|_| HarvestError::persistence("memory store lock poisoned"))
    }
}

impl DocumentStore for MemoryStore {
    async fn insert_many(
        &self,
        collection: &Collection,
        docs: Vec<Document>,
    ) -> Result<InsertManyResult> {
        if docs.is_empty() {
            return Ok(InsertManyResult::default());
        }

        let total = docs.len();
        let mut inserted_ids = Vec::with_capacity(total);
        let mut failures = Vec::new();

        let mut collections = self.lock()?;
        let stored = collections.entry(collection.clone()).or_default();
        for (index, doc) in docs.into_iter().enumerate() {
            if doc.is_object() {
                stored.push(doc);
                inserted_ids.push(Uuid::now_v7().to_string());
            } else {
                failures.push((index, "document is not a JSON object".to_string()));
            }
        }

        if !failures.is_empty() {
            return Err(batch_error(collection, total, &failures));
        }
        Ok(InsertManyResult { inserted_ids })
    }

    async fn count(&self, collection: &Collection) -> Result<u64> {
        Ok(self.lock()?.get(collection).map_or(0, |docs| docs.len() as u64))
    }

    async fn find_all(&self, collection: &Collection) -> Result<Vec<Document>> {
        Ok(self.lock()?.get(collection).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn stores_per_collection() {
        let store = MemoryStore::new();
        let un = Collection::new("urls", "un");

        store
            .insert_many(&un, vec![json!({"loc": "a"}), json!({"loc": "b"})])
            .await
            .unwrap();
        store
            .insert_many(&Collection::new("urls", "other"), vec![json!({"loc": "c"})])
            .await
            .unwrap();

        assert_eq!(store.count(&un).await.unwrap(), 2);
        assert_eq!(store.find_all(&un).await.unwrap()[1]["loc"], "b");
        assert_eq!(store.total(), 3);
    }

    #[tokio::test]
    async fn rejects_non_objects_without_dropping_others() {
        let store = MemoryStore::new();
        let un = Collection::new("urls", "un");

        let err = store
            .insert_many(&un, vec![json!(1), json!({"loc": "a"})])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("1 of 2 documents"));
        assert_eq!(store.count(&un).await.unwrap(), 1);
    }
}
