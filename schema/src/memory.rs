//! In-process [`DocumentStore`], used in tests and local runs without MongoDB.
use std::collections::BTreeMap;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use tokio::sync::RwLock;

use crate::{
    db::{DocumentStore, Filter, Record},
    error::PersistenceError,
};

#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    collections: RwLock<BTreeMap<String, Vec<Record>>>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        MemoryStore {
            name: name.into(),
            collections: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new("memory")
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    /// Rejects records MongoDB could not store, such as integers above `i64::MAX`.
    async fn insert(&self, collection_name: &str, mut record: Record) -> Result<String, PersistenceError> {
        mongodb::bson::to_document(&record)?;

        let id = ObjectId::new().to_hex();
        record.insert("_id".to_string(), serde_json::Value::String(id.clone()));

        self.collections
            .write()
            .await
            .entry(collection_name.to_string())
            .or_default()
            .push(record);
        Ok(id)
    }

    async fn find(
        &self,
        collection_name: &str,
        filter: &Filter,
    ) -> Result<Vec<Record>, PersistenceError> {
        let collections = self.collections.read().await;
        let records = collections
            .get(collection_name)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| filter.matches(record))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(records)
    }

    async fn list_collection_names(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self.collections.read().await.keys().cloned().collect())
    }
}
