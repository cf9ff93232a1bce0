use std::collections::BTreeMap;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::{
    Client, Database,
    bson::{Bson, Document, doc},
    options::ClientOptions,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::PersistenceError;

/// Database used when neither `DATABASE_NAME` nor the URI names one
pub const DEFAULT_DATABASE_NAME: &str = "righttick";

/// A stored document, with `_id` rendered as a string.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Equality predicate. Every field must be equal for a record to match.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter(BTreeMap<String, serde_json::Value>);

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }

    /// Numbers compare by value, so `100` matches a stored `100.0` as in MongoDB.
    /// Values nested inside arrays or objects compare exactly.
    pub fn matches(&self, record: &Record) -> bool {
        self.0.iter().all(|(field, value)| {
            record
                .get(field)
                .is_some_and(|stored| same_value(stored, value))
        })
    }
}

fn same_value(stored: &serde_json::Value, wanted: &serde_json::Value) -> bool {
    match (stored.as_f64(), wanted.as_f64()) {
        (Some(a), Some(b)) if stored.is_number() && wanted.is_number() => a == b,
        _ => stored == wanted,
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync + std::fmt::Debug {
    /// Database name, as reported by the health probe
    fn name(&self) -> &str;

    /// Inserts `record` and returns the identifier assigned by the store.
    async fn insert(&self, collection_name: &str, record: Record) -> Result<String, PersistenceError>;

    /// Returns every record in the collection matching `filter`. Absent collections are empty.
    async fn find(
        &self,
        collection_name: &str,
        filter: &Filter,
    ) -> Result<Vec<Record>, PersistenceError>;

    async fn list_collection_names(&self) -> Result<Vec<String>, PersistenceError>;
}

/// Serializes `entity` and inserts it into `collection_name`.
#[instrument(skip_all, fields(collection = collection_name), err(Debug))]
pub async fn create_document<T>(
    store: &dyn DocumentStore,
    collection_name: &str,
    entity: &T,
) -> Result<String, PersistenceError>
where
    T: Serialize + Sync + ?Sized,
{
    let serde_json::Value::Object(record) = serde_json::to_value(entity)? else {
        return Err(PersistenceError::NotADocument);
    };
    let id = store.insert(collection_name, record).await?;
    tracing::debug!(%id, "inserted document");
    Ok(id)
}

#[instrument(skip_all, fields(collection = collection_name), err(Debug))]
pub async fn get_documents(
    store: &dyn DocumentStore,
    collection_name: &str,
    filter: Option<&Filter>,
) -> Result<Vec<Record>, PersistenceError> {
    let records = match filter {
        Some(filter) => store.find(collection_name, filter).await?,
        None => store.find(collection_name, &Filter::new()).await?,
    };
    tracing::debug!(num = records.len(), "fetched documents");
    Ok(records)
}

#[derive(Clone, Debug)]
pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    /// Connects and pings. `database_name` falls back to the URI's default database.
    pub async fn connect(uri: &str, database_name: Option<&str>) -> mongodb::error::Result<Self> {
        let mut client_options = ClientOptions::parse(uri).await?;

        client_options.app_name = Some(env!("CARGO_CRATE_NAME").to_string());

        let client = Client::with_options(client_options)?;

        let database = match database_name {
            Some(name) => client.database(name),
            None => client
                .default_database()
                .unwrap_or_else(|| client.database(DEFAULT_DATABASE_NAME)),
        };

        // Ping the server to see if you can connect to the cluster
        database.run_command(doc! {"ping": 1}).await?;

        Ok(MongoStore { database })
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn name(&self) -> &str {
        self.database.name()
    }

    async fn insert(&self, collection_name: &str, record: Record) -> Result<String, PersistenceError> {
        let document = mongodb::bson::to_document(&record)?;
        let res = self
            .database
            .collection::<Document>(collection_name)
            .insert_one(document)
            .await?;

        let id = match res.inserted_id {
            Bson::ObjectId(id) => id.to_hex(),
            Bson::String(id) => id,
            other => other.to_string(),
        };
        Ok(id)
    }

    async fn find(
        &self,
        collection_name: &str,
        filter: &Filter,
    ) -> Result<Vec<Record>, PersistenceError> {
        let mut query = Document::new();
        for (field, value) in filter.iter() {
            query.insert(field.as_str(), mongodb::bson::to_bson(value)?);
        }

        let documents: Vec<Document> = self
            .database
            .collection::<Document>(collection_name)
            .find(query)
            .await?
            .try_collect()
            .await?;

        Ok(documents.into_iter().map(into_record).collect())
    }

    async fn list_collection_names(&self) -> Result<Vec<String>, PersistenceError> {
        let names = self.database.list_collection_names().await?;
        Ok(names)
    }
}

fn into_record(mut document: Document) -> Record {
    if let Ok(id) = document.get_object_id("_id") {
        document.insert("_id", id.to_hex());
    }
    match Bson::Document(document).into_relaxed_extjson() {
        serde_json::Value::Object(record) => record,
        _ => Record::new(),
    }
}
