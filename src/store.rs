use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    Client, Database, IndexModel,
    bson::{self, Bson, Document, doc, oid::ObjectId},
};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;

/// Filter
///
/// The small set of predicates the repositories need. Each backend translates it
/// into its native form (a MongoDB filter document, or an in-memory match).
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    Id(ObjectId),
    Eq(String, Bson),
    /// Anchored, case-insensitive string equality (`^value$` with the `i` option).
    EqIgnoreCase(String, String),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn eq_ignore_case(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::EqIgnoreCase(field.into(), value.into())
    }

    fn to_document(&self) -> Document {
        let mut filter = Document::new();
        match self {
            Filter::All => {}
            Filter::Id(id) => {
                filter.insert("_id", *id);
            }
            Filter::Eq(field, value) => {
                filter.insert(field.as_str(), value.clone());
            }
            Filter::EqIgnoreCase(field, value) => {
                let pattern = format!("^{}$", regex::escape(value));
                filter.insert(field.as_str(), doc! { "$regex": pattern, "$options": "i" });
            }
        }
        filter
    }

    fn matches(&self, document: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Id(id) => document.get_object_id("_id").is_ok_and(|found| found == *id),
            Filter::Eq(field, value) => document.get(field) == Some(value),
            Filter::EqIgnoreCase(field, value) => document
                .get_str(field)
                .is_ok_and(|found| found.to_lowercase() == value.to_lowercase()),
        }
    }
}

/// Window
///
/// An offset/limit slice over a listing, in store insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub skip: u64,
    pub limit: u64,
}

impl Window {
    /// Skip and limit as the MongoDB driver sends them.
    ///
    /// The server reads both as signed 64-bit integers. A skip past `i64::MAX` is
    /// clamped, which still lands beyond the end of any collection and yields an
    /// empty page. A limit that large is rejected.
    fn to_driver(self) -> Result<(u64, i64), StoreError> {
        let skip = self.skip.min(i64::MAX as u64);
        let limit = i64::try_from(self.limit)
            .map_err(|_| StoreError::Malformed(format!("limit {} out of range", self.limit)))?;
        Ok((skip, limit))
    }
}

/// Result of a single-document `$set` update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("mongodb driver error: {0}")]
    Driver(#[from] mongodb::error::Error),
    #[error("failed to encode document: {0}")]
    Encode(#[from] bson::ser::Error),
    #[error("failed to decode document: {0}")]
    Decode(#[from] bson::de::Error),
    #[error("malformed document: {0}")]
    Malformed(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// DocumentStore
///
/// Collection-level contract the repositories are written against. Every call is a
/// single-document (or single-query) round-trip; the store provides per-document
/// atomicity and nothing more.
///
/// `MongoStore` is the production backend. `MemoryStore` backs local runs without a
/// database and the test suite.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Documents matching `filter`, in insertion order, optionally windowed.
    async fn find(
        &self,
        collection: &str,
        filter: Filter,
        window: Option<Window>,
    ) -> Result<Vec<Document>, StoreError>;

    async fn find_one(&self, collection: &str, filter: Filter)
    -> Result<Option<Document>, StoreError>;

    async fn count(&self, collection: &str, filter: Filter) -> Result<u64, StoreError>;

    /// Inserts `document` under a freshly generated `_id` and returns that id.
    async fn insert_one(&self, collection: &str, document: Document)
    -> Result<ObjectId, StoreError>;

    /// Applies `changes` as a `$set` to the document with the given id.
    async fn update_one(
        &self,
        collection: &str,
        id: ObjectId,
        changes: Document,
    ) -> Result<UpdateOutcome, StoreError>;

    /// Returns the number of deleted documents (0 or 1).
    async fn delete_one(&self, collection: &str, id: ObjectId) -> Result<u64, StoreError>;

    /// Creates a text index on `field`. Idempotent.
    async fn ensure_text_index(&self, collection: &str, field: &str) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    /// Releases driver resources. No-op for backends without connections.
    async fn shutdown(&self) {}
}

/// StoreState
///
/// The shared, injected store handle carried by `AppState`.
pub type StoreState = Arc<dyn DocumentStore>;

/// MongoStore
///
/// `DocumentStore` backed by a pooled MongoDB client. The client is cheap to clone
/// and safe to share across in-flight requests.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    /// Connects and pings the deployment so a bad URI fails at startup, not on the
    /// first request.
    pub async fn connect(uri: &str, database: &str) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(database);
        db.run_command(doc! { "ping": 1 }).await?;
        Ok(Self { client, db })
    }

    fn collection(&self, name: &str) -> mongodb::Collection<Document> {
        self.db.collection::<Document>(name)
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn find(
        &self,
        collection: &str,
        filter: Filter,
        window: Option<Window>,
    ) -> Result<Vec<Document>, StoreError> {
        let coll = self.collection(collection);
        let mut query = coll.find(filter.to_document()).sort(doc! { "_id": 1 });

        if let Some(window) = window {
            let (skip, limit) = window.to_driver()?;
            query = query.skip(skip).limit(limit);
        }

        let cursor = query.await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Filter,
    ) -> Result<Option<Document>, StoreError> {
        Ok(self.collection(collection).find_one(filter.to_document()).await?)
    }

    async fn count(&self, collection: &str, filter: Filter) -> Result<u64, StoreError> {
        Ok(self
            .collection(collection)
            .count_documents(filter.to_document())
            .await?)
    }

    async fn insert_one(
        &self,
        collection: &str,
        mut document: Document,
    ) -> Result<ObjectId, StoreError> {
        let id = ObjectId::new();
        document.insert("_id", id);
        self.collection(collection).insert_one(document).await?;
        Ok(id)
    }

    async fn update_one(
        &self,
        collection: &str,
        id: ObjectId,
        changes: Document,
    ) -> Result<UpdateOutcome, StoreError> {
        let result = self
            .collection(collection)
            .update_one(doc! { "_id": id }, doc! { "$set": changes })
            .await?;
        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn delete_one(&self, collection: &str, id: ObjectId) -> Result<u64, StoreError> {
        let result = self
            .collection(collection)
            .delete_one(doc! { "_id": id })
            .await?;
        Ok(result.deleted_count)
    }

    async fn ensure_text_index(&self, collection: &str, field: &str) -> Result<(), StoreError> {
        let mut keys = Document::new();
        keys.insert(field, "text");
        let index = IndexModel::builder().keys(keys).build();
        self.collection(collection).create_index(index).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn shutdown(&self) {
        self.client.clone().shutdown().await;
    }
}

/// MemoryStore
///
/// In-process `DocumentStore` used for local runs without `MONGODB_URI` and by the
/// test suite. Collections are insertion-ordered vectors behind an async lock.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    /// When true, every operation fails as if the database were unreachable.
    should_fail: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            collections: RwLock::default(),
            should_fail: true,
        }
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.should_fail {
            return Err(StoreError::Unavailable(
                "simulated connection failure".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(
        &self,
        collection: &str,
        filter: Filter,
        window: Option<Window>,
    ) -> Result<Vec<Document>, StoreError> {
        self.check_available()?;
        let collections = self.collections.read().await;
        let matching = collections
            .get(collection)
            .into_iter()
            .flatten()
            .filter(|document| filter.matches(document));

        let documents = match window {
            Some(window) => matching
                .skip(usize::try_from(window.skip).unwrap_or(usize::MAX))
                .take(usize::try_from(window.limit).unwrap_or(usize::MAX))
                .cloned()
                .collect(),
            None => matching.cloned().collect(),
        };
        Ok(documents)
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Filter,
    ) -> Result<Option<Document>, StoreError> {
        self.check_available()?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|documents| documents.iter().find(|document| filter.matches(document)))
            .cloned())
    }

    async fn count(&self, collection: &str, filter: Filter) -> Result<u64, StoreError> {
        self.check_available()?;
        let collections = self.collections.read().await;
        let count = collections
            .get(collection)
            .map_or(0, |documents| {
                documents.iter().filter(|document| filter.matches(document)).count()
            });
        Ok(count as u64)
    }

    async fn insert_one(
        &self,
        collection: &str,
        mut document: Document,
    ) -> Result<ObjectId, StoreError> {
        self.check_available()?;
        let id = ObjectId::new();
        document.insert("_id", id);
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .push(document);
        Ok(id)
    }

    async fn update_one(
        &self,
        collection: &str,
        id: ObjectId,
        changes: Document,
    ) -> Result<UpdateOutcome, StoreError> {
        self.check_available()?;
        let mut collections = self.collections.write().await;
        let target = collections.get_mut(collection).and_then(|documents| {
            documents
                .iter_mut()
                .find(|document| Filter::Id(id).matches(document))
        });

        let Some(document) = target else {
            return Ok(UpdateOutcome::default());
        };

        let mut modified = false;
        for (key, value) in changes {
            if document.get(&key) != Some(&value) {
                document.insert(key, value);
                modified = true;
            }
        }

        Ok(UpdateOutcome {
            matched: 1,
            modified: u64::from(modified),
        })
    }

    async fn delete_one(&self, collection: &str, id: ObjectId) -> Result<u64, StoreError> {
        self.check_available()?;
        let mut collections = self.collections.write().await;
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = documents.len();
        documents.retain(|document| !Filter::Id(id).matches(document));
        Ok((before - documents.len()) as u64)
    }

    async fn ensure_text_index(&self, _collection: &str, _field: &str) -> Result<(), StoreError> {
        // Lookups scan the collection; there is nothing to build.
        self.check_available()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }
}
