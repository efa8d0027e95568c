use axum::extract::FromRef;
use mongodb::bson::{self, Bson, Document, oid::ObjectId};
use serde::{Serialize, de::DeserializeOwned};
use std::marker::PhantomData;

use crate::{
    AppState,
    error::{AppError, AppResult},
    models::Product,
    store::{Filter, StoreError, StoreState, Window},
};

/// Entity
///
/// A record type persisted in its own collection. `NATURAL_KEY` names the
/// human-meaningful field that must be unique case-insensitively.
pub trait Entity: DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: &'static str;
    /// Capitalized name used in client-facing messages ("Category not found").
    const LABEL: &'static str;
    const NATURAL_KEY: &'static str;
}

/// is_valid_id
///
/// True iff `candidate` is a well-formed store identifier (24 hexadecimal digits).
/// A cheap pre-filter so malformed ids become client errors before any round-trip.
pub fn is_valid_id(candidate: &str) -> bool {
    candidate.len() == 24 && ObjectId::parse_str(candidate).is_ok()
}

fn parse_id<T: Entity>(id: &str) -> AppResult<ObjectId> {
    let invalid = || AppError::InvalidId(format!("Invalid {} ID", T::LABEL.to_lowercase()));
    if id.len() != 24 {
        return Err(invalid());
    }
    ObjectId::parse_str(id).map_err(|_| invalid())
}

/// Repository
///
/// Generic accessor over one collection, and the only component that talks to the
/// store. Handlers receive it through `State` via the `FromRef` impl below, one typed
/// view per entity over the same shared `StoreState`.
///
/// Records leave it with the store-native `_id` replaced by a string `id`, and
/// payloads going in never carry an identifier of their own.
///
/// **Error mapping**: malformed ids become `AppError::InvalidId` before any
/// round-trip, absent records become `AppError::NotFound`, and store faults become
/// `AppError::Database`.
pub struct Repository<T> {
    store: StoreState,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> FromRef<AppState> for Repository<T> {
    fn from_ref(app_state: &AppState) -> Repository<T> {
        Repository::new(app_state.store.clone())
    }
}

impl<T: Entity> Repository<T> {
    pub fn new(store: StoreState) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    fn not_found() -> AppError {
        AppError::NotFound(format!("{} not found", T::LABEL))
    }

    /// Moves `_id` to a hex-string `id` and decodes the record.
    fn into_record(mut document: Document) -> AppResult<T> {
        let id = match document.remove("_id") {
            Some(Bson::ObjectId(id)) => id,
            other => {
                return Err(StoreError::Malformed(format!(
                    "{} document has no ObjectId _id (found {other:?})",
                    T::COLLECTION
                ))
                .into());
            }
        };
        document.insert("id", id.to_hex());
        bson::from_document(document)
            .map_err(StoreError::from)
            .map_err(AppError::from)
    }

    /// Serializes a payload for writing, dropping any caller-supplied identifier.
    fn to_document<P: Serialize>(payload: &P) -> AppResult<Document> {
        let mut document = bson::to_document(payload).map_err(StoreError::from)?;
        document.remove("id");
        document.remove("_id");
        Ok(document)
    }

    /// find_all
    ///
    /// Matching records in insertion order. `window` applies offset/limit paging;
    /// a window past the end yields an empty list.
    pub async fn find_all(&self, filter: Filter, window: Option<Window>) -> AppResult<Vec<T>> {
        self.store
            .find(T::COLLECTION, filter, window)
            .await?
            .into_iter()
            .map(Self::into_record)
            .collect()
    }

    pub async fn find_one(&self, filter: Filter) -> AppResult<Option<T>> {
        self.store
            .find_one(T::COLLECTION, filter)
            .await?
            .map(Self::into_record)
            .transpose()
    }

    /// Validates the id format before looking anything up.
    pub async fn find_by_id(&self, id: &str) -> AppResult<T> {
        let object_id = parse_id::<T>(id)?;
        self.find_one(Filter::Id(object_id))
            .await?
            .ok_or_else(Self::not_found)
    }

    pub async fn count(&self, filter: Filter) -> AppResult<u64> {
        Ok(self.store.count(T::COLLECTION, filter).await?)
    }

    /// Persists `payload` under a fresh store-assigned id and returns the record.
    pub async fn insert<P: Serialize>(&self, payload: &P) -> AppResult<T> {
        let mut document = Self::to_document(payload)?;
        let id = self.store.insert_one(T::COLLECTION, document.clone()).await?;
        document.insert("_id", id);
        Self::into_record(document)
    }

    /// update_by_id
    ///
    /// Merges the fields present in `patch` into the stored record.
    ///
    /// Patches skip serializing absent fields, so the resulting document holds only
    /// what the caller supplied and becomes a single `$set`.
    ///
    /// "Matched but unchanged" is a success: the supplied values may equal the
    /// stored ones. Only "no document matched" is a not-found.
    pub async fn update_by_id<P: Serialize>(&self, id: &str, patch: &P) -> AppResult<T> {
        // 1. Id format, then the change set.
        let object_id = parse_id::<T>(id)?;
        let changes = Self::to_document(patch)?;

        // 2. Nothing to set: report the current record.
        if changes.is_empty() {
            return self
                .find_one(Filter::Id(object_id))
                .await?
                .ok_or_else(Self::not_found);
        }

        // 3. Apply, then re-read so the caller sees the stored state.
        let outcome = self
            .store
            .update_one(T::COLLECTION, object_id, changes)
            .await?;
        if outcome.matched == 0 {
            return Err(Self::not_found());
        }

        // Deleted between the update and this read.
        self.find_one(Filter::Id(object_id))
            .await?
            .ok_or_else(Self::not_found)
    }

    /// Removes the record. Deleting an absent record is a not-found, never a silent success.
    pub async fn delete_by_id(&self, id: &str) -> AppResult<()> {
        let object_id = parse_id::<T>(id)?;
        match self.store.delete_one(T::COLLECTION, object_id).await? {
            0 => Err(Self::not_found()),
            _ => Ok(()),
        }
    }

    /// exists
    ///
    /// Case-insensitive, whole-value match of `value` against `field`.
    ///
    /// The value is matched literally: `a.c` does not match `abc`, and `Post` does
    /// not match `Postres`. Used for the uniqueness checks on create.
    pub async fn exists(&self, field: &str, value: &str) -> AppResult<bool> {
        let matches = self
            .store
            .count(T::COLLECTION, Filter::eq_ignore_case(field, value))
            .await?;
        Ok(matches > 0)
    }

    /// natural_key_taken
    ///
    /// Whether the natural key is already used by a record other than `except_id`.
    /// Updates pass their own id so that keeping the current value is not a conflict.
    pub async fn natural_key_taken(&self, value: &str, except_id: Option<&str>) -> AppResult<bool> {
        let holders = self
            .store
            .find(
                T::COLLECTION,
                Filter::eq_ignore_case(T::NATURAL_KEY, value),
                None,
            )
            .await?;

        Ok(holders.iter().any(|holder| {
            let holder_id = holder.get_object_id("_id").map(|id| id.to_hex()).ok();
            except_id.is_none() || holder_id.as_deref() != except_id
        }))
    }
}

impl Repository<Product> {
    /// any_in_category
    ///
    /// The relationship guard for category deletion: true when at least one
    /// product still references `category_id`.
    pub async fn any_in_category(&self, category_id: &str) -> AppResult<bool> {
        let dependents = self
            .count(Filter::eq("category_id", category_id.to_string()))
            .await?;
        Ok(dependents > 0)
    }

    /// Every product referencing `category_id`, unpaged.
    pub async fn find_by_category(&self, category_id: &str) -> AppResult<Vec<Product>> {
        self.find_all(Filter::eq("category_id", category_id.to_string()), None)
            .await
    }
}
