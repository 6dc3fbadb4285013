//! In-process document store.
//!
//! Keeps every collection in a map behind a single lock. Appended documents
//! get a random id and a timestamp that never goes backwards within one
//! store, even if the system clock does.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use binlevel_core::{
    model::BinRecord,
    ports::{Document, DocumentStore, FieldValue, Fields, StoreError},
    records::{BINS, encode_bin},
};
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Collections {
    documents: HashMap<String, HashMap<String, Fields>>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Collections {
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let timestamp = match self.last_timestamp {
            Some(last) if now <= last => last + TimeDelta::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(timestamp);
        timestamp
    }
}

/// Document store kept entirely in memory.
///
/// Cloning is cheap and clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Collections>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with the given bins already provisioned.
    pub async fn with_bins<I>(bins: I) -> Self
    where
        I: IntoIterator<Item = BinRecord>,
    {
        let store = Self::new();
        for bin in bins {
            store.provision(&bin).await;
        }
        store
    }

    /// Register a bin, replacing any bin with the same id.
    pub async fn provision(&self, bin: &BinRecord) {
        self.insert(BINS, &bin.id.0, encode_bin(bin)).await;
        debug!(bin_id = %bin.id, "Bin provisioned");
    }

    /// Put a raw document under a fixed id, replacing what was there.
    pub async fn insert(&self, collection: &str, id: &str, fields: Fields) {
        let mut inner = self.inner.write().await;
        inner
            .documents
            .entry(collection.to_owned())
            .or_default()
            .insert(id.to_owned(), fields);
    }

    /// All documents of a collection, in no particular order.
    pub async fn documents(&self, collection: &str) -> Vec<Document> {
        let inner = self.inner.read().await;
        inner
            .documents
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .map(|(id, fields)| Document {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .documents
            .get(collection)
            .and_then(|documents| documents.get(id))
            .map(|fields| Document {
                id: id.to_owned(),
                fields: fields.clone(),
            }))
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let existing = inner
            .documents
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_owned(),
                id: id.to_owned(),
            })?;
        existing.extend(fields);
        Ok(())
    }

    async fn append(
        &self,
        collection: &str,
        mut fields: Fields,
        timestamp_field: &str,
    ) -> Result<Document, StoreError> {
        let mut inner = self.inner.write().await;
        let timestamp = inner.next_timestamp();
        fields.insert(timestamp_field.to_owned(), FieldValue::Timestamp(timestamp));

        let id = Uuid::new_v4().simple().to_string();
        inner
            .documents
            .entry(collection.to_owned())
            .or_default()
            .insert(id.clone(), fields.clone());

        Ok(Document { id, fields })
    }
}
