//! Traits describing store capabilities and shared helper types.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Error as ReqwestError;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to a document store.
pub enum StoreError {
    /// Network layer failed.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// The store answered with an unexpected status.
    #[error("Store returned status {status}: {message}")]
    Status {
        /// HTTP status code of the response.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },
    /// A document required by the operation does not exist.
    #[error("Document {collection}/{id} not found")]
    NotFound {
        /// Collection that was addressed.
        collection: String,
        /// Identifier that was addressed.
        id: String,
    },
    /// A stored document or store response had an unexpected shape.
    #[error("Decode error: {0}")]
    Decode(String),
    /// Credentials could not be loaded or exchanged for an access token.
    #[error("Credentials error: {0}")]
    Credentials(String),
    /// Internal store error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A single value inside a stored document.
pub enum FieldValue {
    /// UTF-8 text.
    String(String),
    /// Floating point number.
    Number(f64),
    /// Signed integer.
    Integer(i64),
    /// Boolean flag.
    Boolean(bool),
    /// Point in time.
    Timestamp(DateTime<Utc>),
    /// Explicit null.
    Null,
}

impl FieldValue {
    /// Numeric view of the value, accepting both integers and floats.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        reason = "stored integers are small sensor dimensions"
    )]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(number) => Some(*number),
            FieldValue::Integer(number) => Some(*number as f64),
            _ => None,
        }
    }

    /// Text view of the value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(text) => Some(text),
            _ => None,
        }
    }

    /// Timestamp view of the value.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(timestamp) => Some(*timestamp),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(text: &str) -> Self {
        FieldValue::String(text.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(text: String) -> Self {
        FieldValue::String(text)
    }
}

impl From<f64> for FieldValue {
    fn from(number: f64) -> Self {
        FieldValue::Number(number)
    }
}

/// Named values of a document, ordered by field name.
pub type Fields = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A document as returned by a store.
pub struct Document {
    /// Identifier within its collection.
    pub id: String,
    /// Stored field values.
    pub fields: Fields,
}

impl Document {
    /// Look up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

#[async_trait]
/// Trait for document-oriented persistence backends.
///
/// Each call is an independent operation; implementations give no
/// transactional guarantees across calls.
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by key.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the store cannot be reached or answers
    /// with something other than the document or a not-found.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Merge `fields` into an existing document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the document does not exist, or
    /// another [`StoreError`] when the write fails.
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError>;

    /// Create a new document with a store-generated id.
    ///
    /// `timestamp_field` is set from the store's own clock and is present in
    /// the returned document.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the write fails.
    async fn append(
        &self,
        collection: &str,
        fields: Fields,
        timestamp_field: &str,
    ) -> Result<Document, StoreError>;
}
