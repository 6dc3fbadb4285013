//! Mapping between bin/fill-level records and their stored documents.
//!
//! Field names match the documents written by the deployed devices and
//! dashboards, so they keep their capitalisation.

use std::sync::Arc;

use tracing::warn;

use crate::model::{BinId, BinRecord, FillLevelRecord};
use crate::ports::{Document, DocumentStore, FieldValue, Fields, StoreError};

/// Collection holding one document per registered bin.
pub const BINS: &str = "bins";
/// Append-only collection of computed fill levels.
pub const FILL_LEVELS: &str = "fill_levels";

/// Bin identifier field.
pub const BIN_ID: &str = "Bin_Id";
/// Fillable height field of a bin.
pub const HEIGHT: &str = "Height";
/// Buffer height field of a bin.
pub const BUFFER_HEIGHT: &str = "Buffer_Height";
/// Device token field of a bin.
pub const TOKEN: &str = "Token";
/// Fill-level percentage field, on bins and history entries.
pub const FILL_LEVEL_PERCENTAGE: &str = "Fill_Level_Percentage";
/// Server-assigned creation time of a history entry.
pub const TIMESTAMP: &str = "Timestamp";

/// Decode a bin document.
///
/// # Errors
///
/// Returns [`StoreError::Decode`] when a required field is missing or has the wrong type.
pub fn decode_bin(document: &Document) -> Result<BinRecord, StoreError> {
    let height = number(document, HEIGHT)?
        .ok_or_else(|| missing(document, HEIGHT))?;
    let buffer_height = number(document, BUFFER_HEIGHT)?;
    let token = document
        .field(TOKEN)
        .ok_or_else(|| missing(document, TOKEN))?
        .as_str()
        .ok_or_else(|| mistyped(document, TOKEN, "a string"))?
        .to_owned();
    // Only ever overwritten by ingestion, so a bad value must not block the bin.
    let fill_level_percentage = number(document, FILL_LEVEL_PERCENTAGE).unwrap_or_else(|err| {
        warn!(bin_id = %document.id, error = %err, "Ignoring unreadable current fill level");
        None
    });

    Ok(BinRecord {
        id: BinId(document.id.clone()),
        height,
        buffer_height,
        token,
        fill_level_percentage,
    })
}

/// Encode a bin record into document fields.
#[must_use]
pub fn encode_bin(record: &BinRecord) -> Fields {
    let mut fields = Fields::new();
    fields.insert(BIN_ID.to_owned(), record.id.0.clone().into());
    fields.insert(HEIGHT.to_owned(), record.height.into());
    if let Some(buffer_height) = record.buffer_height {
        fields.insert(BUFFER_HEIGHT.to_owned(), buffer_height.into());
    }
    fields.insert(TOKEN.to_owned(), record.token.clone().into());
    if let Some(percentage) = record.fill_level_percentage {
        fields.insert(FILL_LEVEL_PERCENTAGE.to_owned(), percentage.into());
    }
    fields
}

/// Fields of a new history entry, without the server timestamp.
#[must_use]
pub fn encode_fill_level(bin_id: &BinId, percentage: f64) -> Fields {
    let mut fields = Fields::new();
    fields.insert(BIN_ID.to_owned(), bin_id.0.clone().into());
    fields.insert(FILL_LEVEL_PERCENTAGE.to_owned(), percentage.into());
    fields
}

/// Decode a stored history entry.
///
/// # Errors
///
/// Returns [`StoreError::Decode`] when a required field is missing or has the wrong type.
pub fn decode_fill_level(document: &Document) -> Result<FillLevelRecord, StoreError> {
    let bin_id = document
        .field(BIN_ID)
        .and_then(FieldValue::as_str)
        .ok_or_else(|| mistyped(document, BIN_ID, "a string"))?;
    let fill_level_percentage = number(document, FILL_LEVEL_PERCENTAGE)?
        .ok_or_else(|| missing(document, FILL_LEVEL_PERCENTAGE))?;
    let timestamp = document
        .field(TIMESTAMP)
        .and_then(FieldValue::as_timestamp)
        .ok_or_else(|| mistyped(document, TIMESTAMP, "a timestamp"))?;

    Ok(FillLevelRecord {
        bin_id: BinId::from(bin_id),
        fill_level_percentage,
        timestamp,
    })
}

fn number(document: &Document, name: &str) -> Result<Option<f64>, StoreError> {
    match document.field(name) {
        None | Some(FieldValue::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| mistyped(document, name, "a number")),
    }
}

fn missing(document: &Document, name: &str) -> StoreError {
    StoreError::Decode(format!("document {} has no field {name}", document.id))
}

fn mistyped(document: &Document, name: &str, expected: &str) -> StoreError {
    StoreError::Decode(format!(
        "field {name} of document {} is not {expected}",
        document.id
    ))
}

/// Typed access to bins and their fill-level history on top of a [`DocumentStore`].
#[derive(Clone)]
pub struct BinRepository {
    store: Arc<dyn DocumentStore>,
}

impl BinRepository {
    /// Wrap the given store.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Load a registered bin.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the lookup fails or the document cannot be decoded.
    pub async fn bin(&self, id: &BinId) -> Result<Option<BinRecord>, StoreError> {
        self.store
            .get(BINS, &id.0)
            .await?
            .as_ref()
            .map(decode_bin)
            .transpose()
    }

    /// Append a fill level to the history of a bin.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the write fails or the stored entry cannot be decoded.
    pub async fn log_fill_level(
        &self,
        id: &BinId,
        percentage: f64,
    ) -> Result<FillLevelRecord, StoreError> {
        let document = self
            .store
            .append(FILL_LEVELS, encode_fill_level(id, percentage), TIMESTAMP)
            .await?;
        decode_fill_level(&document)
    }

    /// Overwrite the current fill level of a bin.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the bin no longer exists or the write fails.
    pub async fn set_fill_level(&self, id: &BinId, percentage: f64) -> Result<(), StoreError> {
        let mut fields = Fields::new();
        fields.insert(FILL_LEVEL_PERCENTAGE.to_owned(), percentage.into());
        self.store.update(BINS, &id.0, fields).await
    }
}
