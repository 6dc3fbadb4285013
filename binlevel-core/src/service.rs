//! Ingestion service turning telemetry submissions into stored fill levels.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::fill::FillError;
use crate::model::{BinId, Ingested, Submission};
use crate::ports::{DocumentStore, StoreError};
use crate::records::BinRepository;

#[derive(thiserror::Error, Debug)]
/// Reasons a submission was not accepted.
pub enum IngestError {
    /// No bin is registered under the submitted identifier.
    #[error("Bin {0} is not registered")]
    NotRegistered(BinId),
    /// The presented token does not match the bin's token.
    #[error("Invalid token for bin {0}")]
    Unauthorized(BinId),
    /// The stored bin metadata cannot be used to compute a fill level.
    #[error("Invalid metadata for bin {bin_id}: {source}")]
    InvalidBinData {
        /// Bin whose metadata is broken.
        bin_id: BinId,
        /// Violated precondition.
        source: FillError,
    },
    /// The document store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Public entry point for ingesting sensor submissions.
///
/// The service holds no state besides the store handle; concurrent calls are
/// not coordinated and the last completed update of a bin wins.
#[derive(Clone)]
pub struct IngestionService {
    repository: BinRepository,
}

impl IngestionService {
    /// Create a new service bound to the provided store.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            repository: BinRepository::new(store),
        }
    }

    /// Authorize a submission, compute its fill level, and persist it.
    ///
    /// On success the fill level is appended to the history first and then
    /// copied onto the bin. The two writes are independent: if the second one
    /// fails the history already holds the reading.
    ///
    /// # Errors
    ///
    /// Returns an [`IngestError`] if the bin is unknown, the token does not
    /// match, the stored bin metadata is unusable, or the store fails.
    pub async fn ingest(&self, submission: Submission) -> Result<Ingested, IngestError> {
        let Submission {
            bin_id,
            distance,
            token,
        } = submission;

        let Some(bin) = self.repository.bin(&bin_id).await? else {
            info!(bin_id = %bin_id, "Submission for unregistered bin");
            return Err(IngestError::NotRegistered(bin_id));
        };

        if bin.token != token {
            warn!(bin_id = %bin_id, "Submission with invalid token");
            return Err(IngestError::Unauthorized(bin_id));
        }

        let percentage = match bin.fill_level(distance) {
            Ok(percentage) => percentage,
            Err(source) => return Err(IngestError::InvalidBinData { bin_id, source }),
        };

        let entry = self.repository.log_fill_level(&bin_id, percentage).await?;
        debug!(bin_id = %bin_id, timestamp = %entry.timestamp, "Fill level logged");

        self.repository.set_fill_level(&bin_id, percentage).await?;
        info!(bin_id = %bin_id, distance, percentage, "Fill level updated");

        Ok(Ingested {
            bin_id,
            fill_level_percentage: percentage,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::model::BinRecord;
    use crate::ports::{Document, FieldValue, Fields};
    use crate::records::{BINS, FILL_LEVEL_PERCENTAGE, FILL_LEVELS, encode_bin};

    #[derive(Default)]
    struct RecordingStore {
        documents: Mutex<HashMap<(String, String), Fields>>,
        appended: Mutex<Vec<(String, Fields)>>,
        fail_updates: bool,
    }

    impl RecordingStore {
        fn with_bin(record: &BinRecord) -> Self {
            let store = Self::default();
            store
                .documents
                .lock()
                .unwrap()
                .insert((BINS.to_owned(), record.id.0.clone()), encode_bin(record));
            store
        }

        fn appended(&self) -> Vec<(String, Fields)> {
            self.appended.lock().unwrap().clone()
        }

        fn bin_percentage(&self, id: &str) -> Option<f64> {
            self.documents
                .lock()
                .unwrap()
                .get(&(BINS.to_owned(), id.to_owned()))
                .and_then(|fields| fields.get(FILL_LEVEL_PERCENTAGE))
                .and_then(FieldValue::as_f64)
        }
    }

    #[async_trait]
    impl DocumentStore for RecordingStore {
        async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
            let documents = self.documents.lock().unwrap();
            Ok(documents
                .get(&(collection.to_owned(), id.to_owned()))
                .map(|fields| Document {
                    id: id.to_owned(),
                    fields: fields.clone(),
                }))
        }

        async fn update(
            &self,
            collection: &str,
            id: &str,
            fields: Fields,
        ) -> Result<(), StoreError> {
            if self.fail_updates {
                return Err(StoreError::Internal("update rejected".to_owned()));
            }
            let mut documents = self.documents.lock().unwrap();
            let existing = documents
                .get_mut(&(collection.to_owned(), id.to_owned()))
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
            fields.insert(
                timestamp_field.to_owned(),
                FieldValue::Timestamp(Utc::now()),
            );
            let mut appended = self.appended.lock().unwrap();
            appended.push((collection.to_owned(), fields.clone()));
            Ok(Document {
                id: format!("entry-{}", appended.len()),
                fields,
            })
        }
    }

    fn bin(height: f64, buffer_height: Option<f64>) -> BinRecord {
        BinRecord {
            id: BinId::from("bin-1"),
            height,
            buffer_height,
            token: "secret".to_owned(),
            fill_level_percentage: None,
        }
    }

    fn submission(distance: f64, token: &str) -> Submission {
        Submission {
            bin_id: BinId::from("bin-1"),
            distance,
            token: token.to_owned(),
        }
    }

    #[tokio::test]
    async fn stores_history_and_current_level() {
        let store = Arc::new(RecordingStore::with_bin(&bin(200.0, Some(10.0))));
        let service = IngestionService::new(store.clone());

        let ingested = service
            .ingest(submission(50.0, "secret"))
            .await
            .expect("accepted");

        assert_eq!(ingested.bin_id, BinId::from("bin-1"));
        assert!((ingested.fill_level_percentage - 80.0).abs() < 1e-9);

        let appended = store.appended();
        assert_eq!(appended.len(), 1);
        assert_eq!(appended[0].0, FILL_LEVELS);
        assert_eq!(
            appended[0].1.get(FILL_LEVEL_PERCENTAGE),
            Some(&FieldValue::Number(ingested.fill_level_percentage))
        );
        assert_eq!(
            store.bin_percentage("bin-1"),
            Some(ingested.fill_level_percentage)
        );
    }

    #[tokio::test]
    async fn unknown_bin_is_not_registered() {
        let store = Arc::new(RecordingStore::default());
        let service = IngestionService::new(store.clone());

        let err = service
            .ingest(submission(50.0, "secret"))
            .await
            .expect_err("unknown bin");

        assert!(matches!(err, IngestError::NotRegistered(ref id) if id.0 == "bin-1"));
        assert!(store.appended().is_empty());
    }

    #[tokio::test]
    async fn wrong_token_is_unauthorized_and_writes_nothing() {
        let store = Arc::new(RecordingStore::with_bin(&bin(200.0, None)));
        let service = IngestionService::new(store.clone());

        let err = service
            .ingest(submission(50.0, "Secret"))
            .await
            .expect_err("token differs in case");

        assert!(matches!(err, IngestError::Unauthorized(_)));
        assert!(store.appended().is_empty());
        assert_eq!(store.bin_percentage("bin-1"), None);
    }

    #[tokio::test]
    async fn broken_metadata_is_reported_without_writes() {
        let store = Arc::new(RecordingStore::with_bin(&bin(0.0, None)));
        let service = IngestionService::new(store.clone());

        let err = service
            .ingest(submission(50.0, "secret"))
            .await
            .expect_err("zero height");

        assert!(matches!(
            err,
            IngestError::InvalidBinData {
                source: FillError::NonPositiveHeight(_),
                ..
            }
        ));
        assert!(store.appended().is_empty());
    }

    #[tokio::test]
    async fn failed_update_keeps_logged_entry() {
        let mut store = RecordingStore::with_bin(&bin(100.0, None));
        store.fail_updates = true;
        let store = Arc::new(store);
        let service = IngestionService::new(store.clone());

        let err = service
            .ingest(submission(20.0, "secret"))
            .await
            .expect_err("update fails");

        assert!(matches!(err, IngestError::Store(StoreError::Internal(_))));
        assert_eq!(store.appended().len(), 1);
        assert_eq!(store.bin_percentage("bin-1"), None);
    }
}
