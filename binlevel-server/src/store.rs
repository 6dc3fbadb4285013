//! Construction of the configured document store.

use std::sync::Arc;

use binlevel_core::{BinRecord, DocumentStore, StoreError};
use binlevel_store_firestore::{Auth, FirestoreStore, credentials::ServiceAccount};
use binlevel_store_memory::MemoryStore;
use reqwest::Client;
use tracing::{info, warn};

use crate::config::StoreConfig;

/// Connect to the configured store. Called once at startup; the returned
/// handle is shared by all requests.
///
/// # Errors
///
/// Returns [`StoreError::Credentials`] when the Firestore credentials cannot be
/// loaded or no project id is known.
pub async fn connect(
    config: &StoreConfig,
    client: Client,
) -> Result<Arc<dyn DocumentStore>, StoreError> {
    match config {
        StoreConfig::Memory { bins } => {
            let store = MemoryStore::with_bins(bins.iter().map(BinRecord::from)).await;
            info!(bins = bins.len(), "Using in-memory store");
            Ok(Arc::new(store))
        }
        StoreConfig::Firestore {
            project_id,
            database,
            credentials_file,
            base_url,
        } => {
            let store = if let Some(path) = credentials_file {
                let account = ServiceAccount::from_file(path)
                    .map_err(|err| StoreError::Credentials(err.to_string()))?;
                FirestoreStore::for_service_account(client, account, project_id.clone())?
            } else {
                let project_id = project_id.clone().ok_or_else(|| {
                    StoreError::Credentials(
                        "project_id is required when no credentials_file is set".to_owned(),
                    )
                })?;
                warn!("No credentials_file configured, sending unauthenticated requests");
                FirestoreStore::new(client, project_id, Auth::Anonymous)
            };
            let store = store
                .with_base_url(base_url.as_str())
                .with_database(database.as_str());

            info!(
                project_id = store.project_id(),
                database = %database,
                base_url = %base_url,
                "Using Firestore store"
            );
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use binlevel_core::records::BINS;

    use super::*;
    use crate::config::BinSeed;

    #[tokio::test]
    async fn memory_store_is_seeded() {
        let config = StoreConfig::Memory {
            bins: vec![BinSeed {
                id: "bin-1".to_owned(),
                height: 100.0,
                buffer_height: None,
                token: "secret".to_owned(),
            }],
        };
        let store = connect(&config, Client::new()).await.expect("connects");
        assert!(store.get(BINS, "bin-1").await.expect("get works").is_some());
    }

    #[tokio::test]
    async fn firestore_without_project_or_credentials_is_rejected() {
        let config = StoreConfig::Firestore {
            project_id: None,
            database: "(default)".to_owned(),
            credentials_file: None,
            base_url: "http://localhost:8080".to_owned(),
        };
        let result = connect(&config, Client::new()).await;
        assert!(matches!(result, Err(StoreError::Credentials(_))));
    }

    #[tokio::test]
    async fn missing_credentials_file_is_rejected() {
        let config = StoreConfig::Firestore {
            project_id: Some("bins".to_owned()),
            database: "(default)".to_owned(),
            credentials_file: Some("/nonexistent/serviceAccountKey.json".into()),
            base_url: "http://localhost:8080".to_owned(),
        };
        let result = connect(&config, Client::new()).await;
        assert!(matches!(result, Err(StoreError::Credentials(_))));
    }
}
