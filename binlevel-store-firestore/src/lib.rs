//! Document store backed by the Cloud Firestore REST API.
//!
//! Works against production Firestore with a service account, or against the
//! Firestore emulator without credentials.

/// Service-account keys and access-token exchange.
pub mod credentials;
mod value;

use async_trait::async_trait;
use binlevel_core::ports::{Document, DocumentStore, FieldValue, Fields, StoreError};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use tracing::debug;
use uuid::Uuid;

use crate::credentials::{CredentialsError, ServiceAccount, TokenSource};
use crate::value::{decode_fields, decode_timestamp, encode_fields};

/// Public Firestore endpoint.
pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com";
/// Database used when none is configured.
pub const DEFAULT_DATABASE: &str = "(default)";

/// How requests are authenticated.
pub enum Auth {
    /// No credentials, for the emulator.
    Anonymous,
    /// Bearer tokens issued for a service account.
    ServiceAccount(TokenSource),
}

/// [`DocumentStore`] implementation talking to Firestore over HTTPS.
pub struct FirestoreStore {
    client: Client,
    base_url: String,
    project_id: String,
    database: String,
    auth: Auth,
}

impl FirestoreStore {
    /// Create a store for the given project on the public endpoint.
    #[must_use]
    pub fn new(client: Client, project_id: impl Into<String>, auth: Auth) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_owned(),
            project_id: project_id.into(),
            database: DEFAULT_DATABASE.to_owned(),
            auth,
        }
    }

    /// Create a store authenticated as the given service account.
    ///
    /// The project is taken from the key unless `project_id` is given.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Credentials`] when no project id is known.
    pub fn for_service_account(
        client: Client,
        account: ServiceAccount,
        project_id: Option<String>,
    ) -> Result<Self, StoreError> {
        let project_id = project_id
            .or_else(|| account.project_id.clone())
            .ok_or_else(|| {
                StoreError::Credentials("no project_id configured or in the key file".to_owned())
            })?;
        let tokens = TokenSource::new(client.clone(), account);
        Ok(Self::new(client, project_id, Auth::ServiceAccount(tokens)))
    }

    /// Use a different endpoint, e.g. `http://localhost:8080` for the emulator.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Use a named database instead of `(default)`.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Project the store writes to.
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn documents_root(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents",
            self.project_id, self.database
        )
    }

    fn url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.base_url).map_err(|err| {
            StoreError::Internal(format!("invalid base url {}: {err}", self.base_url))
        })?;
        let prefix = [
            "v1",
            "projects",
            self.project_id.as_str(),
            "databases",
            self.database.as_str(),
        ];
        url.path_segments_mut()
            .map_err(|()| StoreError::Internal(format!("base url {} cannot hold a path", self.base_url)))?
            .pop_if_empty()
            .extend(prefix.iter().chain(segments));
        Ok(url)
    }

    fn document_url(&self, collection: &str, id: &str) -> Result<Url, StoreError> {
        self.url(&["documents", collection, id])
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, StoreError> {
        match &self.auth {
            Auth::Anonymous => Ok(request),
            Auth::ServiceAccount(tokens) => {
                let token = tokens.token().await.map_err(credentials_error)?;
                Ok(request.bearer_auth(token.expose_secret()))
            }
        }
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let request = self.client.get(self.document_url(collection, id)?);
        let response = self.authorize(request).await?.send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(collection, id, "Document not found");
            return Ok(None);
        }

        let body: Value = ensure_success(response).await?.json().await?;
        Ok(Some(Document {
            id: id.to_owned(),
            fields: decode_fields(body.get("fields"))?,
        }))
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        let mut query: Vec<(&str, String)> = fields
            .keys()
            .map(|name| ("updateMask.fieldPaths", field_path(name)))
            .collect();
        query.push(("currentDocument.exists", "true".to_owned()));

        let request = self
            .client
            .patch(self.document_url(collection, id)?)
            .query(&query)
            .json(&json!({ "fields": encode_fields(&fields) }));
        let response = self.authorize(request).await?.send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound {
                collection: collection.to_owned(),
                id: id.to_owned(),
            });
        }
        ensure_success(response).await?;
        Ok(())
    }

    async fn append(
        &self,
        collection: &str,
        mut fields: Fields,
        timestamp_field: &str,
    ) -> Result<Document, StoreError> {
        let id = Uuid::new_v4().simple().to_string();
        let name = format!("{}/{collection}/{id}", self.documents_root());
        let body = json!({
            "writes": [{
                "update": { "name": name, "fields": encode_fields(&fields) },
                "currentDocument": { "exists": false },
                "updateTransforms": [{
                    "fieldPath": field_path(timestamp_field),
                    "setToServerValue": "REQUEST_TIME",
                }],
            }],
        });

        let request = self
            .client
            .post(self.url(&["documents:commit"])?)
            .json(&body);
        let response = self.authorize(request).await?.send().await?;
        let commit: Value = ensure_success(response).await?.json().await?;

        let timestamp = commit
            .pointer("/writeResults/0/transformResults/0/timestampValue")
            .or_else(|| commit.get("commitTime"))
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Decode("commit response carries no timestamp".to_owned()))?;
        fields.insert(
            timestamp_field.to_owned(),
            FieldValue::Timestamp(decode_timestamp(timestamp)?),
        );

        debug!(collection, id = %id, "Document appended");
        Ok(Document { id, fields })
    }
}

/// Quote a field name unless it is a plain identifier.
fn field_path(name: &str) -> String {
    let mut chars = name.chars();
    let simple = chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|rest| rest.is_ascii_alphanumeric() || rest == '_');
    if simple {
        name.to_owned()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

async fn ensure_success(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|body| {
            body.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_owned)
        })
        .unwrap_or(text);

    Err(StoreError::Status {
        status: status.as_u16(),
        message,
    })
}

fn credentials_error(err: CredentialsError) -> StoreError {
    StoreError::Credentials(err.to_string())
}
