//! Contracts for the external collaborators the processing loop drives.
//!
//! Implementations live in `docketwatch-sync` (HTTP) and in test fakes; the
//! processing loop only sees these traits.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::document::Document;
use crate::matter::{FilingType, Matter};

/// Structured record fields exchanged with the CRM and form flows.
pub type Fields = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum CollabError {
    /// The collaborator is not configured or reports itself unavailable.
    #[error("{0} unavailable")]
    Unavailable(String),
    #[error("{0}")]
    Failed(String),
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

/// Result of asking a registry for a matter's documents.
///
/// A failed fetch still yields a value: no documents plus the logged cause.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fetched {
    /// Newest first; undated records already discarded.
    pub documents: Vec<Document>,
    pub failure: Option<String>,
}

impl Fetched {
    pub fn ok(documents: Vec<Document>) -> Self {
        Self {
            documents,
            failure: None,
        }
    }

    pub fn failed(cause: impl Into<String>) -> Self {
        Self {
            documents: Vec::new(),
            failure: Some(cause.into()),
        }
    }
}

#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetch every document the registry lists for one application.
    ///
    /// Must not fail: errors are reported through [`Fetched::failure`].
    async fn fetch_documents(&self, application_number: &str, filing_type: FilingType)
    -> Fetched;
}

/// One file to copy into durable storage.
#[derive(Debug, Clone)]
pub struct UploadRequest<'a> {
    pub matter: &'a Matter,
    pub document: &'a Document,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uploaded {
    pub link: String,
}

#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, request: &UploadRequest<'_>) -> Result<Uploaded, CollabError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), CollabError>;
}

#[async_trait]
pub trait Crm: Send + Sync {
    async fn update_external_record(
        &self,
        matter_id: &str,
        fields: &Fields,
    ) -> Result<(), CollabError>;

    /// Prospect data backing the form flow; `None` when the CRM has none.
    async fn fetch_external_prospect(&self, matter_id: &str)
    -> Result<Option<Fields>, CollabError>;
}

#[async_trait]
pub trait FormSubmitter: Send + Sync {
    async fn submit_external_form(&self, matter_id: &str, fields: &Fields)
    -> Result<(), CollabError>;
}

/// Stand-in for a collaborator that has not been configured.
///
/// Every call reports [`CollabError::Unavailable`]; the prospect lookup
/// reports no data so the form step is skipped.
#[derive(Debug, Clone, Copy)]
pub struct Unconfigured(pub &'static str);

#[async_trait]
impl Uploader for Unconfigured {
    async fn upload(&self, _request: &UploadRequest<'_>) -> Result<Uploaded, CollabError> {
        Err(CollabError::Unavailable(self.0.to_string()))
    }
}

#[async_trait]
impl Notifier for Unconfigured {
    async fn notify(&self, subject: &str, _body: &str) -> Result<(), CollabError> {
        tracing::debug!(collaborator = self.0, subject, "notification dropped");
        Err(CollabError::Unavailable(self.0.to_string()))
    }
}

#[async_trait]
impl Crm for Unconfigured {
    async fn update_external_record(
        &self,
        _matter_id: &str,
        _fields: &Fields,
    ) -> Result<(), CollabError> {
        Err(CollabError::Unavailable(self.0.to_string()))
    }

    async fn fetch_external_prospect(
        &self,
        _matter_id: &str,
    ) -> Result<Option<Fields>, CollabError> {
        Ok(None)
    }
}

#[async_trait]
impl FormSubmitter for Unconfigured {
    async fn submit_external_form(
        &self,
        _matter_id: &str,
        _fields: &Fields,
    ) -> Result<(), CollabError> {
        Err(CollabError::Unavailable(self.0.to_string()))
    }
}

#[async_trait]
impl DocumentSource for Unconfigured {
    async fn fetch_documents(
        &self,
        _application_number: &str,
        filing_type: FilingType,
    ) -> Fetched {
        Fetched::failed(format!("{} registry ({filing_type}) unavailable", self.0))
    }
}
