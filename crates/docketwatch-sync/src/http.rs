//! Shared HTTP plumbing for every client in this crate.

use std::time::Duration;

use docketwatch_core::CollabError;
use thiserror::Error;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0} not configured")]
    Unavailable(String),
}

impl From<SyncError> for CollabError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Unavailable(what) => CollabError::Unavailable(what),
            other => CollabError::Failed(other.to_string()),
        }
    }
}

/// Connection settings for one remote service.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Like `https://api.example.com` (no trailing slash needed).
    pub base_url: String,
    /// API key or bearer token, depending on the service.
    pub token: Option<String>,
    pub timeout: Duration,
}

impl HttpSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn trimmed_base(&self) -> String {
        self.base_url.trim_end_matches('/').to_string()
    }

    pub(crate) fn client(&self) -> Result<reqwest::Client, SyncError> {
        Ok(reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("docketwatch/", env!("CARGO_PKG_VERSION")))
            .build()?)
    }
}

/// Turn a non-2xx response into [`SyncError::Server`] with the body attached.
pub(crate) async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, SyncError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SyncError::Server {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let settings = HttpSettings::new("https://api.example.test///");
        assert_eq!(settings.trimmed_base(), "https://api.example.test");
    }

    #[test]
    fn blank_token_treated_as_absent() {
        let settings = HttpSettings::new("x").with_token(Some("  ".into()));
        assert!(settings.token.is_none());
    }

    #[test]
    fn server_error_maps_to_failed_collab_error() {
        let err: CollabError = SyncError::Server {
            status: 503,
            body: "maintenance".into(),
        }
        .into();
        assert_eq!(err.to_string(), "server returned 503: maintenance");
    }

    #[test]
    fn not_configured_maps_to_unavailable_collab_error() {
        let err = SyncError::Unavailable("email recipients".into());
        assert_eq!(err.to_string(), "email recipients not configured");
        let err: CollabError = err.into();
        assert!(matches!(err, CollabError::Unavailable(ref what) if what == "email recipients"));
    }
}
