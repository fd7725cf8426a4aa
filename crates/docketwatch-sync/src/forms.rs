//! Form automation client.
//!
//! The browser automation that fills the CRM-side web form runs as its own
//! service; this client submits one job and waits for its verdict. No retries:
//! a failure or timeout just marks the form step failed.

use async_trait::async_trait;
use docketwatch_core::{CollabError, Fields, FormSubmitter};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::http::{HttpSettings, SyncError, ensure_success};

pub struct FormAutomationClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Serialize)]
struct SubmissionRequest<'a> {
    matter_id: &'a str,
    fields: &'a Fields,
}

#[derive(Deserialize)]
struct SubmissionResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

impl FormAutomationClient {
    pub fn new(settings: &HttpSettings) -> Result<Self, SyncError> {
        Ok(Self {
            client: settings.client()?,
            base_url: settings.trimmed_base(),
            token: settings.token.clone(),
        })
    }

    /// Returns the service's verdict and message.
    pub async fn submit(&self, matter_id: &str, fields: &Fields) -> Result<(bool, String), SyncError> {
        let url = format!("{}/submissions", self.base_url);
        info!(url = %url, matter_id, "submitting form automation job");
        let mut req = self
            .client
            .post(&url)
            .json(&SubmissionRequest { matter_id, fields });
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = ensure_success(req.send().await?).await?;
        let body: SubmissionResponse = serde_json::from_str(&resp.text().await?)?;
        Ok((body.success, body.message.unwrap_or_default()))
    }
}

#[async_trait]
impl FormSubmitter for FormAutomationClient {
    async fn submit_external_form(
        &self,
        matter_id: &str,
        fields: &Fields,
    ) -> Result<(), CollabError> {
        match self.submit(matter_id, fields).await? {
            (true, _) => Ok(()),
            (false, message) => Err(CollabError::Failed(format!(
                "form automation rejected submission: {message}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_parses_without_message() {
        let body: SubmissionResponse = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(body.success);
        assert!(body.message.is_none());
    }

    #[test]
    fn request_shape() {
        let mut fields = Fields::new();
        fields.insert("Company".into(), "ACME".into());
        let json = serde_json::to_value(SubmissionRequest {
            matter_id: "crm-1",
            fields: &fields,
        })
        .unwrap();
        assert_eq!(json["matter_id"], "crm-1");
        assert_eq!(json["fields"]["Company"], "ACME");
    }
}
