//! CRM record client.
//!
//! Talks to the CRM's REST surface: `PATCH /matters/{id}` to write document
//! fields and `GET /matters/{id}/prospect` to read the form-flow prospect.

use async_trait::async_trait;
use docketwatch_core::{CollabError, Crm, Fields};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::http::{HttpSettings, SyncError, ensure_success};

pub struct CrmClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Serialize)]
struct UpdateRequest<'a> {
    fields: &'a Fields,
}

#[derive(Deserialize)]
struct ProspectResponse {
    #[serde(default)]
    fields: Option<Fields>,
}

impl CrmClient {
    pub fn new(settings: &HttpSettings) -> Result<Self, SyncError> {
        Ok(Self {
            client: settings.client()?,
            base_url: settings.trimmed_base(),
            token: settings.token.clone(),
        })
    }

    fn authorised(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    pub async fn update_record(&self, matter_id: &str, fields: &Fields) -> Result<(), SyncError> {
        let url = format!("{}/matters/{}", self.base_url, matter_id);
        info!(url = %url, fields = fields.len(), "updating CRM record");
        let req = self.authorised(self.client.patch(&url)).json(&UpdateRequest { fields });
        ensure_success(req.send().await?).await?;
        Ok(())
    }

    pub async fn prospect(&self, matter_id: &str) -> Result<Option<Fields>, SyncError> {
        let url = format!("{}/matters/{}/prospect", self.base_url, matter_id);
        let resp = self.authorised(self.client.get(&url)).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            debug!(matter_id, "no CRM prospect");
            return Ok(None);
        }
        let body = ensure_success(resp).await?.text().await?;
        parse_prospect(&body)
    }
}

/// A prospect with no fields, or an explicit `null`, counts as absent.
pub fn parse_prospect(body: &str) -> Result<Option<Fields>, SyncError> {
    let parsed: Option<ProspectResponse> = serde_json::from_str(body)?;
    Ok(parsed.and_then(|p| p.fields).filter(|f| !f.is_empty()))
}

#[async_trait]
impl Crm for CrmClient {
    async fn update_external_record(
        &self,
        matter_id: &str,
        fields: &Fields,
    ) -> Result<(), CollabError> {
        Ok(self.update_record(matter_id, fields).await?)
    }

    async fn fetch_external_prospect(
        &self,
        matter_id: &str,
    ) -> Result<Option<Fields>, CollabError> {
        Ok(self.prospect(matter_id).await?)
    }
}
