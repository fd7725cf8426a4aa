//! Trademark registry adapter (USPTO TSDR case documents).
//!
//! The effective date is the mailroom date, falling back to the scan date for
//! records that were never mailed.

use async_trait::async_trait;
use docketwatch_core::{Document, DocumentSource, EffectiveDate, Fetched, FilingType, sort_newest_first};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::http::{HttpSettings, SyncError, ensure_success};

const CASE_VIEWER_URL: &str = "https://tsdr.uspto.gov/#caseNumber=";

pub struct TrademarkRegistryClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CaseDocsResponse {
    #[serde(default)]
    document_list: Option<DocumentList>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DocumentList {
    #[serde(default)]
    document: Vec<TrademarkDocumentRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TrademarkDocumentRecord {
    document_type_code: Option<String>,
    document_type_code_description_text: Option<String>,
    mail_room_date: Option<String>,
    scan_date_time: Option<String>,
    url_path_list: Option<UrlPathList>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UrlPathList {
    #[serde(default)]
    url_path: Vec<String>,
}

impl TrademarkRegistryClient {
    pub fn new(settings: &HttpSettings) -> Result<Self, SyncError> {
        Ok(Self {
            client: settings.client()?,
            base_url: settings.trimmed_base(),
            api_key: settings.token.clone(),
        })
    }

    /// Fetch and normalise the case documents for one serial number.
    pub async fn documents(&self, serial_number: &str) -> Result<Vec<Document>, SyncError> {
        let url = format!("{}/ts/cd/casedocs/bundle.json", self.base_url);
        info!(url = %url, serial = %serial_number, "fetching trademark documents");
        let mut req = self
            .client
            .get(&url)
            .query(&[("sn", serial_number)]);
        if let Some(key) = &self.api_key {
            req = req.header("USPTO-API-KEY", key);
        }
        let resp = ensure_success(req.send().await?).await?;
        let body = resp.text().await?;
        let documents = parse_documents(serial_number, &body)?;
        info!(count = documents.len(), "fetched trademark documents");
        Ok(documents)
    }
}

#[async_trait]
impl DocumentSource for TrademarkRegistryClient {
    async fn fetch_documents(
        &self,
        application_number: &str,
        _filing_type: FilingType,
    ) -> Fetched {
        match self.documents(application_number).await {
            Ok(documents) => Fetched::ok(documents),
            Err(e) => {
                warn!(serial = %application_number, error = %e, "trademark registry fetch failed");
                Fetched::failed(e.to_string())
            }
        }
    }
}

/// Normalise a case-documents payload. Records with neither a mailroom nor a
/// scan date are discarded; the result is newest first.
pub fn parse_documents(serial_number: &str, body: &str) -> Result<Vec<Document>, SyncError> {
    let payload: CaseDocsResponse = serde_json::from_str(body)?;
    let profile = FilingType::Trademark.profile();
    let records = payload.document_list.map(|l| l.document).unwrap_or_default();

    let mut documents: Vec<Document> = records
        .into_iter()
        .filter_map(|record| {
            let effective_date = record
                .mail_room_date
                .as_deref()
                .and_then(EffectiveDate::parse)
                .or_else(|| record.scan_date_time.as_deref().and_then(EffectiveDate::parse));
            let Some(effective_date) = effective_date else {
                debug!(
                    field = profile.date_field,
                    code = ?record.document_type_code,
                    "discarding undated trademark document"
                );
                return None;
            };
            let link = record
                .url_path_list
                .and_then(|l| l.url_path.into_iter().find(|p| !p.trim().is_empty()))
                .unwrap_or_else(|| format!("{CASE_VIEWER_URL}{serial_number}&caseType=SERIAL_NO&searchType=documentSearch"));
            let description = record
                .document_type_code_description_text
                .or(record.document_type_code)
                .unwrap_or_else(|| "Untitled document".to_string());
            Some(Document {
                effective_date,
                description,
                classification: None,
                direction: None,
                link,
            })
        })
        .collect();

    sort_newest_first(&mut documents);
    Ok(documents)
}
