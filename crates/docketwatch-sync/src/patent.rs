//! Patent registry adapter (USPTO Open Data Portal document list).

use async_trait::async_trait;
use docketwatch_core::{Document, DocumentSource, EffectiveDate, Fetched, FilingType, sort_newest_first};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::http::{HttpSettings, SyncError, ensure_success};

/// Landing page used when a record has no direct download link.
const FILE_WRAPPER_URL: &str = "https://patentcenter.uspto.gov/applications";

pub struct PatentRegistryClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentsResponse {
    #[serde(default)]
    document_bag: Vec<PatentDocumentRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PatentDocumentRecord {
    official_date: Option<String>,
    document_code: Option<String>,
    document_code_description_text: Option<String>,
    direction_category: Option<String>,
    #[serde(default)]
    download_option_bag: Vec<DownloadOption>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadOption {
    mime_type_identifier: Option<String>,
    download_url: Option<String>,
}

impl PatentRegistryClient {
    pub fn new(settings: &HttpSettings) -> Result<Self, SyncError> {
        Ok(Self {
            client: settings.client()?,
            base_url: settings.trimmed_base(),
            api_key: settings.token.clone(),
        })
    }

    /// Fetch and normalise the document list for one application.
    pub async fn documents(&self, application_number: &str) -> Result<Vec<Document>, SyncError> {
        let url = format!(
            "{}/api/v1/patent/applications/{}/documents",
            self.base_url, application_number
        );
        info!(url = %url, "fetching patent documents");
        let mut req = self.client.get(&url);
        if let Some(key) = &self.api_key {
            req = req.header("X-API-KEY", key);
        }
        let resp = ensure_success(req.send().await?).await?;
        let body = resp.text().await?;
        let documents = parse_documents(application_number, &body)?;
        info!(count = documents.len(), "fetched patent documents");
        Ok(documents)
    }
}

#[async_trait]
impl DocumentSource for PatentRegistryClient {
    async fn fetch_documents(
        &self,
        application_number: &str,
        _filing_type: FilingType,
    ) -> Fetched {
        match self.documents(application_number).await {
            Ok(documents) => Fetched::ok(documents),
            Err(e) => {
                warn!(application = %application_number, error = %e, "patent registry fetch failed");
                Fetched::failed(e.to_string())
            }
        }
    }
}

/// Normalise a document-list payload. Records without a parseable official
/// date are discarded; the result is newest first.
pub fn parse_documents(application_number: &str, body: &str) -> Result<Vec<Document>, SyncError> {
    let payload: DocumentsResponse = serde_json::from_str(body)?;
    let profile = FilingType::Patent.profile();

    let mut documents: Vec<Document> = payload
        .document_bag
        .into_iter()
        .filter_map(|record| {
            let Some(effective_date) = record.official_date.as_deref().and_then(EffectiveDate::parse)
            else {
                debug!(
                    field = profile.date_field,
                    code = ?record.document_code,
                    "discarding undated patent document"
                );
                return None;
            };
            let link = pick_download(&record.download_option_bag)
                .unwrap_or_else(|| format!("{FILE_WRAPPER_URL}/{application_number}/ifw/docs"));
            let description = record
                .document_code_description_text
                .or_else(|| record.document_code.clone())
                .unwrap_or_else(|| "Untitled document".to_string());
            Some(Document {
                effective_date,
                description,
                classification: record.document_code,
                direction: record.direction_category,
                link,
            })
        })
        .collect();

    sort_newest_first(&mut documents);
    Ok(documents)
}

/// Prefer the PDF rendition, else whatever is offered first.
fn pick_download(options: &[DownloadOption]) -> Option<String> {
    let usable = || options.iter().filter(|o| o.download_url.is_some());
    usable()
        .find(|o| {
            o.mime_type_identifier
                .as_deref()
                .is_some_and(|m| m.eq_ignore_ascii_case("PDF"))
        })
        .or_else(|| usable().next())
        .and_then(|o| o.download_url.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "count": 4,
        "documentBag": [
            {
                "applicationNumberText": "16123456",
                "officialDate": "2024-02-15T00:00:00.000-0500",
                "documentIdentifier": "LX1",
                "documentCode": "CTNF",
                "documentCodeDescriptionText": "Non-Final Rejection",
                "directionCategory": "OUTGOING",
                "downloadOptionBag": [
                    { "mimeTypeIdentifier": "XML", "downloadUrl": "https://api.uspto.test/LX1.xml" },
                    { "mimeTypeIdentifier": "PDF", "downloadUrl": "https://api.uspto.test/LX1.pdf" }
                ]
            },
            {
                "officialDate": "2024-03-01T00:00:00.000-0500",
                "documentCode": "N417",
                "documentCodeDescriptionText": "EFS Acknowledgment Receipt",
                "directionCategory": "INCOMING",
                "downloadOptionBag": []
            },
            {
                "documentCode": "WFEE",
                "documentCodeDescriptionText": "Fee Worksheet"
            },
            {
                "officialDate": "not a date",
                "documentCode": "XXXX"
            }
        ]
    }"#;

    #[test]
    fn undated_records_discarded_and_sorted_newest_first() {
        let docs = parse_documents("16123456", FIXTURE).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].effective_date.to_string(), "2024-03-01");
        assert_eq!(docs[1].effective_date.to_string(), "2024-02-15");
    }

    #[test]
    fn code_direction_and_pdf_link_carried() {
        let docs = parse_documents("16123456", FIXTURE).unwrap();
        let rejection = &docs[1];
        assert_eq!(rejection.description, "Non-Final Rejection");
        assert_eq!(rejection.classification.as_deref(), Some("CTNF"));
        assert_eq!(rejection.direction.as_deref(), Some("OUTGOING"));
        assert_eq!(rejection.link, "https://api.uspto.test/LX1.pdf");
    }

    #[test]
    fn missing_download_falls_back_to_file_wrapper() {
        let docs = parse_documents("16123456", FIXTURE).unwrap();
        assert_eq!(
            docs[0].link,
            "https://patentcenter.uspto.gov/applications/16123456/ifw/docs"
        );
    }

    #[test]
    fn empty_bag_is_empty_list() {
        assert!(parse_documents("1", "{}").unwrap().is_empty());
    }

    #[test]
    fn malformed_payload_is_error() {
        assert!(matches!(
            parse_documents("1", "<html>502</html>"),
            Err(SyncError::Json(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_registry_reports_failure_not_error() {
        let settings = HttpSettings::new("http://127.0.0.1:9")
            .with_timeout(std::time::Duration::from_secs(2));
        let client = PatentRegistryClient::new(&settings).unwrap();
        let fetched = client.fetch_documents("16123456", FilingType::Patent).await;
        assert!(fetched.documents.is_empty());
        assert!(fetched.failure.is_some());
    }
}
