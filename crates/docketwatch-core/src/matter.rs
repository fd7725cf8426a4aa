//! Tracked matters: patent and trademark filings under monitoring.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which government registry a matter is filed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilingType {
    Patent,
    Trademark,
}

impl FilingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Patent => "patent",
            Self::Trademark => "trademark",
        }
    }
}

impl fmt::Display for FilingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown filing type: {0} (expected `patent` or `trademark`)")]
pub struct UnknownFilingType(pub String);

impl FromStr for FilingType {
    type Err = UnknownFilingType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patent" => Ok(Self::Patent),
            "trademark" => Ok(Self::Trademark),
            other => Err(UnknownFilingType(other.to_string())),
        }
    }
}

/// Lifecycle labels written to [`Matter::status`].
///
/// The stored status is free text so that external tools may write their own
/// labels; these are the ones the processing loop writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatterStatus {
    /// Freshly registered, never swept.
    Registered,
    /// A processing attempt is underway.
    Processing,
    /// The last attempt processed new documents.
    Completed,
    /// The last attempt found nothing new.
    NoUpdates,
    /// The last attempt could not reach the registry, or a record update failed.
    Failed,
}

impl MatterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "Registered",
            Self::Processing => "Processing…",
            Self::Completed => "Completed",
            Self::NoUpdates => "No Updates",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for MatterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked filing.
///
/// `crm_id` and `application_number` are each unique across the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matter {
    pub crm_id: String,
    pub application_number: String,
    pub filing_type: FilingType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

impl Matter {
    /// Build a newly registered matter. The application number is normalised.
    pub fn new(
        crm_id: impl Into<String>,
        application_number: &str,
        filing_type: FilingType,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            crm_id: crm_id.into().trim().to_string(),
            application_number: normalize_application_number(application_number),
            filing_type,
            title: None,
            status: MatterStatus::Registered.as_str().to_string(),
            updated_at: now,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Human-readable name used in notifications and logs.
    pub fn display_name(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.application_number)
    }
}

/// Position of the matter `id` refers to.
///
/// An exact CRM id match wins over an application number match, so a CRM id
/// that happens to equal another matter's application number still resolves
/// to its own record.
pub fn find_matter(matters: &[Matter], id: &str) -> Option<usize> {
    let id = id.trim();
    matters.iter().position(|m| m.crm_id == id).or_else(|| {
        let app = normalize_application_number(id);
        matters.iter().position(|m| m.application_number == app)
    })
}

/// Normalise an application or serial number for registry lookups.
///
/// Registries print numbers with separators ("16/123,456", "97 123 456");
/// the APIs want bare alphanumerics ("16123456", "97123456").
pub fn normalize_application_number(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}
