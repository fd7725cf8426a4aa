//! Filing-registry documents and their effective dates.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// The authoritative calendar date of a document, compared for novelty.
///
/// Rendered as `YYYY-MM-DD`, so ordering matches lexicographic ordering of the
/// rendered strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EffectiveDate(NaiveDate);

impl EffectiveDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Parse a registry date string.
    ///
    /// Accepts anything whose first ten characters are `YYYY-MM-DD`:
    /// "2024-03-01", "2024-03-01T00:00:00.000-0500", "2024-03-01-05:00".
    /// Returns `None` for anything else.
    pub fn parse(raw: &str) -> Option<Self> {
        let head = raw.trim().get(..10)?;
        NaiveDate::parse_from_str(head, DATE_FORMAT).ok().map(Self)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for EffectiveDate {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for EffectiveDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}

impl FromStr for EffectiveDate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid date '{s}'; expected YYYY-MM-DD"))
    }
}

impl Serialize for EffectiveDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EffectiveDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A single filing-registry record, normalised across registries.
///
/// Documents are fetched fresh each run and never persisted individually.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub effective_date: EffectiveDate,
    pub description: String,
    /// Registry document code (patents only).
    pub classification: Option<String>,
    /// Incoming / outgoing / internal (patents only).
    pub direction: Option<String>,
    /// Source download link at the registry.
    pub link: String,
}

/// Sort documents newest first. Stable, so registry order breaks ties.
pub fn sort_newest_first(documents: &mut [Document]) {
    documents.sort_by(|a, b| b.effective_date.cmp(&a.effective_date));
}
