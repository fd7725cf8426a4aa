//! Novelty filter: which fetched documents count as unseen.
//!
//! # Policy
//!
//! - A matter with a recorded last-processed date `D` treats a document as
//!   novel only when its date is strictly after `D`. Equality is not novel, so
//!   a date is processed at most once after it has been recorded.
//! - A matter that has never been processed treats only documents dated today
//!   or later as novel. Registering a matter does not replay its backlog.
//! - Of the novel documents, only the latest date is processed in one run,
//!   and every document sharing that date is processed as one batch.

use chrono::NaiveDate;

use crate::document::{Document, EffectiveDate};

/// Decide whether a single document date is unseen.
pub fn is_novel(
    document_date: EffectiveDate,
    last_processed: Option<EffectiveDate>,
    today: NaiveDate,
) -> bool {
    match last_processed {
        Some(last) => document_date > last,
        None => document_date.date() >= today,
    }
}

/// Every document sharing the latest novel date.
#[derive(Debug, Clone, PartialEq)]
pub struct NovelBatch {
    pub date: EffectiveDate,
    pub documents: Vec<Document>,
}

/// Select the batch of documents to process for one matter, if any.
///
/// Input order is preserved within the batch.
pub fn select_novel_batch(
    documents: Vec<Document>,
    last_processed: Option<EffectiveDate>,
    today: NaiveDate,
) -> Option<NovelBatch> {
    let date = documents
        .iter()
        .map(|d| d.effective_date)
        .filter(|&d| is_novel(d, last_processed, today))
        .max()?;

    let documents: Vec<Document> = documents
        .into_iter()
        .filter(|d| d.effective_date == date)
        .collect();

    Some(NovelBatch { date, documents })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> EffectiveDate {
        s.parse().unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn doc(d: &str, description: &str) -> Document {
        Document {
            effective_date: date(d),
            description: description.into(),
            classification: None,
            direction: None,
            link: String::new(),
        }
    }

    #[test]
    fn recorded_matter_requires_strictly_later_date() {
        let last = Some(date("2024-03-01"));
        assert!(!is_novel(date("2024-02-28"), last, today()));
        assert!(!is_novel(date("2024-03-01"), last, today()));
        assert!(is_novel(date("2024-03-02"), last, today()));
    }

    #[test]
    fn recorded_matter_ignores_today() {
        // A recorded entry older than today still admits documents before today.
        let last = Some(date("2024-01-10"));
        assert!(is_novel(date("2024-02-01"), last, today()));
    }

    #[test]
    fn fresh_matter_starts_from_today() {
        assert!(!is_novel(date("2024-02-29"), None, today()));
        assert!(is_novel(date("2024-03-01"), None, today()));
        assert!(is_novel(date("2024-03-05"), None, today()));
    }

    #[test]
    fn fresh_matter_processes_only_todays_document() {
        let docs = vec![doc("2024-03-01", "office action"), doc("2024-02-15", "receipt")];
        let batch = select_novel_batch(docs, None, today()).unwrap();
        assert_eq!(batch.date, date("2024-03-01"));
        assert_eq!(batch.documents.len(), 1);
        assert_eq!(batch.documents[0].description, "office action");
    }

    #[test]
    fn refetch_of_recorded_date_yields_nothing() {
        let docs = vec![doc("2024-03-01", "office action")];
        assert!(select_novel_batch(docs, Some(date("2024-03-01")), today()).is_none());
    }

    #[test]
    fn shared_latest_date_is_one_batch() {
        let docs = vec![
            doc("2024-03-04", "notice"),
            doc("2024-03-04", "fee worksheet"),
            doc("2024-03-02", "earlier"),
        ];
        let batch = select_novel_batch(docs, Some(date("2024-03-01")), today()).unwrap();
        assert_eq!(batch.date, date("2024-03-04"));
        let names: Vec<_> = batch.documents.iter().map(|d| d.description.as_str()).collect();
        assert_eq!(names, ["notice", "fee worksheet"]);
    }

    #[test]
    fn batch_date_is_latest_regardless_of_input_order() {
        let docs = vec![doc("2024-03-02", "a"), doc("2024-03-09", "b"), doc("2024-03-05", "c")];
        let batch = select_novel_batch(docs, Some(date("2024-03-01")), today()).unwrap();
        assert_eq!(batch.date, date("2024-03-09"));
        assert_eq!(batch.documents.len(), 1);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(select_novel_batch(Vec::new(), None, today()).is_none());
    }
}
