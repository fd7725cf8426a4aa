//! Per-registry differences, expressed as a table rather than separate pipelines.

use crate::collab::Fields;
use crate::document::Document;
use crate::matter::FilingType;

/// How one filing type maps onto registry dates and CRM record fields.
#[derive(Debug)]
pub struct FilingProfile {
    pub filing_type: FilingType,
    pub label: &'static str,
    /// Registry field holding the effective date.
    pub date_field: &'static str,
    /// Registry field used when `date_field` is absent or unparseable.
    pub fallback_date_field: Option<&'static str>,
    pub crm_date_field: &'static str,
    pub crm_description_field: &'static str,
    pub crm_classification_field: Option<&'static str>,
    pub crm_direction_field: Option<&'static str>,
    pub crm_link_field: &'static str,
}

static PATENT: FilingProfile = FilingProfile {
    filing_type: FilingType::Patent,
    label: "Patent",
    date_field: "officialDate",
    fallback_date_field: None,
    crm_date_field: "Patent_Last_Document_Date",
    crm_description_field: "Patent_Last_Document",
    crm_classification_field: Some("Patent_Document_Code"),
    crm_direction_field: Some("Patent_Document_Direction"),
    crm_link_field: "Patent_Document_Link",
};

static TRADEMARK: FilingProfile = FilingProfile {
    filing_type: FilingType::Trademark,
    label: "Trademark",
    date_field: "MailRoomDate",
    fallback_date_field: Some("ScanDateTime"),
    crm_date_field: "Trademark_Last_Document_Date",
    crm_description_field: "Trademark_Last_Document",
    crm_classification_field: None,
    crm_direction_field: None,
    crm_link_field: "Trademark_Document_Link",
};

impl FilingType {
    pub fn profile(&self) -> &'static FilingProfile {
        match self {
            Self::Patent => &PATENT,
            Self::Trademark => &TRADEMARK,
        }
    }
}

impl FilingProfile {
    /// CRM fields describing `document`, pointing at `link`.
    ///
    /// Classification and direction are written only when the profile has a
    /// field for them and the document carries a value.
    pub fn record_fields(&self, document: &Document, link: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert(
            self.crm_date_field.to_string(),
            document.effective_date.to_string(),
        );
        fields.insert(
            self.crm_description_field.to_string(),
            document.description.clone(),
        );
        if let (Some(field), Some(code)) = (self.crm_classification_field, &document.classification)
        {
            fields.insert(field.to_string(), code.clone());
        }
        if let (Some(field), Some(direction)) = (self.crm_direction_field, &document.direction) {
            fields.insert(field.to_string(), direction.clone());
        }
        fields.insert(self.crm_link_field.to_string(), link.to_string());
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patent_doc() -> Document {
        Document {
            effective_date: "2024-03-01".parse().unwrap(),
            description: "Non-Final Rejection".into(),
            classification: Some("CTNF".into()),
            direction: Some("OUTGOING".into()),
            link: "https://registry.test/doc.pdf".into(),
        }
    }

    #[test]
    fn profiles_match_their_type() {
        assert_eq!(FilingType::Patent.profile().filing_type, FilingType::Patent);
        assert_eq!(FilingType::Trademark.profile().filing_type, FilingType::Trademark);
    }

    #[test]
    fn patent_fields_include_code_and_direction() {
        let fields = FilingType::Patent
            .profile()
            .record_fields(&patent_doc(), "https://storage.test/doc.pdf");
        assert_eq!(fields["Patent_Last_Document_Date"], "2024-03-01");
        assert_eq!(fields["Patent_Last_Document"], "Non-Final Rejection");
        assert_eq!(fields["Patent_Document_Code"], "CTNF");
        assert_eq!(fields["Patent_Document_Direction"], "OUTGOING");
        assert_eq!(fields["Patent_Document_Link"], "https://storage.test/doc.pdf");
    }

    #[test]
    fn trademark_fields_drop_patent_only_values() {
        // Even if a trademark document somehow carries a code, there is no field for it.
        let fields = FilingType::Trademark
            .profile()
            .record_fields(&patent_doc(), "https://registry.test/doc.pdf");
        assert_eq!(fields.len(), 3);
        assert_eq!(fields["Trademark_Last_Document_Date"], "2024-03-01");
        assert!(fields.keys().all(|k| k.starts_with("Trademark_")));
    }

    #[test]
    fn missing_code_is_not_written() {
        let mut doc = patent_doc();
        doc.classification = None;
        let fields = FilingType::Patent.profile().record_fields(&doc, &doc.link);
        assert!(!fields.contains_key("Patent_Document_Code"));
    }
}
