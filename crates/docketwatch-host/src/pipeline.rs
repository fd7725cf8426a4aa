//! Side-effect pipeline for one newly discovered document.
//!
//! Steps run in order, each best-effort:
//!
//! 1. Upload the document to durable storage. On failure the source link is
//!    used for the remaining steps.
//! 2. Notify, referencing the (possibly updated) link.
//! 3. Write the document fields to the CRM record.
//! 4. Replay the same data into the CRM-side form flow, only when the CRM has
//!    prospect data for the matter. Bounded by a soft timeout, no retries.
//!
//! A failing step is logged and recorded; later steps still run.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use docketwatch_core::{
    CollabError, Crm, Document, Fields, FormSubmitter, Matter, Notifier, UploadRequest, Uploader,
};
use tracing::{info, warn};

/// The external collaborators the pipeline drives.
#[derive(Clone)]
pub struct Collaborators {
    pub uploader: Arc<dyn Uploader>,
    pub notifier: Arc<dyn Notifier>,
    pub crm: Arc<dyn Crm>,
    pub forms: Arc<dyn FormSubmitter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Upload,
    Notify,
    UpdateRecord,
    SubmitForm,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Notify => "notify",
            Self::UpdateRecord => "update_record",
            Self::SubmitForm => "submit_form",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Done,
    /// Not attempted, or the collaborator is unavailable. Not a failure.
    Skipped(String),
    Failed(String),
}

/// What each step did for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    /// The link the downstream steps referenced.
    pub link: String,
    pub steps: Vec<(Step, StepStatus)>,
}

impl PipelineReport {
    pub fn status(&self, step: Step) -> Option<&StepStatus> {
        self.steps.iter().find(|(s, _)| *s == step).map(|(_, st)| st)
    }

    pub fn failed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|(_, st)| matches!(st, StepStatus::Failed(_)))
            .count()
    }

    pub fn record_updated(&self) -> bool {
        matches!(self.status(Step::UpdateRecord), Some(StepStatus::Done))
    }
}

pub struct SideEffectPipeline {
    collab: Collaborators,
    form_timeout: Duration,
}

impl SideEffectPipeline {
    pub fn new(collab: Collaborators, form_timeout: Duration) -> Self {
        Self {
            collab,
            form_timeout,
        }
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.collab.notifier
    }

    /// Run every step for `document` of `matter`.
    pub async fn run(&self, matter: &Matter, document: &Document) -> PipelineReport {
        let mut steps = Vec::with_capacity(4);

        let (link, upload) = self.upload(matter, document).await;
        steps.push((Step::Upload, upload));

        let notify = self.notify(matter, document, &link).await;
        steps.push((Step::Notify, notify));

        let fields = matter.filing_type.profile().record_fields(document, &link);
        let record = into_status(
            self.collab
                .crm
                .update_external_record(&matter.crm_id, &fields)
                .await,
        );
        steps.push((Step::UpdateRecord, record));

        let form = self.submit_form(matter, &fields).await;
        steps.push((Step::SubmitForm, form));

        let report = PipelineReport { link, steps };
        for (step, status) in &report.steps {
            match status {
                StepStatus::Done => {}
                StepStatus::Skipped(why) => {
                    info!(matter_id = %matter.crm_id, %step, reason = %why, "step skipped")
                }
                StepStatus::Failed(why) => {
                    warn!(matter_id = %matter.crm_id, %step, error = %why, "step failed")
                }
            }
        }
        info!(
            matter_id = %matter.crm_id,
            date = %document.effective_date,
            failed = report.failed_steps(),
            "document pipeline finished"
        );
        report
    }

    async fn upload(&self, matter: &Matter, document: &Document) -> (String, StepStatus) {
        let request = UploadRequest {
            matter,
            document,
            file_name: file_name(matter, document),
        };
        match self.collab.uploader.upload(&request).await {
            Ok(uploaded) => (uploaded.link, StepStatus::Done),
            Err(e) => (document.link.clone(), into_status::<()>(Err(e))),
        }
    }

    async fn notify(&self, matter: &Matter, document: &Document, link: &str) -> StepStatus {
        let profile = matter.filing_type.profile();
        let subject = format!(
            "New {} document: {} ({})",
            profile.label,
            matter.display_name(),
            document.description
        );
        let mut body = vec![
            format!("Matter:       {}", matter.display_name()),
            format!("Application:  {}", matter.application_number),
            format!("CRM id:       {}", matter.crm_id),
            format!("Document:     {}", document.description),
            format!("Date:         {}", document.effective_date),
        ];
        if let Some(code) = &document.classification {
            body.push(format!("Code:         {code}"));
        }
        if let Some(direction) = &document.direction {
            body.push(format!("Direction:    {direction}"));
        }
        body.push(format!("Link:         {link}"));
        into_status(self.collab.notifier.notify(&subject, &body.join("\n")).await)
    }

    async fn submit_form(&self, matter: &Matter, record: &Fields) -> StepStatus {
        let prospect = match self.collab.crm.fetch_external_prospect(&matter.crm_id).await {
            Ok(Some(prospect)) => prospect,
            Ok(None) => return StepStatus::Skipped("no prospect data".into()),
            Err(e) => return StepStatus::Skipped(format!("prospect not fetchable: {e}")),
        };

        let mut fields = prospect;
        fields.extend(record.iter().map(|(k, v)| (k.clone(), v.clone())));

        let submit = self
            .collab
            .forms
            .submit_external_form(&matter.crm_id, &fields);
        match tokio::time::timeout(self.form_timeout, submit).await {
            Ok(result) => into_status(result),
            Err(_) => into_status::<()>(Err(CollabError::TimedOut(self.form_timeout))),
        }
    }
}

fn into_status<T>(result: Result<T, CollabError>) -> StepStatus {
    match result {
        Ok(_) => StepStatus::Done,
        Err(CollabError::Unavailable(what)) => StepStatus::Skipped(format!("{what} unavailable")),
        Err(e) => StepStatus::Failed(e.to_string()),
    }
}

/// Storage file name: `{application}_{date}_{description}.pdf`, with the
/// description reduced to filename-safe characters.
fn file_name(matter: &Matter, document: &Document) -> String {
    let mut slug = String::with_capacity(document.description.len());
    for c in document.description.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_matches('_');
    let slug = if slug.is_empty() { "document" } else { slug };
    format!(
        "{}_{}_{}.pdf",
        matter.application_number, document.effective_date, slug
    )
}
