//! In-memory collaborators for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use docketwatch_core::{
    CollabError, Crm, Document, DocumentSource, Fetched, Fields, FilingType, FormSubmitter,
    Notifier, UploadRequest, Uploaded, Uploader, sort_newest_first,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A registry document dated `date` with a placeholder link.
pub fn doc(date: &str, description: &str) -> Document {
    Document {
        effective_date: date.parse().expect("valid test date"),
        description: description.to_string(),
        classification: None,
        direction: None,
        link: format!("https://registry.test/{}.pdf", description.replace(' ', "_")),
    }
}

/// Scripted registry: canned responses per application number.
#[derive(Default)]
pub struct FakeSource {
    responses: Mutex<HashMap<String, Fetched>>,
    panics: Mutex<Vec<String>>,
    calls: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn set_documents(&self, application_number: &str, documents: Vec<Document>) {
        let mut documents = documents;
        sort_newest_first(&mut documents);
        lock(&self.responses).insert(application_number.to_string(), Fetched::ok(documents));
    }

    pub fn fail(&self, application_number: &str, cause: &str) {
        lock(&self.responses).insert(application_number.to_string(), Fetched::failed(cause));
    }

    pub fn panic_on(&self, application_number: &str) {
        lock(&self.panics).push(application_number.to_string());
    }

    /// Application numbers fetched, in call order.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl DocumentSource for FakeSource {
    async fn fetch_documents(
        &self,
        application_number: &str,
        _filing_type: FilingType,
    ) -> Fetched {
        lock(&self.calls).push(application_number.to_string());
        if lock(&self.panics).iter().any(|a| a == application_number) {
            panic!("registry adapter bug for {application_number}");
        }
        lock(&self.responses)
            .get(application_number)
            .cloned()
            .unwrap_or_default()
    }
}

enum UploadMode {
    Working(String),
    Failing,
    Unavailable,
}

pub struct FakeUploader {
    mode: UploadMode,
}

impl FakeUploader {
    /// Uploads succeed with `{base}/{application}/{file_name}`.
    pub fn working(base: &str) -> Self {
        Self {
            mode: UploadMode::Working(base.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self {
            mode: UploadMode::Failing,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            mode: UploadMode::Unavailable,
        }
    }
}

#[async_trait]
impl Uploader for FakeUploader {
    async fn upload(&self, request: &UploadRequest<'_>) -> Result<Uploaded, CollabError> {
        match &self.mode {
            UploadMode::Working(base) => Ok(Uploaded {
                link: format!(
                    "{base}/{}/{}",
                    request.matter.application_number, request.file_name
                ),
            }),
            UploadMode::Failing => Err(CollabError::Failed("storage quota exceeded".into())),
            UploadMode::Unavailable => Err(CollabError::Unavailable("storage".into())),
        }
    }
}

/// Records every sent `(subject, body)`.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    failure: Mutex<Option<String>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        lock(&self.sent).clone()
    }

    pub fn subjects(&self) -> Vec<String> {
        lock(&self.sent).iter().map(|(s, _)| s.clone()).collect()
    }

    pub fn fail_with(&self, cause: &str) {
        *lock(&self.failure) = Some(cause.to_string());
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), CollabError> {
        if let Some(cause) = lock(&self.failure).clone() {
            return Err(CollabError::Failed(cause));
        }
        lock(&self.sent).push((subject.to_string(), body.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeCrm {
    updates: Mutex<Vec<(String, Fields)>>,
    prospects: Mutex<HashMap<String, Fields>>,
    fail_updates: AtomicBool,
}

impl FakeCrm {
    pub fn set_prospect<'a>(
        &self,
        matter_id: &str,
        fields: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) {
        let fields: Fields = fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        lock(&self.prospects).insert(matter_id.to_string(), fields);
    }

    pub fn fail_updates(&self) {
        self.fail_updates.store(true, Ordering::SeqCst);
    }

    pub fn updates(&self) -> Vec<(String, Fields)> {
        lock(&self.updates).clone()
    }
}

#[async_trait]
impl Crm for FakeCrm {
    async fn update_external_record(
        &self,
        matter_id: &str,
        fields: &Fields,
    ) -> Result<(), CollabError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(CollabError::Failed("CRM returned 500".into()));
        }
        lock(&self.updates).push((matter_id.to_string(), fields.clone()));
        Ok(())
    }

    async fn fetch_external_prospect(
        &self,
        matter_id: &str,
    ) -> Result<Option<Fields>, CollabError> {
        Ok(lock(&self.prospects).get(matter_id).cloned())
    }
}

#[derive(Default)]
pub struct FakeForms {
    submissions: Mutex<Vec<(String, Fields)>>,
    delay: Option<Duration>,
}

impl FakeForms {
    /// Each submission takes `delay` before succeeding.
    pub fn slow(delay: Duration) -> Self {
        Self {
            submissions: Mutex::default(),
            delay: Some(delay),
        }
    }

    pub fn submissions(&self) -> Vec<(String, Fields)> {
        lock(&self.submissions).clone()
    }
}

#[async_trait]
impl FormSubmitter for FakeForms {
    async fn submit_external_form(
        &self,
        matter_id: &str,
        fields: &Fields,
    ) -> Result<(), CollabError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        lock(&self.submissions).push((matter_id.to_string(), fields.clone()));
        Ok(())
    }
}
