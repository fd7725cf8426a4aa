//! Run orchestrator: drives matters through guard, registry fetch, novelty
//! filter, and side-effect pipeline.
//!
//! Two entry points share the per-matter logic:
//!
//! - [`Orchestrator::sweep`] walks the whole registry, pausing between
//!   matters, and sends one summary notification.
//! - [`Orchestrator::process_targeted`] handles an explicit set of matter ids
//!   and sends a single "no updates" notification only when none of them had
//!   anything new.
//!
//! Processed state is read once when a run starts and committed once when it
//! ends. Matters run strictly one after another; a failure or panic in one
//! matter is recorded and the run moves on.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use docketwatch_core::{
    Clock, DocumentSource, EffectiveDate, FilingType, Matter, MatterOutcome, MatterReport,
    MatterStatus, Notifier, SweepReport, TargetedReport, find_matter, select_novel_batch,
};
use docketwatch_store::{MatterRegistry, ProcessedState, ProcessedStateStore, StatusFile};
use futures::FutureExt;
use tracing::{error, info, warn};

use crate::pipeline::SideEffectPipeline;
use crate::runtime::RuntimeState;

/// Registry adapters, one per filing type.
#[derive(Clone)]
pub struct Sources {
    pub patent: Arc<dyn DocumentSource>,
    pub trademark: Arc<dyn DocumentSource>,
}

impl Sources {
    pub fn for_type(&self, filing_type: FilingType) -> &dyn DocumentSource {
        match filing_type {
            FilingType::Patent => self.patent.as_ref(),
            FilingType::Trademark => self.trademark.as_ref(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Pause between matters within one run.
    pub inter_matter_delay: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            inter_matter_delay: Duration::from_secs(2),
        }
    }
}

/// Everything the orchestrator is built from.
pub struct OrchestratorParts {
    pub registry: MatterRegistry,
    pub state_store: ProcessedStateStore,
    pub status_file: StatusFile,
    pub sources: Sources,
    pub pipeline: SideEffectPipeline,
    pub clock: Arc<dyn Clock>,
    pub runtime: Arc<RuntimeState>,
    pub config: OrchestratorConfig,
}

pub struct Orchestrator {
    registry: MatterRegistry,
    state_store: ProcessedStateStore,
    status_file: StatusFile,
    sources: Sources,
    pipeline: SideEffectPipeline,
    clock: Arc<dyn Clock>,
    runtime: Arc<RuntimeState>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(parts: OrchestratorParts) -> Self {
        Self {
            registry: parts.registry,
            state_store: parts.state_store,
            status_file: parts.status_file,
            sources: parts.sources,
            pipeline: parts.pipeline,
            clock: parts.clock,
            runtime: parts.runtime,
            config: parts.config,
        }
    }

    pub fn registry(&self) -> &MatterRegistry {
        &self.registry
    }

    pub fn state_store(&self) -> &ProcessedStateStore {
        &self.state_store
    }

    pub fn runtime(&self) -> &Arc<RuntimeState> {
        &self.runtime
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    fn notifier(&self) -> &Arc<dyn Notifier> {
        self.pipeline.notifier()
    }

    /// Process every registered matter once.
    pub async fn sweep(&self) -> anyhow::Result<SweepReport> {
        let started_at = self.clock.now();
        let ticket = self.runtime.begin_sweep(started_at);

        let matters = self.registry.list().context("loading matter registry")?;
        info!(total = matters.len(), "sweep started");

        let (reports, state_saved) = self.run_batch(&matters).await;
        let report = SweepReport::new(started_at, self.clock.now(), reports, state_saved);
        info!(
            total = report.total,
            updated = report.updated,
            documents = report.documents_processed,
            failed = report.failed,
            skipped = report.skipped,
            "sweep finished"
        );

        let subject = format!("Docket sweep: {}", report.headline());
        if let Err(e) = self.notifier().notify(&subject, &report.summary_text()).await {
            warn!(error = %e, "sweep summary notification failed");
        }

        self.runtime.record_report(report.clone());
        drop(ticket);
        self.save_status();
        Ok(report)
    }

    /// Process an explicit set of matters, by CRM id or application number.
    ///
    /// Duplicate ids are processed once; unknown ids report `NotFound`.
    pub async fn process_targeted(&self, ids: &[String]) -> anyhow::Result<TargetedReport> {
        let registered = self.registry.list().context("loading matter registry")?;

        let mut wanted: Vec<&str> = Vec::with_capacity(ids.len());
        for id in ids.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
            if !wanted.contains(&id) {
                wanted.push(id);
            }
        }

        let mut missing = Vec::new();
        let mut matters = Vec::new();
        for id in &wanted {
            match find_matter(&registered, id).map(|i| &registered[i]) {
                Some(m) if !matters.iter().any(|x: &Matter| x.crm_id == m.crm_id) => {
                    matters.push(m.clone())
                }
                Some(_) => {}
                None => missing.push(MatterReport::new(*id, MatterOutcome::NotFound)),
            }
        }
        info!(requested = wanted.len(), found = matters.len(), "targeted run started");

        let (mut reports, _) = self.run_batch(&matters).await;
        reports.extend(missing);
        let report = TargetedReport::new(reports);

        let checked = report
            .matters
            .iter()
            .any(|m| matches!(m.outcome, MatterOutcome::NoUpdates));
        if report.nothing_new() && checked {
            self.notify_no_updates(&report).await;
        }

        self.save_status();
        Ok(report)
    }

    /// Process a single matter.
    pub async fn process_one(&self, id: &str) -> anyhow::Result<TargetedReport> {
        self.process_targeted(&[id.to_string()]).await
    }

    /// Run `matters` in order with the inter-matter delay, then commit state
    /// once. Returns the per-matter reports and whether the commit succeeded.
    async fn run_batch(&self, matters: &[Matter]) -> (Vec<MatterReport>, bool) {
        let baseline = self.state_store.load();
        let mut updates = ProcessedState::new();
        let mut reports = Vec::with_capacity(matters.len());

        for (i, matter) in matters.iter().enumerate() {
            if i > 0 && !self.config.inter_matter_delay.is_zero() {
                tokio::time::sleep(self.config.inter_matter_delay).await;
            }
            let last = baseline.last_processed(&matter.application_number);
            let outcome = self.process_matter(matter, last).await;
            if let MatterOutcome::Processed { date, .. } = &outcome {
                updates.advance(&matter.application_number, *date);
            }
            info!(matter_id = %matter.crm_id, outcome = %outcome.message(), "matter done");
            reports.push(MatterReport::new(matter.crm_id.clone(), outcome));
        }

        let saved = match self.state_store.commit(&updates) {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, "failed to commit processed state");
                false
            }
        };
        (reports, saved)
    }

    /// Guard one matter and run it, turning errors and panics into `Failed`.
    ///
    /// `baseline` is the entry read when the run started; an overlapping run
    /// may have processed the matter since, so the later of the two is used.
    async fn process_matter(
        &self,
        matter: &Matter,
        baseline: Option<EffectiveDate>,
    ) -> MatterOutcome {
        let Some(_permit) = self.runtime.guard().try_acquire(&matter.crm_id) else {
            info!(matter_id = %matter.crm_id, "skipping, already being processed");
            return MatterOutcome::AlreadyProcessing;
        };
        let last = baseline.max(self.runtime.last_processed(&matter.application_number));

        let attempt = AssertUnwindSafe(self.attempt(matter, last))
            .catch_unwind()
            .await;
        match attempt {
            Ok(Ok(outcome)) => {
                if let MatterOutcome::Processed { date, .. } = &outcome {
                    self.runtime
                        .record_processed(&matter.application_number, *date);
                }
                outcome
            }
            Ok(Err(e)) => {
                error!(matter_id = %matter.crm_id, error = %format!("{e:#}"), "matter processing failed");
                self.set_status(matter, MatterStatus::Failed);
                MatterOutcome::Failed {
                    reason: format!("{e:#}"),
                }
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(matter_id = %matter.crm_id, panic = %reason, "matter processing panicked");
                self.set_status(matter, MatterStatus::Failed);
                MatterOutcome::Failed { reason }
            }
        }
    }

    async fn attempt(
        &self,
        matter: &Matter,
        last: Option<EffectiveDate>,
    ) -> anyhow::Result<MatterOutcome> {
        self.registry
            .update_status(&matter.crm_id, MatterStatus::Processing.as_str(), self.clock.now())
            .context("marking matter as processing")?;

        let fetched = self
            .sources
            .for_type(matter.filing_type)
            .fetch_documents(&matter.application_number, matter.filing_type)
            .await;
        if let Some(cause) = fetched.failure {
            self.set_status(matter, MatterStatus::Failed);
            return Ok(MatterOutcome::Failed { reason: cause });
        }

        let Some(batch) = select_novel_batch(fetched.documents, last, self.clock.today()) else {
            self.set_status(matter, MatterStatus::NoUpdates);
            return Ok(MatterOutcome::NoUpdates);
        };

        info!(
            matter_id = %matter.crm_id,
            date = %batch.date,
            documents = batch.documents.len(),
            "new documents found"
        );
        let mut failed_steps = 0;
        let mut record_updated = true;
        for document in &batch.documents {
            let report = self.pipeline.run(matter, document).await;
            failed_steps += report.failed_steps();
            record_updated &= report.record_updated();
        }

        let status = if record_updated {
            MatterStatus::Completed
        } else {
            MatterStatus::Failed
        };
        self.set_status(matter, status);
        Ok(MatterOutcome::Processed {
            date: batch.date,
            documents: batch.documents.len(),
            failed_steps,
            record_updated,
        })
    }

    /// Best-effort terminal status write.
    fn set_status(&self, matter: &Matter, status: MatterStatus) {
        if let Err(e) = self
            .registry
            .update_status(&matter.crm_id, status.as_str(), self.clock.now())
        {
            warn!(matter_id = %matter.crm_id, %status, error = %e, "failed to write matter status");
        }
    }

    async fn notify_no_updates(&self, report: &TargetedReport) {
        let body = report
            .matters
            .iter()
            .map(|m| format!("- {}: {}", m.matter_id, m.outcome.message()))
            .collect::<Vec<_>>()
            .join("\n");
        let subject = format!("No updates found ({} matter(s) checked)", report.matters.len());
        if let Err(e) = self.notifier().notify(&subject, &body).await {
            warn!(error = %e, "no-updates notification failed");
        }
    }

    fn save_status(&self) {
        if let Err(e) = self.status_file.save(&self.runtime.snapshot()) {
            warn!(error = %e, "failed to snapshot runtime status");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic".to_string()
    }
}
