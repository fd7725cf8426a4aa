//! Outcomes and run reports returned by the processing loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::EffectiveDate;

/// What happened to one matter in one processing attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MatterOutcome {
    /// A batch of novel documents went through the side-effect pipeline.
    Processed {
        date: EffectiveDate,
        documents: usize,
        /// Pipeline steps that failed across the batch.
        failed_steps: usize,
        /// Whether the CRM record update succeeded for every document.
        record_updated: bool,
    },
    /// The registry had nothing newer than the recorded state.
    NoUpdates,
    /// The registry could not be read, or processing faulted.
    Failed { reason: String },
    /// Another attempt for this matter was already running.
    AlreadyProcessing,
    /// No registered matter has this identifier.
    NotFound,
}

impl MatterOutcome {
    pub fn is_success(&self) -> bool {
        match self {
            Self::Processed { record_updated, .. } => *record_updated,
            Self::NoUpdates => true,
            Self::Failed { .. } | Self::AlreadyProcessing | Self::NotFound => false,
        }
    }

    pub fn is_processed(&self) -> bool {
        matches!(self, Self::Processed { .. })
    }

    pub fn is_failure(&self) -> bool {
        match self {
            Self::Processed { record_updated, .. } => !record_updated,
            Self::Failed { .. } => true,
            _ => false,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Processed {
                date,
                documents,
                failed_steps,
                ..
            } => {
                let mut msg = format!("processed {documents} new document(s) dated {date}");
                if *failed_steps > 0 {
                    msg.push_str(&format!(" ({failed_steps} step(s) failed)"));
                }
                msg
            }
            Self::NoUpdates => "no new documents".to_string(),
            Self::Failed { reason } => format!("failed: {reason}"),
            Self::AlreadyProcessing => "already being processed".to_string(),
            Self::NotFound => "matter not found".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatterReport {
    pub matter_id: String,
    #[serde(flatten)]
    pub outcome: MatterOutcome,
}

impl MatterReport {
    pub fn new(matter_id: impl Into<String>, outcome: MatterOutcome) -> Self {
        Self {
            matter_id: matter_id.into(),
            outcome,
        }
    }
}

/// Aggregate result of one full sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    /// Matters with at least one newly processed document.
    pub updated: usize,
    pub documents_processed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Whether the processed-state file was written.
    pub state_saved: bool,
    pub matters: Vec<MatterReport>,
}

impl SweepReport {
    pub fn new(
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        matters: Vec<MatterReport>,
        state_saved: bool,
    ) -> Self {
        let mut report = Self {
            started_at,
            finished_at,
            total: matters.len(),
            updated: 0,
            documents_processed: 0,
            failed: 0,
            skipped: 0,
            state_saved,
            matters: Vec::new(),
        };
        for m in &matters {
            if let MatterOutcome::Processed { documents, .. } = &m.outcome {
                report.updated += 1;
                report.documents_processed += documents;
            }
            if m.outcome.is_failure() {
                report.failed += 1;
            }
            if matches!(
                m.outcome,
                MatterOutcome::AlreadyProcessing | MatterOutcome::NotFound
            ) {
                report.skipped += 1;
            }
        }
        report.matters = matters;
        report
    }

    /// One-line summary for logs and the summary notification subject.
    pub fn headline(&self) -> String {
        format!(
            "{} matter(s) checked, {} updated, {} new document(s), {} failed",
            self.total, self.updated, self.documents_processed, self.failed
        )
    }

    /// Multi-line body for the summary notification.
    pub fn summary_text(&self) -> String {
        let mut lines = vec![
            format!("Sweep started:  {}", self.started_at.to_rfc3339()),
            format!("Sweep finished: {}", self.finished_at.to_rfc3339()),
            format!("Matters checked:      {}", self.total),
            format!("Matters updated:      {}", self.updated),
            format!("Documents processed:  {}", self.documents_processed),
            format!("Failures:             {}", self.failed),
            format!("Skipped:              {}", self.skipped),
        ];
        if !self.state_saved {
            lines.push("WARNING: processed state could not be saved".to_string());
        }
        let notable: Vec<&MatterReport> = self
            .matters
            .iter()
            .filter(|m| !matches!(m.outcome, MatterOutcome::NoUpdates))
            .collect();
        if !notable.is_empty() {
            lines.push(String::new());
            for m in notable {
                lines.push(format!("- {}: {}", m.matter_id, m.outcome.message()));
            }
        }
        lines.join("\n")
    }
}

/// Result of processing an explicit set of matters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetedReport {
    pub success: bool,
    pub message: String,
    pub matters: Vec<MatterReport>,
}

impl TargetedReport {
    pub fn new(matters: Vec<MatterReport>) -> Self {
        let success = !matters.is_empty() && matters.iter().all(|m| m.outcome.is_success());
        let message = match matters.as_slice() {
            [] => "no matters requested".to_string(),
            [single] => single.outcome.message(),
            many => {
                let processed = many.iter().filter(|m| m.outcome.is_processed()).count();
                format!("{processed} of {} matter(s) had new documents", many.len())
            }
        };
        Self {
            success,
            message,
            matters,
        }
    }

    /// True when no targeted matter had novel documents.
    pub fn nothing_new(&self) -> bool {
        !self.matters.iter().any(|m| m.outcome.is_processed())
    }
}

/// Point-in-time view of the process-wide runtime state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RuntimeSnapshot {
    pub active_sweeps: usize,
    pub scheduler_running: bool,
    pub in_flight: Vec<String>,
    pub last_sweep_started: Option<DateTime<Utc>>,
    pub last_sweep_finished: Option<DateTime<Utc>>,
    pub last_report: Option<SweepReport>,
}
