//! Process-wide runtime state.
//!
//! Created once at startup and shared by the orchestrator, the scheduler, and
//! the trigger surface. The in-flight set is only changed through
//! [`InFlightGuard`] permits.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use docketwatch_core::{EffectiveDate, RuntimeSnapshot, SweepReport};
use docketwatch_store::ProcessedState;

use crate::guard::InFlightGuard;

#[derive(Debug, Default)]
struct Flags {
    active_sweeps: usize,
    scheduler_running: bool,
    last_sweep_started: Option<DateTime<Utc>>,
    last_sweep_finished: Option<DateTime<Utc>>,
    last_report: Option<SweepReport>,
}

#[derive(Debug, Default)]
pub struct RuntimeState {
    guard: InFlightGuard,
    flags: Mutex<Flags>,
    /// Dates processed by any run in this process, updated as each matter
    /// finishes rather than when its run commits.
    processed: Mutex<ProcessedState>,
}

impl RuntimeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guard(&self) -> &InFlightGuard {
        &self.guard
    }

    /// Mark a sweep as running until the returned ticket is dropped.
    pub fn begin_sweep(&self, at: DateTime<Utc>) -> SweepTicket<'_> {
        let mut flags = self.flags();
        flags.active_sweeps += 1;
        flags.last_sweep_started = Some(at);
        SweepTicket { state: self }
    }

    pub fn active_sweeps(&self) -> usize {
        self.flags().active_sweeps
    }

    pub fn record_report(&self, report: SweepReport) {
        let mut flags = self.flags();
        flags.last_sweep_finished = Some(report.finished_at);
        flags.last_report = Some(report);
    }

    pub fn set_scheduler_running(&self, running: bool) {
        self.flags().scheduler_running = running;
    }

    pub fn scheduler_running(&self) -> bool {
        self.flags().scheduler_running
    }

    /// Record that `application_number` has been processed up to `date`.
    pub fn record_processed(&self, application_number: &str, date: EffectiveDate) {
        self.processed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .advance(application_number, date);
    }

    /// Latest date processed in this process, including runs not yet committed.
    pub fn last_processed(&self, application_number: &str) -> Option<EffectiveDate> {
        self.processed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_processed(application_number)
    }

    pub fn snapshot(&self) -> RuntimeSnapshot {
        let flags = self.flags();
        RuntimeSnapshot {
            active_sweeps: flags.active_sweeps,
            scheduler_running: flags.scheduler_running,
            in_flight: self.guard.in_flight(),
            last_sweep_started: flags.last_sweep_started,
            last_sweep_finished: flags.last_sweep_finished,
            last_report: flags.last_report.clone(),
        }
    }

    fn flags(&self) -> MutexGuard<'_, Flags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Decrements the active sweep count on drop.
pub struct SweepTicket<'a> {
    state: &'a RuntimeState,
}

impl Drop for SweepTicket<'_> {
    fn drop(&mut self) {
        let mut flags = self.state.flags();
        flags.active_sweeps = flags.active_sweeps.saturating_sub(1);
    }
}
