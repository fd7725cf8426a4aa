//! Periodic sweep trigger.
//!
//! Each tick spawns a sweep and goes back to waiting; a tick never waits for
//! the previous sweep. Overlapping sweeps are safe because every matter is
//! guarded individually.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::orchestrator::Orchestrator;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// When the scheduler fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cadence {
    /// Fixed interval, measured from the previous tick.
    Every(Duration),
    /// Fixed local wall-clock times, every day.
    DailyAt(Vec<NaiveTime>),
}

impl Cadence {
    pub fn every_minutes(minutes: u64) -> Self {
        Self::Every(Duration::from_secs(minutes.max(1) * 60))
    }

    /// Parse `HH:MM` times. Duplicates are dropped and the list sorted.
    pub fn daily_at<S: AsRef<str>>(times: &[S]) -> Result<Self, chrono::ParseError> {
        let mut parsed = times
            .iter()
            .map(|t| NaiveTime::parse_from_str(t.as_ref().trim(), "%H:%M"))
            .collect::<Result<Vec<_>, _>>()?;
        parsed.sort();
        parsed.dedup();
        Ok(Self::DailyAt(parsed))
    }

    /// Time to wait from local time `now` until the next tick.
    pub fn next_delay(&self, now: NaiveDateTime) -> Duration {
        match self {
            Self::Every(interval) => *interval,
            Self::DailyAt(times) => {
                let Some(first) = times.first() else {
                    return DAY;
                };
                let next = times
                    .iter()
                    .find(|t| **t > now.time())
                    .map(|t| now.date().and_time(*t))
                    .unwrap_or_else(|| (now.date() + TimeDelta::days(1)).and_time(*first));
                (next - now).to_std().unwrap_or(Duration::ZERO)
            }
        }
    }
}

struct Running {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    cadence: Cadence,
    running: Mutex<Option<Running>>,
}

impl Scheduler {
    pub fn new(orchestrator: Arc<Orchestrator>, cadence: Cadence) -> Self {
        Self {
            orchestrator,
            cadence,
            running: Mutex::new(None),
        }
    }

    pub fn cadence(&self) -> &Cadence {
        &self.cadence
    }

    /// Start the timer. Returns `false` if it was already running.
    pub fn start(&self) -> bool {
        let mut running = self.lock();
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return false;
        }
        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(tick_loop(
            self.orchestrator.clone(),
            self.cadence.clone(),
            stop_rx,
        ));
        *running = Some(Running { stop, handle });
        self.orchestrator.runtime().set_scheduler_running(true);
        info!(cadence = ?self.cadence, "scheduler started");
        true
    }

    /// Stop the timer. A sweep already spawned runs to completion.
    /// Returns `false` if it was not running.
    pub fn stop(&self) -> bool {
        let Some(running) = self.lock().take() else {
            return false;
        };
        let _ = running.stop.send(true);
        self.orchestrator.runtime().set_scheduler_running(false);
        info!("scheduler stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    fn lock(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn tick_loop(
    orchestrator: Arc<Orchestrator>,
    cadence: Cadence,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        let delay = cadence.next_delay(Local::now().naive_local());
        debug!(?delay, "next scheduled sweep");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = stop.changed() => break,
        }
        if *stop.borrow() {
            break;
        }

        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            match orchestrator.sweep().await {
                Ok(report) => info!(summary = %report.headline(), "scheduled sweep done"),
                Err(e) => error!(error = %format!("{e:#}"), "scheduled sweep failed"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{OrchestratorConfig, OrchestratorParts, Sources};
    use crate::pipeline::{Collaborators, SideEffectPipeline};
    use crate::runtime::RuntimeState;
    use docketwatch_core::{FixedClock, Unconfigured};
    use docketwatch_store::{MatterRegistry, ProcessedStateStore, StatusFile};

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn orchestrator(dir: &std::path::Path) -> Arc<Orchestrator> {
        let none = Arc::new(Unconfigured("test"));
        Arc::new(Orchestrator::new(OrchestratorParts {
            registry: MatterRegistry::open(dir.join("matters.json")),
            state_store: ProcessedStateStore::new(dir.join("processed_state.json")),
            status_file: StatusFile::new(dir.join("status.json")),
            sources: Sources {
                patent: none.clone(),
                trademark: none.clone(),
            },
            pipeline: SideEffectPipeline::new(
                Collaborators {
                    uploader: none.clone(),
                    notifier: none.clone(),
                    crm: none.clone(),
                    forms: none,
                },
                Duration::from_secs(1),
            ),
            clock: Arc::new(FixedClock::new("2024-03-01".parse().unwrap())),
            runtime: Arc::new(RuntimeState::new()),
            config: OrchestratorConfig::default(),
        }))
    }

    #[test]
    fn every_is_constant() {
        let c = Cadence::every_minutes(15);
        assert_eq!(c.next_delay(at("2024-03-01 10:00")), Duration::from_secs(900));
    }

    #[test]
    fn every_minutes_at_least_one() {
        assert_eq!(Cadence::every_minutes(0), Cadence::Every(Duration::from_secs(60)));
    }

    #[test]
    fn daily_picks_next_time_today() {
        let c = Cadence::daily_at(&["17:30", "08:00"]).unwrap();
        assert_eq!(
            c.next_delay(at("2024-03-01 09:00")),
            Duration::from_secs(8 * 3600 + 30 * 60)
        );
    }

    #[test]
    fn daily_wraps_to_tomorrow() {
        let c = Cadence::daily_at(&["08:00"]).unwrap();
        assert_eq!(c.next_delay(at("2024-03-01 08:00")), DAY);
        assert_eq!(
            c.next_delay(at("2024-03-01 23:00")),
            Duration::from_secs(9 * 3600)
        );
    }

    #[test]
    fn daily_rejects_bad_time() {
        assert!(Cadence::daily_at(&["25:00"]).is_err());
        assert!(Cadence::daily_at(&["noon"]).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn start_stop_toggles_runtime_flag() {
        let tmp = tempfile::TempDir::new().unwrap();
        let orch = orchestrator(tmp.path());
        let scheduler = Scheduler::new(orch.clone(), Cadence::every_minutes(60));

        assert!(scheduler.start());
        assert!(!scheduler.start());
        assert!(scheduler.is_running());
        assert!(orch.runtime().scheduler_running());

        assert!(scheduler.stop());
        assert!(!scheduler.stop());
        assert!(!orch.runtime().scheduler_running());
    }

    #[tokio::test(start_paused = true)]
    async fn tick_runs_a_sweep() {
        let tmp = tempfile::TempDir::new().unwrap();
        let orch = orchestrator(tmp.path());
        let scheduler = Scheduler::new(orch.clone(), Cadence::every_minutes(10));
        scheduler.start();

        tokio::time::sleep(Duration::from_secs(10 * 60 + 1)).await;

        assert!(orch.runtime().snapshot().last_report.is_some());
        scheduler.stop();
    }
}
