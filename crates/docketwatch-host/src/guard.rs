//! In-flight guard: at most one processing attempt per matter at a time.
//!
//! Each matter is `Idle` or `Processing`. [`InFlightGuard::try_acquire`] moves
//! it to `Processing` and hands back a permit; dropping the permit moves it
//! back to `Idle`, whether the attempt returned, failed, or unwound. A second
//! attempt while a permit is live is rejected immediately, never queued.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct InFlightGuard {
    in_flight: Arc<Mutex<BTreeSet<String>>>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `matter_id`, or `None` if it is already being processed.
    pub fn try_acquire(&self, matter_id: &str) -> Option<InFlightPermit> {
        if !self.lock().insert(matter_id.to_string()) {
            debug!(matter_id, "already in flight");
            return None;
        }
        Some(InFlightPermit {
            guard: self.clone(),
            matter_id: matter_id.to_string(),
        })
    }

    pub fn is_processing(&self, matter_id: &str) -> bool {
        self.lock().contains(matter_id)
    }

    /// Matter ids currently being processed, sorted.
    pub fn in_flight(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    // The set is only touched by insert/remove, so a poisoned lock still holds
    // a consistent set.
    fn lock(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Proof that the holder owns the `Processing` state of one matter.
#[derive(Debug)]
pub struct InFlightPermit {
    guard: InFlightGuard,
    matter_id: String,
}

impl InFlightPermit {
    pub fn matter_id(&self) -> &str {
        &self.matter_id
    }
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        self.guard.lock().remove(&self.matter_id);
        debug!(matter_id = %self.matter_id, "released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_rejected_until_release() {
        let guard = InFlightGuard::new();
        let permit = guard.try_acquire("crm-1").unwrap();
        assert!(guard.try_acquire("crm-1").is_none());
        assert!(guard.is_processing("crm-1"));
        drop(permit);
        assert!(!guard.is_processing("crm-1"));
        assert!(guard.try_acquire("crm-1").is_some());
    }

    #[test]
    fn different_matters_independent() {
        let guard = InFlightGuard::new();
        let _a = guard.try_acquire("crm-1").unwrap();
        let _b = guard.try_acquire("crm-2").unwrap();
        assert_eq!(guard.in_flight(), ["crm-1", "crm-2"]);
    }

    #[test]
    fn clones_share_state() {
        let guard = InFlightGuard::new();
        let other = guard.clone();
        let _permit = guard.try_acquire("crm-1").unwrap();
        assert!(other.try_acquire("crm-1").is_none());
    }

    #[test]
    fn released_when_holder_panics() {
        let guard = InFlightGuard::new();
        let inner = guard.clone();
        let result = std::panic::catch_unwind(move || {
            let _permit = inner.try_acquire("crm-1").unwrap();
            panic!("pipeline blew up");
        });
        assert!(result.is_err());
        assert!(!guard.is_processing("crm-1"));
    }
}
