//! Processed-state store: last processed document date per application number.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use docketwatch_core::EffectiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::StoreError;
use crate::json::{read_json, write_json_atomic};

/// Mapping of application number to the latest processed document date.
///
/// Entries only ever move forward: [`advance`](Self::advance) ignores dates
/// that are not later than the recorded one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ProcessedState {
    entries: BTreeMap<String, EffectiveDate>,
}

impl ProcessedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_processed(&self, application_number: &str) -> Option<EffectiveDate> {
        self.entries.get(application_number).copied()
    }

    /// Record `date` for `application_number` if it is later than the current
    /// entry. Returns whether the entry changed.
    pub fn advance(&mut self, application_number: &str, date: EffectiveDate) -> bool {
        match self.entries.get_mut(application_number) {
            Some(current) if *current >= date => false,
            Some(current) => {
                *current = date;
                true
            }
            None => {
                self.entries.insert(application_number.to_string(), date);
                true
            }
        }
    }

    /// Fold every entry of `other` into `self` monotonically.
    pub fn merge(&mut self, other: &ProcessedState) -> usize {
        other
            .iter()
            .filter(|(app, date)| self.advance(app, *date))
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, EffectiveDate)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Durable [`ProcessedState`] backed by one JSON object file.
///
/// Read once at the start of a run and committed once at the end.
pub struct ProcessedStateStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ProcessedStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state. Never fails.
    ///
    /// A missing or unreadable file yields an empty state (nothing ever
    /// processed). Individual entries with unparseable dates are dropped.
    pub fn load(&self) -> ProcessedState {
        let raw = match read_json::<BTreeMap<String, String>>(&self.path) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(path = %self.path.display(), "no processed state yet");
                return ProcessedState::default();
            }
            Err(e) => {
                warn!(error = %e, "processed state unreadable, starting empty");
                return ProcessedState::default();
            }
        };

        let (state, rejected) = parse_entries(raw);
        for (app, value) in rejected {
            warn!(application = %app, value = %value, "dropping bad state entry");
        }
        state
    }

    /// Read the stored state for a write. Unlike [`load`](Self::load) any
    /// unreadable content is an error, so a commit never replaces a file it
    /// could not fully understand.
    fn load_strict(&self) -> Result<ProcessedState, StoreError> {
        let Some(raw) = read_json::<BTreeMap<String, String>>(&self.path)? else {
            return Ok(ProcessedState::default());
        };
        let (state, rejected) = parse_entries(raw);
        match rejected.first() {
            None => Ok(state),
            Some((app, value)) => Err(StoreError::Other(format!(
                "{}: bad date {value:?} for {app}, refusing to overwrite",
                self.path.display()
            ))),
        }
    }

    /// Overwrite the stored state with `state`.
    pub fn save(&self, state: &ProcessedState) -> Result<(), StoreError> {
        let _lock = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        write_json_atomic(&self.path, state)
    }

    /// Merge `updates` into whatever is currently stored, then write once.
    ///
    /// Re-reading before the write keeps entries committed by an overlapping
    /// run, and the merge never moves an entry to an earlier date. A stored
    /// file that cannot be read is left untouched and the commit fails.
    pub fn commit(&self, updates: &ProcessedState) -> Result<ProcessedState, StoreError> {
        let _lock = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut state = self.load_strict()?;
        let changed = state.merge(updates);
        if changed > 0 || !self.path.exists() {
            write_json_atomic(&self.path, &state)?;
        }
        info!(changed, entries = state.len(), "processed state committed");
        Ok(state)
    }
}

/// Split raw entries into parsed dates and the `(key, value)` pairs that
/// failed to parse.
fn parse_entries(raw: BTreeMap<String, String>) -> (ProcessedState, Vec<(String, String)>) {
    let mut state = ProcessedState::default();
    let mut rejected = Vec::new();
    for (app, value) in raw {
        match EffectiveDate::parse(&value) {
            Some(date) => {
                state.entries.insert(app, date);
            }
            None => rejected.push((app, value)),
        }
    }
    (state, rejected)
}
