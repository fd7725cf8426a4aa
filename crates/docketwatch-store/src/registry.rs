//! Matter registry: the durable list of tracked filings.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use docketwatch_core::{Matter, find_matter};
use tracing::info;

use crate::StoreError;
use crate::json::{read_json, write_json_atomic};

/// JSON-array-backed list of [`Matter`] records.
///
/// Every mutation is a read-modify-write of the whole file, serialised within
/// the process by an internal lock.
pub struct MatterRegistry {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl MatterRegistry {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All registered matters, in registration order. A missing file is empty.
    pub fn list(&self) -> Result<Vec<Matter>, StoreError> {
        Ok(read_json(&self.path)?.unwrap_or_default())
    }

    /// Look a matter up by CRM id or application number, CRM id first.
    pub fn get(&self, id: &str) -> Result<Matter, StoreError> {
        let mut matters = self.list()?;
        let idx = find_matter(&matters, id)
            .ok_or_else(|| StoreError::MatterNotFound(id.to_string()))?;
        Ok(matters.swap_remove(idx))
    }

    /// Add a matter. Its CRM id and application number must not collide with
    /// either identifier of an existing matter.
    pub fn register(&self, matter: Matter) -> Result<Matter, StoreError> {
        if matter.crm_id.is_empty() || matter.application_number.is_empty() {
            return Err(StoreError::Other(
                "CRM id and application number are required".into(),
            ));
        }
        self.mutate(|matters| {
            if matters
                .iter()
                .any(|m| m.crm_id == matter.crm_id || m.application_number == matter.crm_id)
            {
                return Err(StoreError::DuplicateCrmId(matter.crm_id.clone()));
            }
            if matters.iter().any(|m| {
                m.application_number == matter.application_number
                    || m.crm_id == matter.application_number
            }) {
                return Err(StoreError::DuplicateApplication(
                    matter.application_number.clone(),
                ));
            }
            matters.push(matter.clone());
            Ok(())
        })?;
        info!(
            crm_id = %matter.crm_id,
            application = %matter.application_number,
            filing_type = %matter.filing_type,
            "matter registered"
        );
        Ok(matter)
    }

    /// Set the display status of the matter with CRM id `crm_id` and stamp
    /// `updated_at`. Application numbers are not accepted here.
    pub fn update_status(
        &self,
        crm_id: &str,
        status: &str,
        at: DateTime<Utc>,
    ) -> Result<Matter, StoreError> {
        self.mutate(|matters| {
            let matter = matters
                .iter_mut()
                .find(|m| m.crm_id == crm_id)
                .ok_or_else(|| StoreError::MatterNotFound(crm_id.to_string()))?;
            matter.status = status.to_string();
            matter.updated_at = at;
            Ok(matter.clone())
        })
    }

    /// Remove a matter. Used by management tooling only.
    pub fn remove(&self, id: &str) -> Result<Matter, StoreError> {
        let removed = self.mutate(|matters| {
            let idx = find_matter(matters, id)
                .ok_or_else(|| StoreError::MatterNotFound(id.to_string()))?;
            Ok(matters.remove(idx))
        })?;
        info!(crm_id = %removed.crm_id, "matter removed");
        Ok(removed)
    }

    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Vec<Matter>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _lock = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut matters = self.list()?;
        let out = f(&mut matters)?;
        write_json_atomic(&self.path, &matters)?;
        Ok(out)
    }
}
