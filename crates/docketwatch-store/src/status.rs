use std::path::{Path, PathBuf};

use docketwatch_core::RuntimeSnapshot;

use crate::StoreError;
use crate::json::{read_json, write_json_atomic};

/// Last-known runtime status, written after every run.
pub struct StatusFile {
    path: PathBuf,
}

impl StatusFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, snapshot: &RuntimeSnapshot) -> Result<(), StoreError> {
        write_json_atomic(&self.path, snapshot)
    }

    pub fn load(&self) -> Result<Option<RuntimeSnapshot>, StoreError> {
        read_json(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let file = StatusFile::new(tmp.path().join("status.json"));
        assert!(file.load().unwrap().is_none());

        let snapshot = RuntimeSnapshot {
            scheduler_running: true,
            in_flight: vec!["crm-1".into()],
            ..Default::default()
        };
        file.save(&snapshot).unwrap();
        assert_eq!(file.load().unwrap(), Some(snapshot));
    }
}
