//! Snapshot persistence
//!
//! The tree's `{size, depth, side_nodes}` and the append-only leaf list are
//! the only durable state besides spent nullifiers. Everything else is
//! recomputed on load.

use log::info;
use serde::{Deserialize, Serialize};
use shadevault_privacy::FieldElement;
use shadevault_privacy::field::serde_field_vec;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::errors::StorageError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub size: u64,
    pub depth: usize,
    #[serde(with = "serde_field_vec")]
    pub side_nodes: Vec<FieldElement>,
    #[serde(with = "serde_field_vec")]
    pub leaves: Vec<FieldElement>,
    /// Sorted for stable output
    #[serde(with = "serde_field_vec")]
    pub nullifiers: Vec<FieldElement>,
}

impl LedgerSnapshot {
    /// Write atomically: synced temp file in the same directory, then rename
    pub fn write_to(&self, path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = temp_path(path);
        let mut file = File::create(&tmp)?;
        file.write_all(&serde_json::to_vec_pretty(self)?)?;
        file.sync_all()?;
        drop(file);

        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        info!(
            "Persisted ledger snapshot to {}: {} leaves, {} nullifiers",
            path.display(),
            self.leaves.len(),
            self.nullifiers.len()
        );
        Ok(())
    }

    /// `None` when no snapshot exists yet
    pub fn read_from(path: &Path) -> Result<Option<Self>, StorageError> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
