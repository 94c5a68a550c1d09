//! Persisted review checkpoint.
//!
//! The engine keeps its seen set in memory only; what survives between CLI
//! runs is the caller-owned keep-list and a little bookkeeping, stored as
//! JSON next to the user's other app data.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use photo_triage::core::AssetId;

/// Review checkpoint persisted between CLI runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewState {
    /// Whether a scan has ever completed against this state file
    #[serde(default)]
    pub has_scanned: bool,
    /// Ids the user chose to keep; excluded from every future page
    #[serde(default)]
    pub kept: HashSet<AssetId>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ReviewState {
    /// Load the checkpoint, falling back to a fresh one if the file is
    /// missing or unreadable. A corrupt checkpoint is not worth aborting a
    /// review over.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "ignoring corrupt state file");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Write the checkpoint, stamping `updated_at`.
    pub fn save(&mut self, path: &Path) -> std::io::Result<()> {
        self.updated_at = Some(Utc::now());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, json)
    }

    pub fn keep(&mut self, id: AssetId) {
        self.kept.insert(id);
    }
}

/// Default location: `<data dir>/photo-triage/state.json`.
pub fn default_state_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("photo-triage")
        .join("state.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn state_round_trips_through_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut state = ReviewState::default();
        state.has_scanned = true;
        state.keep(AssetId::new("Camera/IMG_0001.jpg"));
        state.save(&path).unwrap();

        let loaded = ReviewState::load(&path);
        assert!(loaded.has_scanned);
        assert!(loaded.kept.contains(&AssetId::new("Camera/IMG_0001.jpg")));
        assert!(loaded.updated_at.is_some());
    }

    #[test]
    fn missing_or_corrupt_files_fall_back_to_default() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nowhere.json");
        assert!(!ReviewState::load(&missing).has_scanned);

        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, "{not json").unwrap();
        let state = ReviewState::load(&corrupt);
        assert!(state.kept.is_empty());
    }
}
