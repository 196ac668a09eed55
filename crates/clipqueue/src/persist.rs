use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// What survives a restart: enough to resume polling a clip that was already
/// acknowledged by the service, or to report one that was not.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistedJob {
    pub id: Uuid,
    pub remote_id: Option<String>,
    pub display_name: String,
    pub target_path: PathBuf,
    pub delete_remote_on_completion: bool,
    pub subject: Option<String>,
}

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed journal: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Best-effort persistence of the active job set. A failed save never touches
/// in-memory state; the store logs it and moves on.
pub trait JobJournal: Send + Sync + 'static {
    fn save(&self, jobs: &[PersistedJob]) -> Result<(), JournalError>;
    fn load(&self) -> Result<Vec<PersistedJob>, JournalError>;
}

/// Journal backed by a single JSON file.
pub struct JsonJournal {
    path: PathBuf,
}

impl JsonJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl JobJournal for JsonJournal {
    fn save(&self, jobs: &[PersistedJob]) -> Result<(), JournalError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(jobs)?;
        fs::write(&self.path, bytes)?;
        Ok(())
    }

    fn load(&self) -> Result<Vec<PersistedJob>, JournalError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Journal that keeps nothing. Used when persistence is disabled and in tests.
pub struct NullJournal;

impl JobJournal for NullJournal {
    fn save(&self, _jobs: &[PersistedJob]) -> Result<(), JournalError> {
        Ok(())
    }

    fn load(&self) -> Result<Vec<PersistedJob>, JournalError> {
        Ok(Vec::new())
    }
}
