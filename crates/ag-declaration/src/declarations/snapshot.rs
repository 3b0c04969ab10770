//! Durable local mirror of the wizard state.
//!
//! The wizard keeps a copy of its state so an interrupted session can pick up
//! where it stopped. Snapshots carry a format version and the step layout they
//! were written under; anything that does not match the running wizard is
//! discarded instead of being partially reused.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::steps::StepLayout;
use super::wizard::WizardState;

/// Key the wizard state is stored under.
pub const SNAPSHOT_KEY: &str = "hawaii-declaration-form";

/// Bump whenever the shape of [`WizardState`] changes.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardSnapshot {
    pub version: u32,
    pub layout: StepLayout,
    pub state: WizardState,
}

impl WizardSnapshot {
    pub fn new(layout: StepLayout, state: WizardState) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            layout,
            state,
        }
    }

    /// Whether this snapshot can seed a wizard running `layout`.
    pub fn fits(&self, layout: StepLayout) -> bool {
        self.version == SNAPSHOT_VERSION
            && self.layout == layout
            && (1..=layout.total_steps()).contains(&self.state.current_step)
    }
}

/// Key/value storage for serialized snapshots.
pub trait SnapshotStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, SnapshotError>;
    fn save(&self, key: &str, contents: &str) -> Result<(), SnapshotError>;
    fn clear(&self, key: &str) -> Result<(), SnapshotError>;
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self, key: &str) -> Result<Option<String>, SnapshotError> {
        match fs::read_to_string(self.path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(SnapshotError::Io(error)),
        }
    }

    fn save(&self, key: &str, contents: &str) -> Result<(), SnapshotError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path(key), contents)?;
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), SnapshotError> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(SnapshotError::Io(error)),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self, key: &str) -> Result<Option<String>, SnapshotError> {
        let entries = self.entries.lock().map_err(|_| SnapshotError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, contents: &str) -> Result<(), SnapshotError> {
        let mut entries = self.entries.lock().map_err(|_| SnapshotError::Poisoned)?;
        entries.insert(key.to_string(), contents.to_string());
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), SnapshotError> {
        let mut entries = self.entries.lock().map_err(|_| SnapshotError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot io failed: {0}")]
    Io(#[from] io::Error),
    #[error("snapshot encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("snapshot store lock poisoned")]
    Poisoned,
}

/// Load the stored snapshot for `layout`, discarding anything stale or unreadable.
pub fn restore(store: &dyn SnapshotStore, layout: StepLayout) -> Option<WizardState> {
    let contents = match store.load(SNAPSHOT_KEY) {
        Ok(Some(contents)) => contents,
        Ok(None) => return None,
        Err(error) => {
            warn!(%error, "wizard snapshot could not be read");
            return None;
        }
    };

    match serde_json::from_str::<WizardSnapshot>(&contents) {
        Ok(snapshot) if snapshot.fits(layout) => Some(snapshot.state),
        Ok(snapshot) => {
            warn!(
                stored_version = snapshot.version,
                stored_layout = snapshot.layout.as_str(),
                layout = layout.as_str(),
                "discarding wizard snapshot from another step layout"
            );
            discard(store);
            None
        }
        Err(error) => {
            warn!(%error, "discarding unreadable wizard snapshot");
            discard(store);
            None
        }
    }
}

/// Write the snapshot. Failures are logged and otherwise ignored.
pub fn persist(store: &dyn SnapshotStore, layout: StepLayout, state: &WizardState) {
    let snapshot = WizardSnapshot::new(layout, state.clone());
    let result = serde_json::to_string(&snapshot)
        .map_err(SnapshotError::from)
        .and_then(|contents| store.save(SNAPSHOT_KEY, &contents));
    if let Err(error) = result {
        warn!(%error, "wizard snapshot could not be written");
    }
}

pub fn discard(store: &dyn SnapshotStore) {
    if let Err(error) = store.clear(SNAPSHOT_KEY) {
        warn!(%error, "wizard snapshot could not be cleared");
    }
}
