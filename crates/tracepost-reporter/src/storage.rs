//! Local crash record storage
//!
//! [`LocalFileStorage`] is the file-backed [`ILocalStorage`] adapter, rooted
//! at an application-local directory (`storage.root` in the configuration).
//! [`StorageSlot`] is the single well-known location of the pending crash
//! record; every slot operation is best-effort.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, error};
use tracepost_core::domain::SlotPath;
use tracepost_core::ports::ILocalStorage;

// ============================================================================
// LocalFileStorage
// ============================================================================

/// File-backed local storage rooted at a directory.
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    /// Creates a storage rooted at `root`. The directory is created lazily.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Returns the storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

impl ILocalStorage for LocalFileStorage {
    fn is_available(&self) -> bool {
        self.root.is_dir() || std::fs::create_dir_all(&self.root).is_ok()
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).is_file()
    }

    fn read_text(&self, path: &Path) -> anyhow::Result<String> {
        let full = self.resolve(path);
        std::fs::read_to_string(&full).with_context(|| format!("reading {}", full.display()))
    }

    fn write_text(&self, path: &Path, text: &str, append: bool) -> anyhow::Result<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&full)
            .with_context(|| format!("opening {}", full.display()))?;
        file.write_all(text.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    fn delete(&self, path: &Path) -> anyhow::Result<()> {
        let full = self.resolve(path);
        std::fs::remove_file(&full).with_context(|| format!("deleting {}", full.display()))
    }
}

// ============================================================================
// StorageSlot
// ============================================================================

/// The single storage location holding at most one pending crash record.
///
/// Every operation logs and swallows storage errors: the slot is used while
/// the process is already dying, so there is nobody to report them to.
#[derive(Clone)]
pub struct StorageSlot {
    storage: Arc<dyn ILocalStorage>,
    slot: SlotPath,
    path: PathBuf,
}

/// What [`StorageSlot::delete_if_unchanged`] found in the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotDeletion {
    /// The slot held the expected record and was removed
    Deleted,
    /// The slot holds a different, newer record
    Replaced,
    /// Nothing was stored, or storage is unavailable
    Absent,
}

impl StorageSlot {
    pub fn new(storage: Arc<dyn ILocalStorage>, slot: SlotPath) -> Self {
        let path = slot.relative_path();
        Self {
            storage,
            slot,
            path,
        }
    }

    /// Location of the slot, relative to the storage root.
    pub fn slot_path(&self) -> &SlotPath {
        &self.slot
    }

    /// Returns the pending record, if storage is available and the slot exists.
    pub fn read(&self) -> Option<String> {
        if !self.storage.is_available() || !self.storage.exists(&self.path) {
            return None;
        }

        match self.storage.read_text(&self.path) {
            Ok(text) => Some(text),
            Err(e) => {
                error!(slot = %self.slot, error = %e, "Failed to read crash record from disk");
                None
            }
        }
    }

    /// Replaces the slot content with `text`.
    pub fn write(&self, text: &str) {
        if let Err(e) = self.storage.write_text(&self.path, text, false) {
            error!(slot = %self.slot, error = %e, "Failed to store crash record");
        }
    }

    /// Removes the slot if storage is available and it exists.
    pub fn delete(&self) {
        if let Err(e) = self.try_delete() {
            error!(slot = %self.slot, error = %e, "Failed to delete crash record");
        }
    }

    /// Removes the slot only if it still holds `expected`.
    ///
    /// A slot holding other text belongs to a newer crash and is left alone.
    pub fn delete_if_unchanged(&self, expected: &str) -> anyhow::Result<SlotDeletion> {
        if !self.storage.is_available() || !self.storage.exists(&self.path) {
            return Ok(SlotDeletion::Absent);
        }

        let current = self.storage.read_text(&self.path)?;
        if current != expected {
            debug!(slot = %self.slot, "Slot holds a newer crash record, keeping it");
            return Ok(SlotDeletion::Replaced);
        }

        self.storage.delete(&self.path)?;
        Ok(SlotDeletion::Deleted)
    }

    fn try_delete(&self) -> anyhow::Result<()> {
        if self.storage.is_available() && self.storage.exists(&self.path) {
            self.storage.delete(&self.path)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for StorageSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageSlot")
            .field("slot", &self.slot)
            .finish()
    }
}
