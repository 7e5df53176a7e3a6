//! Local storage port (driven/secondary port)
//!
//! Application-local text storage used for the single crash record slot.
//! Paths are relative to a storage root chosen by the adapter.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific.
//! - Callers on the crash path treat every error as best-effort: they log
//!   and carry on.

use std::path::Path;

/// Port trait for local text storage
pub trait ILocalStorage: Send + Sync {
    /// Whether local storage can be used at all on this platform
    fn is_available(&self) -> bool;

    /// Whether `path` exists
    fn exists(&self, path: &Path) -> bool;

    /// Read the whole file at `path` as UTF-8 text
    fn read_text(&self, path: &Path) -> anyhow::Result<String>;

    /// Write `text` to `path`, appending or replacing its content
    ///
    /// Missing parent directories are created.
    fn write_text(&self, path: &Path, text: &str, append: bool) -> anyhow::Result<()>;

    /// Delete the file at `path`
    fn delete(&self, path: &Path) -> anyhow::Result<()>;
}
