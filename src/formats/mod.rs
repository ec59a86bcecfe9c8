//! File format backends
//!
//! Each backend implements [`FiberFormat`]: an identify check that decides whether a
//! file belongs to the format, a header-only scan, and a windowed read. The
//! [`FormatRegistry`](crate::registry::FormatRegistry) drives them without
//! knowing which one produced a file.

use crate::error::{FiberError, Result};
use crate::metadata::FileSummary;
use crate::patch::Spool;
use crate::window::ReadWindow;
use std::fmt;
use std::path::Path;

pub mod dasf;
pub mod tdas;

pub use dasf::DasfFormat;
pub use tdas::TdasFormat;

/// Name and version `identify` reports for a recognized file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormatId {
    pub name: String,
    pub version: String,
}

impl FormatId {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// Shared contract of all format backends
pub trait FiberFormat: Send + Sync {
    /// Stable format name
    fn name(&self) -> &'static str;

    /// Format version handled by this backend
    fn version(&self) -> &'static str;

    /// Extensions commonly used by the format; a hint, never proof
    fn preferred_extensions(&self) -> &'static [&'static str] {
        &[]
    }

    /// Identifier of this backend
    fn id(&self) -> FormatId {
        FormatId::new(self.name(), self.version())
    }

    /// Decide whether `path` belongs to this format
    ///
    /// Never fails: unreadable files, foreign files and directories all
    /// yield `None`. Reads only the file header.
    fn identify(&self, path: &Path) -> Option<FormatId>;

    /// Summarize every stream of the file from its headers alone
    fn scan(&self, path: &Path) -> Result<Vec<FileSummary>>;

    /// Read the samples inside `window`, one patch per stream
    fn read(&self, path: &Path, window: &ReadWindow) -> Result<Spool>;

    /// Write `spool` to `path` in this format
    fn write(&self, _spool: &Spool, _path: &Path) -> Result<()> {
        Err(FiberError::UnsupportedParameter(format!(
            "{} does not support writing",
            self.id()
        )))
    }
}

/// Every backend bundled with the crate
pub fn default_formats() -> Vec<Box<dyn FiberFormat>> {
    vec![Box::new(DasfFormat::new()), Box::new(TdasFormat::new())]
}
