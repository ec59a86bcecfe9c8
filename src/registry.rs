//! Format registry - resolves files to exactly one backend

use crate::error::{FiberError, Result};
use crate::formats::{default_formats, FiberFormat, FormatId};
use crate::io::{has_extension, list_files};
use crate::metadata::FileSummary;
use crate::patch::Spool;
use crate::window::ReadWindow;
use log::{debug, info, warn};
use std::path::Path;

/// The set of backends known to a process
///
/// Built once at startup and passed by reference to whatever needs format
/// resolution.
pub struct FormatRegistry {
    formats: Vec<Box<dyn FiberFormat>>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl FormatRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            formats: Vec::new(),
        }
    }

    /// Create a registry holding every bundled backend
    pub fn with_defaults() -> Self {
        Self {
            formats: default_formats(),
        }
    }

    /// Add a backend; a second backend with the same name and version is rejected
    pub fn register(&mut self, format: Box<dyn FiberFormat>) -> Result<()> {
        let id = format.id();
        if self.formats.iter().any(|f| f.id() == id) {
            return Err(FiberError::Configuration(format!(
                "format {} is already registered",
                id
            )));
        }
        debug!("registered format {}", id);
        self.formats.push(format);
        Ok(())
    }

    /// Registered backends in registration order
    pub fn formats(&self) -> impl Iterator<Item = &dyn FiberFormat> {
        self.formats.iter().map(|f| f.as_ref())
    }

    /// Backend registered under `name`, optionally pinned to `version`
    pub fn find(&self, name: &str, version: Option<&str>) -> Option<&dyn FiberFormat> {
        self.formats()
            .find(|f| f.name() == name && version.map_or(true, |v| f.version() == v))
    }

    /// Resolve `path` to the single backend that claims it
    ///
    /// Every backend is asked; extension hints only decide which go first.
    /// `Ok(None)` when no backend claims the file (including directories),
    /// `AmbiguousFormat` when more than one does.
    pub fn identify(&self, path: &Path) -> Result<Option<(&dyn FiberFormat, FormatId)>> {
        if !path.is_file() {
            debug!("{} is not a regular file", path.display());
            return Ok(None);
        }

        let (hinted, others): (Vec<_>, Vec<_>) = self
            .formats()
            .partition(|f| has_extension(path, f.preferred_extensions()));

        let mut matches: Vec<(&dyn FiberFormat, FormatId)> = hinted
            .into_iter()
            .chain(others)
            .filter_map(|format| {
                let found = format.identify(path);
                debug!(
                    "identify {} on {}: {}",
                    format.id(),
                    path.display(),
                    found.as_ref().map_or("no match".to_string(), |id| id.to_string())
                );
                found.map(|id| (format, id))
            })
            .collect();

        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            _ => {
                let formats: Vec<String> = matches.iter().map(|(_, id)| id.to_string()).collect();
                warn!(
                    "{} is claimed by several formats: {}",
                    path.display(),
                    formats.join(", ")
                );
                Err(FiberError::AmbiguousFormat {
                    path: path.to_path_buf(),
                    formats,
                })
            }
        }
    }

    /// Name and version of the format of `path`
    pub fn get_format(&self, path: &Path) -> Result<FormatId> {
        self.resolve(path).map(|(_, id)| id)
    }

    /// Summarize every stream in `path` using its backend
    pub fn scan(&self, path: &Path) -> Result<Vec<FileSummary>> {
        let (format, _) = self.resolve(path)?;
        format.scan(path)
    }

    /// Read `path` through its backend, limited to `window`
    pub fn read(&self, path: &Path, window: &ReadWindow) -> Result<Spool> {
        let (format, _) = self.resolve(path)?;
        format.read(path, window)
    }

    /// Scan every recognized file below `dir`
    ///
    /// Unrecognized files are skipped; malformed or ambiguous ones fail the
    /// whole scan.
    pub fn scan_directory(&self, dir: &Path) -> Result<Vec<FileSummary>> {
        let mut summaries = Vec::new();
        let mut skipped = 0usize;

        for path in list_files(dir)? {
            match self.identify(&path)? {
                Some((format, _)) => summaries.extend(format.scan(&path)?),
                None => {
                    debug!("skipping unrecognized file {}", path.display());
                    skipped += 1;
                }
            }
        }

        info!(
            "scanned {}: {} stream(s), {} file(s) skipped",
            dir.display(),
            summaries.len(),
            skipped
        );
        Ok(summaries)
    }

    fn resolve(&self, path: &Path) -> Result<(&dyn FiberFormat, FormatId)> {
        self.identify(path)?
            .ok_or_else(|| FiberError::UnknownFormat(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{DasfFormat, TdasFormat};

    #[test]
    fn test_defaults() {
        let registry = FormatRegistry::with_defaults();
        let names: Vec<_> = registry.formats().map(|f| f.id().to_string()).collect();
        assert_eq!(names, vec!["DASF 1.0", "TDAS 2.1"]);
        assert!(registry.find("TDAS", None).is_some());
        assert!(registry.find("TDAS", Some("1.0")).is_none());
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = FormatRegistry::new();
        registry.register(Box::new(DasfFormat::new())).unwrap();
        registry.register(Box::new(TdasFormat::new())).unwrap();
        let err = registry.register(Box::new(DasfFormat::new())).unwrap_err();
        assert!(matches!(err, FiberError::Configuration(_)));
    }

    #[test]
    fn test_directory_is_no_match() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let registry = FormatRegistry::with_defaults();
        assert!(registry.identify(temp_dir.path()).unwrap().is_none());
        assert!(matches!(
            registry.scan(temp_dir.path()),
            Err(FiberError::UnknownFormat(_))
        ));
    }
}
