//! Generator Destinations
//!
//! Where generated files go. Write failures never abort generation; they are
//! recorded as [`GenerationError`]s next to the ones found in the classes.

use crate::error::GenerationError;
use std::path::{Component, Path, PathBuf};

/// Sink for generated sources, resources and errors
pub trait GeneratorDestination {
    /// Write a generated source file at `relative`
    fn write_source(&mut self, relative: &str, contents: &str);

    /// Write a generated resource file at `relative`
    fn write_resource(&mut self, relative: &str, contents: &str);

    /// Record a generation error
    fn print_error(&mut self, error: GenerationError);
}

/// Destination rooted at a directory
#[derive(Debug)]
pub struct FileSystemDestination {
    root: PathBuf,
    sources: Vec<PathBuf>,
    resources: Vec<PathBuf>,
    errors: Vec<GenerationError>,
}

impl FileSystemDestination {
    /// Destination writing below `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sources: Vec::new(),
            resources: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Source files written so far
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Resource files written so far
    pub fn resources(&self) -> &[PathBuf] {
        &self.resources
    }

    /// Whether any error was recorded
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Recorded errors, in the order they were found
    pub fn errors(&self) -> &[GenerationError] {
        &self.errors
    }

    /// Take the recorded errors
    pub fn take_errors(&mut self) -> Vec<GenerationError> {
        std::mem::take(&mut self.errors)
    }

    fn write(&mut self, relative: &str, contents: &str) -> Option<PathBuf> {
        let rel = Path::new(relative);
        if rel.as_os_str().is_empty()
            || !rel.components().all(|c| matches!(c, Component::Normal(_)))
        {
            self.errors.push(GenerationError::new(format!(
                "refusing to write `{relative}` outside the destination"
            )));
            return None;
        }

        let path = self.root.join(rel);
        let result = match path.parent() {
            Some(parent) => std::fs::create_dir_all(parent),
            None => Ok(()),
        }
        .and_then(|_| std::fs::write(&path, contents));

        match result {
            Ok(()) => {
                tracing::debug!(path = %path.display(), bytes = contents.len(), "generated file");
                Some(path)
            }
            Err(e) => {
                self.errors.push(GenerationError::new(format!(
                    "failed to write {}: {e}",
                    path.display()
                )));
                None
            }
        }
    }
}

impl GeneratorDestination for FileSystemDestination {
    fn write_source(&mut self, relative: &str, contents: &str) {
        if let Some(path) = self.write(relative, contents) {
            self.sources.push(path);
        }
    }

    fn write_resource(&mut self, relative: &str, contents: &str) {
        if let Some(path) = self.write(relative, contents) {
            self.resources.push(path);
        }
    }

    fn print_error(&mut self, error: GenerationError) {
        self.errors.push(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_below_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut dest = FileSystemDestination::new(dir.path());
        dest.write_source("a.rs", "fn a() {}");
        dest.write_resource("hotbench/BenchmarkList", "");

        assert!(!dest.has_errors());
        assert_eq!(dest.sources(), [dir.path().join("a.rs")]);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.rs")).unwrap(),
            "fn a() {}"
        );
        assert!(dir.path().join("hotbench/BenchmarkList").is_file());
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut dest = FileSystemDestination::new(dir.path());
        dest.write_source("../escape.rs", "");
        dest.write_source("/abs.rs", "");
        dest.write_resource("", "");

        assert_eq!(dest.errors().len(), 3);
        assert!(dest.sources().is_empty());
        assert!(dest.resources().is_empty());
    }

    #[test]
    fn test_write_failure_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blocker"), "").unwrap();
        let mut dest = FileSystemDestination::new(dir.path());
        dest.write_resource("blocker/file", "x");

        assert!(dest.has_errors());
        assert!(dest.take_errors()[0].message.contains("failed to write"));
        assert!(!dest.has_errors());
    }
}
