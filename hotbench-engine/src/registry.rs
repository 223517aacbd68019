//! Benchmark Registry
//!
//! The registry lists every benchmark a harness executable can run. It is
//! stored as JSON Lines: one [`BenchmarkEntry`] per line, with blank lines and
//! lines starting with `#` ignored. An empty file is an empty registry.

use crate::error::RegistryError;
use crate::BENCHMARK_LIST;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A single runnable benchmark
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkEntry {
    /// Unique identifier, `<class>::<method>`
    pub id: String,
    /// Class (source unit) the benchmark was declared in
    pub class: String,
    /// Benchmark method name
    pub method: String,
    /// Name of the executable that hosts this benchmark
    pub harness: String,
    /// Declared fork count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forks: Option<u32>,
    /// Declared warmup iteration count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warmup_iterations: Option<u32>,
    /// Declared warmup iteration time in nanoseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warmup_time_ns: Option<u64>,
    /// Declared measurement iteration count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement_iterations: Option<u32>,
    /// Declared measurement iteration time in nanoseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement_time_ns: Option<u64>,
}

impl BenchmarkEntry {
    /// Create an entry with no declared execution settings
    pub fn new(class: &str, method: &str, harness: &str) -> Self {
        Self {
            id: format!("{class}::{method}"),
            class: class.to_string(),
            method: method.to_string(),
            harness: harness.to_string(),
            forks: None,
            warmup_iterations: None,
            warmup_time_ns: None,
            measurement_iterations: None,
            measurement_time_ns: None,
        }
    }
}

/// Ordered collection of registry entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BenchmarkList {
    entries: Vec<BenchmarkEntry>,
}

impl BenchmarkList {
    /// Build a registry from entries, keeping their order
    pub fn new(entries: Vec<BenchmarkEntry>) -> Self {
        Self { entries }
    }

    /// Load the registry stored at `path`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse registry text
    pub fn parse(content: &str) -> Result<Self, RegistryError> {
        let mut entries = Vec::new();
        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let entry = serde_json::from_str(line).map_err(|source| {
                RegistryError::MalformedEntry {
                    line: index + 1,
                    source,
                }
            })?;
            entries.push(entry);
        }
        Ok(Self { entries })
    }

    /// Render the registry in its on-disk format
    pub fn to_text(&self) -> Result<String, RegistryError> {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&serde_json::to_string(entry).map_err(RegistryError::Serialize)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Write the registry to `path`, creating parent directories
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), RegistryError> {
        let path = path.as_ref();
        let text = self.to_text()?;
        let write_err = |source| RegistryError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, text).map_err(write_err)
    }

    /// Load the registry bundled next to the current executable.
    ///
    /// This is the conventional location a build step would populate:
    /// `<exe dir>/hotbench/BenchmarkList`.
    pub fn default_list() -> Result<Self, RegistryError> {
        Self::from_file(default_resource(BENCHMARK_LIST)?)
    }

    /// All entries, in registry order
    pub fn entries(&self) -> &[BenchmarkEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry lists no benchmarks
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose id matches any of `includes` (all entries when empty),
    /// sorted by id for deterministic execution.
    pub fn select(&self, includes: &[regex::Regex]) -> Vec<&BenchmarkEntry> {
        let mut selected: Vec<_> = self
            .entries
            .iter()
            .filter(|e| includes.is_empty() || includes.iter().any(|re| re.is_match(&e.id)))
            .collect();
        selected.sort_by(|a, b| a.id.cmp(&b.id));
        selected
    }
}

/// Resolve an engine resource relative to the current executable's directory
pub(crate) fn default_resource(relative: &str) -> Result<PathBuf, RegistryError> {
    let exe = std::env::current_exe().map_err(|e| RegistryError::NoResourceRoot(e.to_string()))?;
    let dir = exe
        .parent()
        .ok_or_else(|| RegistryError::NoResourceRoot(exe.display().to_string()))?;
    Ok(dir.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(class: &str, method: &str) -> BenchmarkEntry {
        BenchmarkEntry::new(class, method, "harness")
    }

    #[test]
    fn test_parse_skips_blank_and_comment_lines() {
        let text = "# generated\n\n{\"id\":\"a::b\",\"class\":\"a\",\"method\":\"b\",\"harness\":\"h\",\"forks\":2}\n";
        let list = BenchmarkList::parse(text).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.entries()[0].id, "a::b");
        assert_eq!(list.entries()[0].forks, Some(2));
        assert_eq!(list.entries()[0].warmup_iterations, None);
    }

    #[test]
    fn test_empty_text_is_empty_registry() {
        let list = BenchmarkList::parse("").unwrap();
        assert!(list.is_empty());
        assert_eq!(list.to_text().unwrap(), "");
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let text = "{\"id\":\"a::b\",\"class\":\"a\",\"method\":\"b\",\"harness\":\"h\"}\nnot json\n";
        match BenchmarkList::parse(text) {
            Err(RegistryError::MalformedEntry { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_write_then_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(BENCHMARK_LIST);
        let mut first = entry("parse", "small");
        first.measurement_iterations = Some(3);
        let list = BenchmarkList::new(vec![first, entry("parse", "large")]);

        list.write_to(&path).unwrap();
        let loaded = BenchmarkList::from_file(&path).unwrap();
        assert_eq!(loaded, list);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = BenchmarkList::from_file(dir.path().join("absent"));
        assert!(matches!(result, Err(RegistryError::Read { .. })));
    }

    #[test]
    fn test_select_filters_and_sorts() {
        let list = BenchmarkList::new(vec![
            entry("zeta", "run"),
            entry("alpha", "run"),
            entry("alpha", "skip"),
        ]);

        let all = list.select(&[]);
        let ids: Vec<_> = all.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["alpha::run", "alpha::skip", "zeta::run"]);

        let re = regex::Regex::new("::run$").unwrap();
        let runs = list.select(&[re]);
        let ids: Vec<_> = runs.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["alpha::run", "zeta::run"]);
    }
}
