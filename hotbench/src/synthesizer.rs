//! Source synthesis into a workspace

use crate::error::{Error, ErrorKind};
use crate::workspace::Workspace;
use hotbench_gen::{BenchmarkClass, BenchmarkGenerator, FileSystemDestination};
use std::path::PathBuf;

/// What the synthesizer wrote
#[derive(Debug, Clone)]
pub struct GenerationReport {
    /// Harness executable the sources compile into
    pub harness: String,
    /// Generated source files
    pub sources: Vec<PathBuf>,
    /// Generated resource files
    pub resources: Vec<PathBuf>,
    /// Number of benchmarks listed in the registry
    pub benchmarks: usize,
}

/// Generate harness sources, registry and compiler hints for `classes`.
///
/// All generation errors are collected into one
/// [`ErrorKind::Generation`].
pub fn generate(classes: &[BenchmarkClass], workspace: &Workspace) -> Result<GenerationReport, Error> {
    let harness = workspace.harness_name();
    let mut generator = BenchmarkGenerator::new(harness.clone());
    let mut dest = FileSystemDestination::new(workspace.path());

    generator.generate(classes, &mut dest);
    generator.complete(&mut dest);

    if dest.has_errors() {
        let errors = dest.take_errors();
        for error in &errors {
            tracing::debug!(%error, "generation error");
        }
        return Err(ErrorKind::Generation { errors }.into());
    }

    Ok(GenerationReport {
        harness,
        sources: dest.sources().to_vec(),
        resources: dest.resources().to_vec(),
        benchmarks: generator.registry().len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotbench_engine::{BENCHMARK_LIST, BenchmarkList};

    #[test]
    fn test_writes_everything_into_workspace() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(Some(root.path())).unwrap();
        let class = BenchmarkClass::new("sample", "#[benchmark]\nfn run() {}\n");

        let report = generate(&[class], &ws).unwrap();
        assert_eq!(report.benchmarks, 1);
        assert!(report.sources.iter().all(|p| p.starts_with(ws.path())));
        assert!(ws.path().join("harness.rs").is_file());
        assert!(ws.path().join("sample.rs").is_file());

        let registry = BenchmarkList::from_file(ws.path().join(BENCHMARK_LIST)).unwrap();
        assert_eq!(registry.entries()[0].harness, report.harness);
    }

    #[test]
    fn test_errors_are_aggregated() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(Some(root.path())).unwrap();
        let classes = [
            BenchmarkClass::new("one", "#[benchmark]\nfn a(x: u8) {}\n"),
            BenchmarkClass::new("two", "fn (\n"),
        ];

        let err = generate(&classes, &ws).unwrap_err();
        match err.kind() {
            ErrorKind::Generation { errors } => assert_eq!(errors.len(), 2),
            other => panic!("unexpected: {other}"),
        }
    }
}
