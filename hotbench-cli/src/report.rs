//! Result files

use crate::config::ResultFormat;
use crate::metadata::RunMetadata;
use hotbench::RunResult;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// JSON result document
#[derive(Debug, Serialize)]
pub struct ResultDocument<'a> {
    /// Host and run details
    pub meta: RunMetadata,
    /// Results in run order
    pub results: &'a [RunResult],
}

/// Render `results` in `format`
pub fn render(results: &[RunResult], format: ResultFormat) -> anyhow::Result<String> {
    match format {
        ResultFormat::Text => Ok(render_text(results)),
        ResultFormat::Json => {
            let document = ResultDocument {
                meta: RunMetadata::collect(),
                results,
            };
            Ok(serde_json::to_string_pretty(&document)?)
        }
    }
}

fn render_text(results: &[RunResult]) -> String {
    let width = results
        .iter()
        .map(|r| r.benchmark.len())
        .chain(std::iter::once("Benchmark".len()))
        .max()
        .unwrap_or(0);

    let mut out = format!(
        "{:<width$}  {:>5}  {:>14}  {:>14}  Units\n",
        "Benchmark", "Cnt", "Score", "Error"
    );
    for result in results {
        out.push_str(&format!(
            "{:<width$}  {:>5}  {:>14.3}  {:>14.3}  {}\n",
            result.benchmark,
            result.statistics.sample_count,
            result.score(),
            result.score_error(),
            result.score_unit()
        ));
    }
    out
}

/// Write `results` to `path` in `format`
pub fn write_results(results: &[RunResult], format: ResultFormat, path: &Path) -> anyhow::Result<()> {
    let rendered = render(results, format)?;
    let mut file = std::fs::File::create(path)
        .map_err(|e| anyhow::anyhow!("cannot create result file {}: {e}", path.display()))?;
    file.write_all(rendered.as_bytes())?;
    tracing::info!(path = %path.display(), %format, results = results.len(), "wrote results");
    Ok(())
}

impl std::fmt::Display for ResultFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultFormat::Text => f.write_str("text"),
            ResultFormat::Json => f.write_str("json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotbench::IterationResult;
    use hotbench_engine::{BenchmarkEntry, Options, compute_summary};

    fn result() -> RunResult {
        let iterations = vec![
            IterationResult { operations: 10, duration_nanos: 100 },
            IterationResult { operations: 10, duration_nanos: 300 },
        ];
        let scores: Vec<f64> = iterations.iter().map(IterationResult::score).collect();
        RunResult {
            benchmark: "sorting::sort_small".to_string(),
            class: "sorting".to_string(),
            method: "sort_small".to_string(),
            params: Options::default().resolve(&BenchmarkEntry::new("sorting", "sort_small", "h")),
            statistics: compute_summary(&scores),
            iterations,
        }
    }

    #[test]
    fn test_text_table() {
        let text = render(&[result()], ResultFormat::Text).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Benchmark"));
        assert!(lines[1].starts_with("sorting::sort_small"));
        assert!(lines[1].contains("20.000"));
        assert!(lines[1].ends_with("ns/op"));
    }

    #[test]
    fn test_json_document() {
        let json = render(&[result()], ResultFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["meta"]["version"], env!("CARGO_PKG_VERSION"));
        assert!(value["meta"]["timestamp"].is_string());
        assert_eq!(value["results"][0]["benchmark"], "sorting::sort_small");
        assert_eq!(value["results"][0]["iterations"].as_array().unwrap().len(), 2);
    }
}
