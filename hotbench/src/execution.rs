//! Execution Driver

use crate::error::Error;
use hotbench_engine::{RunResult, Runner};

/// Run `runner` to completion. Engine failures become
/// [`ErrorKind::Execution`](crate::ErrorKind::Execution) with the cause kept.
pub fn run(runner: &mut Runner) -> Result<Vec<RunResult>, Error> {
    let results = runner.run()?;
    tracing::debug!(results = results.len(), "engine returned");
    Ok(results)
}
