//! Fork Supervision
//!
//! A fork is one process of a harness executable, resolved through the
//! current search path and driven over stdin/stdout with the line protocol.
//! A reader thread forwards the fork's stdout so every wait can be bounded
//! by the per-fork timeout.

use crate::error::RunnerError;
use crate::format::{IterationPhase, OutputFormat};
use crate::hints::CompilerHints;
use crate::protocol::{ProtocolError, SupervisorCommand, WorkerMessage};
use crate::result::IterationResult;
use crate::{HINTS_ENV, PROTOCOL_VERSION};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

/// Argument that switches a harness executable into fork mode
pub(crate) const FORK_FLAG: &str = "--hotbench-fork";

/// How one fork's benchmark run ended
#[derive(Debug, Clone, PartialEq)]
pub enum ForkOutcome {
    /// All iterations ran; holds the measurement iterations
    Completed(Vec<IterationResult>),
    /// The benchmark body failed inside the fork
    Failed(String),
}

/// A running harness fork
pub struct ForkHandle {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Receiver<std::io::Result<String>>,
    harness: String,
}

impl ForkHandle {
    /// Launch `harness` from the search path and wait for its greeting.
    ///
    /// The fork receives `hints` through its environment.
    pub fn spawn(
        harness: &str,
        hints: &CompilerHints,
        timeout: Duration,
        format: &mut dyn OutputFormat,
    ) -> Result<Self, RunnerError> {
        let path = which::which(harness).map_err(|source| RunnerError::HarnessNotFound {
            harness: harness.to_string(),
            source,
        })?;
        let spawn_err = |source| RunnerError::Spawn {
            harness: harness.to_string(),
            source,
        };

        tracing::debug!(harness = %path.display(), hints = hints.len(), "spawning fork");
        let mut child = Command::new(&path)
            .arg(FORK_FLAG)
            .env(HINTS_ENV, hints.to_env_value())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(spawn_err)?;

        let stdin = child.stdin.take();
        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(spawn_err(std::io::Error::other("fork stdout was not captured")));
            }
        };

        let (tx, rx) = mpsc::channel();
        let reader = std::thread::Builder::new()
            .name(format!("hotbench-fork-{}", child.id()))
            .spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            });
        if let Err(e) = reader {
            let _ = child.kill();
            let _ = child.wait();
            return Err(spawn_err(e));
        }

        let mut handle = Self {
            child,
            stdin,
            lines: rx,
            harness: harness.to_string(),
        };
        handle.wait_for_hello(hints.len(), timeout, format)?;
        Ok(handle)
    }

    fn wait_for_hello(
        &mut self,
        expected_hints: usize,
        timeout: Duration,
        format: &mut dyn OutputFormat,
    ) -> Result<(), RunnerError> {
        let deadline = Instant::now() + timeout;
        let harness = self.harness.clone();
        match self.next_message(&harness, deadline, timeout, format)? {
            WorkerMessage::Hello {
                version,
                hint_count,
            } => {
                if version != PROTOCOL_VERSION {
                    return Err(ProtocolError::VersionMismatch {
                        expected: PROTOCOL_VERSION,
                        found: version,
                    }
                    .into());
                }
                if hint_count != expected_hints {
                    return Err(ProtocolError::HintCountMismatch {
                        expected: expected_hints,
                        found: hint_count,
                    }
                    .into());
                }
                Ok(())
            }
            other => Err(ProtocolError::Unexpected(other.to_string()).into()),
        }
    }

    /// Run one benchmark on this fork.
    ///
    /// Iterations are reported to `format` as they arrive. The whole run,
    /// warmup included, must finish within `timeout` or the fork is killed.
    pub fn run(
        &mut self,
        command: &SupervisorCommand,
        timeout: Duration,
        format: &mut dyn OutputFormat,
    ) -> Result<ForkOutcome, RunnerError> {
        let (benchmark, expected) = match command {
            SupervisorCommand::Run {
                benchmark,
                measurement_iterations,
                ..
            } => (benchmark.clone(), *measurement_iterations as usize),
            SupervisorCommand::Shutdown => {
                return Err(ProtocolError::Unexpected(command.to_string()).into());
            }
        };

        self.send(command, &benchmark)?;
        let deadline = Instant::now() + timeout;
        let mut measured = Vec::new();

        loop {
            match self.next_message(&benchmark, deadline, timeout, format)? {
                WorkerMessage::Warmup {
                    index,
                    operations,
                    nanos,
                } => {
                    let result = IterationResult {
                        operations,
                        duration_nanos: nanos,
                    };
                    format.iteration(IterationPhase::Warmup, index, &result);
                }
                WorkerMessage::Measure {
                    index,
                    operations,
                    nanos,
                } => {
                    let result = IterationResult {
                        operations,
                        duration_nanos: nanos,
                    };
                    format.iteration(IterationPhase::Measurement, index, &result);
                    measured.push(result);
                }
                WorkerMessage::Complete { .. } => {
                    if measured.len() != expected {
                        return Err(ProtocolError::IterationCount {
                            expected,
                            found: measured.len(),
                        }
                        .into());
                    }
                    return Ok(ForkOutcome::Completed(measured));
                }
                WorkerMessage::Failure { message } => return Ok(ForkOutcome::Failed(message)),
                hello @ WorkerMessage::Hello { .. } => {
                    return Err(ProtocolError::Unexpected(hello.to_string()).into());
                }
            }
        }
    }

    /// Ask the fork to exit and reap it
    pub fn shutdown(mut self) -> Result<(), RunnerError> {
        let harness = self.harness.clone();
        self.send(&SupervisorCommand::Shutdown, &harness)?;
        // Closing stdin lets a fork that missed the command exit on EOF.
        self.stdin = None;
        self.child.wait().map_err(|source| RunnerError::Spawn {
            harness: self.harness.clone(),
            source,
        })?;
        Ok(())
    }

    fn send(&mut self, command: &SupervisorCommand, benchmark: &str) -> Result<(), RunnerError> {
        let crashed = |e: std::io::Error| RunnerError::ForkCrashed {
            benchmark: benchmark.to_string(),
            message: format!("could not send command: {e}"),
        };
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| crashed(std::io::Error::from(std::io::ErrorKind::BrokenPipe)))?;
        writeln!(stdin, "{command}").map_err(crashed)?;
        stdin.flush().map_err(crashed)
    }

    fn next_message(
        &mut self,
        benchmark: &str,
        deadline: Instant,
        timeout: Duration,
        format: &mut dyn OutputFormat,
    ) -> Result<WorkerMessage, RunnerError> {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.lines.recv_timeout(remaining) {
                // Workers start every message on a fresh line.
                Ok(Ok(line)) if line.is_empty() => {}
                Ok(Ok(line)) => match WorkerMessage::parse_line(&line)? {
                    Some(message) => return Ok(message),
                    None => format.fork_output(&line),
                },
                Ok(Err(e)) => {
                    return Err(RunnerError::ForkCrashed {
                        benchmark: benchmark.to_string(),
                        message: format!("unreadable fork output: {e}"),
                    });
                }
                Err(RecvTimeoutError::Timeout) => {
                    tracing::warn!(%benchmark, ?timeout, "fork timed out, killing it");
                    self.kill();
                    return Err(RunnerError::Timeout {
                        benchmark: benchmark.to_string(),
                        timeout,
                    });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    let message = match self.child.wait() {
                        Ok(status) => format!("fork exited with {status}"),
                        Err(e) => format!("fork exited: {e}"),
                    };
                    return Err(RunnerError::ForkCrashed {
                        benchmark: benchmark.to_string(),
                        message,
                    });
                }
            }
        }
    }

    fn kill(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for ForkHandle {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            self.kill();
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::format::create_format_instance;
    use crate::options::VerboseMode;
    use std::os::unix::fs::PermissionsExt;
    use serial_test::serial;
    use std::path::Path;

    // Stand-in harness: a shell script speaking the worker side.
    fn fake_harness(dir: &Path, body: &str) -> String {
        let path = dir.join("fake_harness");
        std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn silent() -> Box<dyn OutputFormat> {
        create_format_instance(Box::new(std::io::sink()), VerboseMode::Silent)
    }

    fn run_command(measurement_iterations: u32) -> SupervisorCommand {
        SupervisorCommand::Run {
            benchmark: "fake::bench".to_string(),
            warmup_iterations: 0,
            warmup_time: Duration::ZERO,
            measurement_iterations,
            measurement_time: Duration::ZERO,
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    #[serial(fake_harness)]
    fn test_unterminated_output_keeps_measurements() {
        let dir = tempfile::tempdir().unwrap();
        let harness = fake_harness(
            dir.path(),
            "printf '\\n@hotbench hello 1 0\\n'\n\
             read line\n\
             printf 'x'\n\
             printf '\\n@hotbench measure 0 1 10\\n'\n\
             printf '\\n@hotbench complete 1 10\\n'\n\
             read line\n",
        );
        let mut format = silent();

        let mut fork =
            ForkHandle::spawn(&harness, &CompilerHints::default(), TIMEOUT, format.as_mut())
                .unwrap();
        let outcome = fork.run(&run_command(1), TIMEOUT, format.as_mut()).unwrap();
        fork.shutdown().unwrap();

        assert_eq!(
            outcome,
            ForkOutcome::Completed(vec![IterationResult {
                operations: 1,
                duration_nanos: 10
            }])
        );
    }

    #[test]
    #[serial(fake_harness)]
    fn test_complete_without_measurements_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let harness = fake_harness(
            dir.path(),
            "echo '@hotbench hello 1 0'\nread line\necho 'x@hotbench measure 0 1 10'\necho '@hotbench complete 0 0'\nread line\n",
        );
        let mut format = silent();

        let mut fork =
            ForkHandle::spawn(&harness, &CompilerHints::default(), TIMEOUT, format.as_mut())
                .unwrap();
        let err = fork.run(&run_command(1), TIMEOUT, format.as_mut()).unwrap_err();
        assert!(matches!(
            err,
            RunnerError::Protocol(ProtocolError::IterationCount {
                expected: 1,
                found: 0
            })
        ));
    }

    #[test]
    #[serial(fake_harness)]
    fn test_hint_count_must_match() {
        let dir = tempfile::tempdir().unwrap();
        let harness = fake_harness(dir.path(), "echo '@hotbench hello 1 3'\nread line\n");
        let hints = CompilerHints::parse("dontinline a::b\n").unwrap();

        let err = ForkHandle::spawn(&harness, &hints, TIMEOUT, silent().as_mut())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            RunnerError::Protocol(ProtocolError::HintCountMismatch {
                expected: 1,
                found: 3
            })
        ));
    }

    #[test]
    #[serial(fake_harness)]
    fn test_stalled_fork_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let harness = fake_harness(dir.path(), "echo '@hotbench hello 1 0'\nread line\nsleep 30\n");
        let mut format = silent();

        let mut fork =
            ForkHandle::spawn(&harness, &CompilerHints::default(), TIMEOUT, format.as_mut())
                .unwrap();
        let started = Instant::now();
        let err = fork
            .run(&run_command(1), Duration::from_millis(200), format.as_mut())
            .unwrap_err();

        assert!(matches!(err, RunnerError::Timeout { ref benchmark, .. } if benchmark == "fake::bench"));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
