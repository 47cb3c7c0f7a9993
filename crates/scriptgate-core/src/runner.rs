//! The execution boundary: running an authenticated script.
//!
//! The dispatcher treats execution as an opaque capability behind
//! [`ScriptRunner`]: script bytes in, combined output or a structured
//! failure out. How the script actually runs is this module's business
//! alone. The shipped implementation, [`BashRunner`], pipes the script to
//! an interpreter over stdin and returns stdout followed by stderr.
//!
//! Children are spawned with `kill_on_drop`, so a worker whose
//! per-request deadline expires mid-execution drops the future and the
//! child is reaped rather than leaked.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt as _;
use tokio::process::Command;

/// Errors from script execution.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The interpreter process could not be started.
    #[error("failed to spawn interpreter: {0}")]
    SpawnFailed(String),

    /// Waiting for the interpreter to finish failed.
    #[error("failed to collect interpreter output: {0}")]
    WaitFailed(String),

    /// The script ran but exited unsuccessfully.
    #[error("script exited unsuccessfully (code {code:?})")]
    NonZeroExit {
        /// Exit code, if the process exited normally.
        code: Option<i32>,
    },
}

impl RunnerError {
    /// Returns the error kind as a string identifier for log fields.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SpawnFailed(_) => "spawn_failed",
            Self::WaitFailed(_) => "wait_failed",
            Self::NonZeroExit { .. } => "non_zero_exit",
        }
    }
}

/// The execution capability consumed by the dispatcher.
///
/// `run` is synchronous from the worker's perspective: it resolves only
/// once the script has finished (or failed) and all output is collected.
/// Implementations must be `Send + Sync`; one runner instance is shared
/// by every worker.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Runs `script` and returns its combined output.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError`] if the script could not be started or
    /// exited unsuccessfully. Callers must treat any error as "execution
    /// failed"; an authenticated request does not imply successful
    /// output.
    async fn run(&self, script: &[u8]) -> Result<Vec<u8>, RunnerError>;
}

/// Runs scripts by piping them to a shell interpreter's stdin.
pub struct BashRunner {
    interpreter: PathBuf,
}

impl BashRunner {
    /// Creates a runner using `bash`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_interpreter("bash")
    }

    /// Creates a runner using a specific interpreter binary.
    #[must_use]
    pub fn with_interpreter(interpreter: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }
}

impl Default for BashRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScriptRunner for BashRunner {
    async fn run(&self, script: &[u8]) -> Result<Vec<u8>, RunnerError> {
        let mut command = Command::new(&self.interpreter);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|e| RunnerError::SpawnFailed(e.to_string()))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| RunnerError::SpawnFailed("child stdin unavailable".to_string()))?;

        // Feed stdin concurrently with output collection so a script that
        // produces output before draining its input cannot deadlock the
        // pipe pair. A script that exits without reading all of its input
        // closes the pipe early; that is the child's outcome to report,
        // not a gateway error, so write failures here are ignored.
        let body = script.to_vec();
        let feeder = tokio::spawn(async move {
            let _ = stdin.write_all(&body).await;
            let _ = stdin.shutdown().await;
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| RunnerError::WaitFailed(e.to_string()))?;
        feeder.abort();

        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);

        if output.status.success() {
            Ok(combined)
        } else {
            Err(RunnerError::NonZeroExit {
                code: output.status.code(),
            })
        }
    }
}
