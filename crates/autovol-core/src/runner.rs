//! Toolkit plugin execution.
//!
//! A runner never fails from the caller's point of view: spawn errors,
//! timeouts, non-zero exits and signals all come back as a
//! [`PluginResult`] whose [`PluginStatus`] says what went wrong.

use crate::catalog::PluginSpec;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

/// Default location of the Volatility 3 entry point.
pub const DEFAULT_TOOLKIT_PATH: &str = "/opt/volatility3/vol.py";

/// How a plugin process ended unsuccessfully.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExitFailure {
    /// Exited with a non-zero code.
    Code(i32),

    /// Terminated by a signal.
    Signal(i32),
}

/// Classification of one plugin invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PluginStatus {
    /// The plugin exited with code 0.
    Success,

    /// The plugin ran but did not exit cleanly.
    Failure(ExitFailure),

    /// The plugin could not be run at all (spawn error, timeout, I/O).
    ExecutionError(String),
}

impl PluginStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, PluginStatus::Success)
    }
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginStatus::Success => f.write_str("success"),
            PluginStatus::Failure(ExitFailure::Code(code)) => write!(f, "exit code {code}"),
            PluginStatus::Failure(ExitFailure::Signal(sig)) => {
                write!(f, "terminated by signal {sig}")
            }
            PluginStatus::ExecutionError(reason) => write!(f, "execution error: {reason}"),
        }
    }
}

/// Result of a single plugin invocation.
///
/// Carries no file path; the coordinator files it and records the path on
/// [`crate::coordinator::PluginOutcome::artifact`].
#[derive(Debug, Clone)]
pub struct PluginResult {
    /// Toolkit plugin identifier.
    pub identifier: String,

    /// How the invocation ended.
    pub status: PluginStatus,

    /// Captured stdout.
    pub stdout: Vec<u8>,

    /// Captured stderr.
    pub stderr: Vec<u8>,

    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl PluginResult {
    /// Build a result for an invocation that never produced a process exit.
    pub fn execution_error(identifier: &str, reason: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            identifier: identifier.to_string(),
            status: PluginStatus::ExecutionError(reason.into()),
            stdout: Vec::new(),
            stderr: Vec::new(),
            duration_ms,
        }
    }

    /// Whether the plugin exited with code 0.
    pub fn succeeded(&self) -> bool {
        self.status.is_success()
    }
}

/// Executes one plugin against one memory dump.
#[async_trait]
pub trait PluginRunner: Send + Sync {
    /// Run `plugin` against `dump`. Must not panic or return early on failure.
    async fn run(&self, dump: &Path, plugin: &PluginSpec) -> PluginResult;
}

/// Configuration for launching the toolkit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Toolkit entry point (`vol.py` or a `vol` binary).
    pub toolkit: PathBuf,

    /// Optional interpreter the toolkit is launched through, e.g. `python3`.
    pub interpreter: Option<PathBuf>,

    /// Per-plugin time limit. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            toolkit: PathBuf::from(DEFAULT_TOOLKIT_PATH),
            interpreter: None,
            timeout: None,
        }
    }
}

impl RunnerConfig {
    /// Program and leading arguments for a plugin invocation.
    pub fn command_line(&self, dump: &Path, identifier: &str) -> (PathBuf, Vec<String>) {
        let mut args = Vec::new();
        let program = match &self.interpreter {
            Some(interpreter) => {
                args.push(self.toolkit.to_string_lossy().into_owned());
                interpreter.clone()
            }
            None => self.toolkit.clone(),
        };
        args.push("-f".to_string());
        args.push(dump.to_string_lossy().into_owned());
        args.push(identifier.to_string());
        (program, args)
    }
}

/// Runs plugins by spawning the toolkit as a subprocess.
#[derive(Debug, Clone, Default)]
pub struct ToolkitRunner {
    config: RunnerConfig,
}

impl ToolkitRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PluginRunner for ToolkitRunner {
    async fn run(&self, dump: &Path, plugin: &PluginSpec) -> PluginResult {
        let start = Instant::now();
        let elapsed = || start.elapsed().as_millis() as u64;
        let (program, args) = self.config.command_line(dump, plugin.identifier);

        // kill_on_drop: a timed-out or cancelled wait takes the child with it.
        let child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                return PluginResult::execution_error(
                    plugin.identifier,
                    format!("failed to launch {}: {}", program.display(), e),
                    elapsed(),
                );
            }
        };

        let output = match self.config.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(output) => output,
                Err(_) => {
                    return PluginResult::execution_error(
                        plugin.identifier,
                        format!("timed out after {} seconds", limit.as_secs_f64()),
                        elapsed(),
                    );
                }
            },
            None => child.wait_with_output().await,
        };

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                return PluginResult::execution_error(
                    plugin.identifier,
                    format!("failed to collect output: {e}"),
                    elapsed(),
                );
            }
        };

        let status = classify_exit(output.status);
        if status.is_success() && !output.stderr.is_empty() {
            debug!(
                plugin = plugin.identifier,
                stderr = %String::from_utf8_lossy(&output.stderr),
                "plugin succeeded with output on stderr"
            );
        }

        PluginResult {
            identifier: plugin.identifier.to_string(),
            status,
            stdout: output.stdout,
            stderr: output.stderr,
            duration_ms: elapsed(),
        }
    }
}

fn classify_exit(status: ExitStatus) -> PluginStatus {
    if status.success() {
        return PluginStatus::Success;
    }
    if let Some(code) = status.code() {
        return PluginStatus::Failure(ExitFailure::Code(code));
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return PluginStatus::Failure(ExitFailure::Signal(signal));
        }
    }
    PluginStatus::ExecutionError(format!("unrecognized exit status: {status}"))
}
