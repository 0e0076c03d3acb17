//! Log output for the `autovol` binary.
//!
//! Two sinks: stderr (plain or JSON, filtered by `RUST_LOG`) and a per-run
//! log file. The file sink is a [`RunLog`] handle that starts detached and is
//! pointed at a run directory once that directory exists, so the log of a run
//! sits next to its artifacts.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Log file created inside each run directory.
pub const RUN_LOG_FILE_NAME: &str = "volatility_analysis.log";

/// Shared handle to the current run's log file.
///
/// Lines written while no file is attached are dropped.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    file: Arc<Mutex<Option<File>>>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start appending to `<run_dir>/volatility_analysis.log`.
    pub fn attach(&self, run_dir: &Path) -> io::Result<PathBuf> {
        let path = run_dir.join(RUN_LOG_FILE_NAME);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        *lock(&self.file) = Some(file);
        Ok(path)
    }

    /// Stop writing to the file. Later lines are dropped.
    pub fn detach(&self) {
        *lock(&self.file) = None;
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.file).is_some()
    }
}

fn lock(file: &Mutex<Option<File>>) -> MutexGuard<'_, Option<File>> {
    file.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Writer handed out per event by [`RunLog`].
pub struct RunLogWriter {
    file: Arc<Mutex<Option<File>>>,
}

impl Write for RunLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match lock(&self.file).as_mut() {
            Some(file) => file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match lock(&self.file).as_mut() {
            Some(file) => file.write_all(buf),
            None => Ok(()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match lock(&self.file).as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for RunLog {
    type Writer = RunLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RunLogWriter {
            file: Arc::clone(&self.file),
        }
    }
}

/// Plain-text layer that writes to `run_log`.
pub fn run_log_layer<S>(run_log: &RunLog) -> impl Layer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(run_log.clone())
}

/// Install the global subscriber and return the run log handle.
///
/// `level` applies when `RUST_LOG` is not set. Stderr keeps stdout free for
/// the run summary. Only the first call in a process installs anything.
pub fn init_tracing(json: bool, level: Level) -> RunLog {
    let run_log = RunLog::new();
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(io::stderr)
                    .json(),
            )
            .with(run_log_layer(&run_log))
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(io::stderr))
            .with(run_log_layer(&run_log))
            .try_init()
            .ok();
    }

    run_log
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::info;

    #[test]
    fn test_run_log_captures_only_while_attached() {
        let dir = tempfile::tempdir().unwrap();
        let run_log = RunLog::new();
        let subscriber = tracing_subscriber::registry().with(run_log_layer(&run_log));

        tracing::subscriber::with_default(subscriber, || {
            info!("before attach");
            let path = run_log.attach(dir.path()).unwrap();
            assert_eq!(path, dir.path().join(RUN_LOG_FILE_NAME));
            assert!(run_log.is_attached());
            info!(plugin = "windows.pslist", "plugin finished");
            run_log.detach();
            info!("after detach");
        });

        let log = std::fs::read_to_string(dir.path().join(RUN_LOG_FILE_NAME)).unwrap();
        assert!(log.contains("plugin finished"), "{log}");
        assert!(log.contains("windows.pslist"), "{log}");
        assert!(!log.contains("before attach"));
        assert!(!log.contains("after detach"));
        assert!(!log.contains('\u{1b}'), "log file must not carry ANSI escapes");
    }

    #[test]
    fn test_attach_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let run_log = RunLog::new();
        assert!(run_log.attach(&dir.path().join("gone")).is_err());
        assert!(!run_log.is_attached());
    }
}
