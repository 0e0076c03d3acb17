//! Scan configuration and the per-run context built from it.

use crate::catalog::ScanTier;
use crate::error::{ScanError, ScanResult};
use crate::organizer;
use crate::runner::RunnerConfig;
use chrono::{DateTime, TimeZone, Utc};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// User-facing scan settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Memory dump to analyze.
    pub dump: PathBuf,

    /// Directory that receives run directories.
    pub output_root: PathBuf,

    /// Toolkit launch settings.
    pub runner: RunnerConfig,

    /// Plugin tier to run.
    pub tier: ScanTier,

    /// Maximum plugins running at once (1 = sequential).
    pub jobs: usize,
}

impl ScanConfig {
    pub fn new(dump: impl Into<PathBuf>) -> Self {
        Self {
            dump: dump.into(),
            output_root: std::env::temp_dir(),
            runner: RunnerConfig::default(),
            tier: ScanTier::default(),
            jobs: 1,
        }
    }

    pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = root.into();
        self
    }

    pub fn with_tier(mut self, tier: ScanTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_toolkit(mut self, toolkit: impl Into<PathBuf>) -> Self {
        self.runner.toolkit = toolkit.into();
        self
    }

    pub fn with_interpreter(mut self, interpreter: Option<PathBuf>) -> Self {
        self.runner.interpreter = interpreter;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.runner.timeout = timeout;
        self
    }

    /// Values below 1 are clamped to 1.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }
}

/// Everything the coordinator needs for one run. Built once by [`RunContext::prepare`].
#[derive(Debug, Clone)]
pub struct RunContext {
    pub dump: PathBuf,
    pub output_root: PathBuf,
    pub runner: RunnerConfig,
    pub tier: ScanTier,
    pub jobs: usize,

    /// Created by `prepare`; every artifact of the run lands here.
    pub run_dir: PathBuf,

    pub started_at: DateTime<Utc>,
}

impl RunContext {
    /// Setup phase: validate the dump and create the run directory.
    ///
    /// Nothing is spawned here, so a setup error means no plugin ran.
    pub fn prepare<Tz>(config: ScanConfig, timestamp: DateTime<Tz>) -> ScanResult<Self>
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        validate_dump(&config.dump)?;
        let run_dir =
            organizer::prepare_run_directory(&config.output_root, &config.dump, &timestamp)?;
        info!(run_dir = %run_dir.display(), tier = %config.tier, "Prepared run directory");

        Ok(Self {
            dump: config.dump,
            output_root: config.output_root,
            runner: config.runner,
            tier: config.tier,
            jobs: config.jobs.max(1),
            run_dir,
            started_at: timestamp.with_timezone(&Utc),
        })
    }
}

fn validate_dump(dump: &Path) -> ScanResult<()> {
    match std::fs::metadata(dump) {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(ScanError::DumpNotAFile {
            path: dump.to_path_buf(),
        }),
        Err(_) => Err(ScanError::DumpNotFound {
            path: dump.to_path_buf(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ScanConfig::new("mem.raw");
        assert_eq!(config.tier, ScanTier::Normal);
        assert_eq!(config.jobs, 1);
        assert_eq!(config.output_root, std::env::temp_dir());
        assert!(config.runner.interpreter.is_none());
        assert!(config.runner.timeout.is_none());
    }

    #[test]
    fn test_config_jobs_clamped() {
        assert_eq!(ScanConfig::new("mem.raw").with_jobs(0).jobs, 1);
        assert_eq!(ScanConfig::new("mem.raw").with_jobs(8).jobs, 8);
    }

    #[test]
    fn test_prepare_missing_dump() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScanConfig::new(dir.path().join("absent.raw")).with_output_root(dir.path());
        let err = RunContext::prepare(config, Utc::now()).unwrap_err();
        assert!(matches!(err, ScanError::DumpNotFound { .. }));
        // Only the dump's parent exists; no run directory was made.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_prepare_dump_is_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScanConfig::new(dir.path()).with_output_root(dir.path().join("out"));
        let err = RunContext::prepare(config, Utc::now()).unwrap_err();
        assert!(matches!(err, ScanError::DumpNotAFile { .. }));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_prepare_creates_run_dir() {
        let dir = tempfile::tempdir().unwrap();
        let dump = dir.path().join("test.dmp");
        std::fs::write(&dump, b"MDMP").unwrap();
        let config = ScanConfig::new(&dump)
            .with_output_root(dir.path().join("out"))
            .with_tier(ScanTier::Minimal);

        let ctx = RunContext::prepare(config, Utc::now()).unwrap();
        assert!(ctx.run_dir.is_dir());
        assert!(ctx.run_dir.starts_with(dir.path().join("out")));
        assert_eq!(ctx.tier, ScanTier::Minimal);
    }
}
