//! Run directory layout and artifact persistence.
//!
//! Layout: `<output root>/<dump stem>_<YYYYMMDD_HHMMSS>[-N]/<plugin>.{txt,err}`

use crate::error::{ScanError, ScanResult};
use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Which artifact a plugin result is filed as.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Captured stdout of a successful plugin.
    Output,

    /// Captured stderr and classification of a failed plugin.
    Error,
}

impl ArtifactKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Output => "txt",
            ArtifactKind::Error => "err",
        }
    }
}

/// Directory name for a run: dump stem plus a second-resolution timestamp.
pub fn run_directory_name<Tz>(dump: &Path, timestamp: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let stem = dump
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "memory".to_string());
    format!("{}_{}", stem, timestamp.format("%Y%m%d_%H%M%S"))
}

/// Create a fresh run directory under `output_root`.
///
/// The output root is created if missing. An existing directory with the
/// same name is never reused; a `-N` suffix is appended instead.
pub fn prepare_run_directory<Tz>(
    output_root: &Path,
    dump: &Path,
    timestamp: &DateTime<Tz>,
) -> ScanResult<PathBuf>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    fs::create_dir_all(output_root).map_err(|source| ScanError::DirectoryCreation {
        path: output_root.to_path_buf(),
        source,
    })?;

    let base = run_directory_name(dump, timestamp);
    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            base.clone()
        } else {
            format!("{base}-{attempt}")
        };
        let path = output_root.join(name);
        match fs::create_dir(&path) {
            Ok(()) => return Ok(path),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(source) => return Err(ScanError::DirectoryCreation { path, source }),
        }
    }
}

/// Deterministic artifact path for a plugin within a run directory.
pub fn path_for(run_dir: &Path, identifier: &str, kind: ArtifactKind) -> PathBuf {
    run_dir.join(format!("{}.{}", identifier, kind.extension()))
}

/// Write `data` to `path` atomically (temp file in the same directory, then rename).
pub fn write_artifact(path: &Path, data: &[u8]) -> ScanResult<()> {
    let wrap = |source: io::Error| ScanError::ArtifactWrite {
        path: path.to_path_buf(),
        source,
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(wrap)?;
    tmp.write_all(data).map_err(wrap)?;
    tmp.persist(path).map_err(|e| wrap(e.error))?;
    Ok(())
}

/// Body of an error artifact: a header line, then the captured stderr.
pub fn error_artifact_body(identifier: &str, classification: &str, stderr: &[u8]) -> Vec<u8> {
    let mut body = format!("# plugin: {identifier}\n# status: {classification}\n").into_bytes();
    body.extend_from_slice(stderr);
    body
}
