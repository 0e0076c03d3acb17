//! Shared fixtures: a fake memory dump and a shell stand-in for the toolkit.

#![allow(dead_code)]

use autovol_core::{ArtifactKind, ScanConfig};
use std::fs;
use std::path::{Path, PathBuf};

pub const INVOCATION_LOG: &str = "invocations.log";

/// Toolkit stub plus the scratch directory it lives in.
pub struct Workspace {
    pub dir: tempfile::TempDir,
    pub dump: PathBuf,
    pub toolkit: PathBuf,
}

impl Workspace {
    /// The stub prints one line per plugin and exits 1 for each plugin in `failing`,
    /// writing `stub: <plugin> failed on <dump>` to stderr.
    pub fn new(failing: &[&str]) -> Self {
        let script = format!(
            r#"#!/bin/sh
# invoked as: vol.sh -f <dump> <plugin>
echo "$3" >> "$(dirname "$0")/{log}"
case " {failing} " in
  *" $3 "*)
    echo "stub: $3 failed on $2" >&2
    exit 1
    ;;
esac
echo "stub: $3 output for $2"
"#,
            log = INVOCATION_LOG,
            failing = failing.join(" "),
        );
        Self::with_script(&script)
    }

    /// Stub with a caller-supplied body. `$2` is the dump path and `$3` the plugin.
    pub fn with_script(script: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let dump = dir.path().join("test.dmp");
        fs::write(&dump, b"PAGEDUMP").expect("write dump");

        let toolkit = dir.path().join("vol.sh");
        fs::write(&toolkit, script).expect("write stub");

        Self { dir, dump, toolkit }
    }

    pub fn output_root(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    /// Scan config pointing at the stub, launched through `sh`.
    pub fn config(&self) -> ScanConfig {
        ScanConfig::new(&self.dump)
            .with_output_root(self.output_root())
            .with_toolkit(&self.toolkit)
            .with_interpreter(Some(PathBuf::from("sh")))
    }

    /// Plugins the stub was invoked with, in invocation order.
    pub fn invocations(&self) -> Vec<String> {
        match fs::read_to_string(self.dir.path().join(INVOCATION_LOG)) {
            Ok(log) => log.lines().map(str::to_string).collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Plugin artifacts in a run directory (excludes the summary file).
pub fn artifacts(run_dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(run_dir)
        .expect("read run dir")
        .map(|e| e.expect("dir entry").path())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str());
            ext == Some(ArtifactKind::Output.extension())
                || ext == Some(ArtifactKind::Error.extension())
        })
        .collect();
    files.sort();
    files
}
