//! AutoVol Core - tiered Volatility 3 scan orchestration
//!
//! Runs a fixed, tiered set of toolkit plugins against a memory dump:
//! - Resolves a scan tier to an ordered plugin list
//! - Invokes each plugin as an isolated subprocess
//! - Files every result as one artifact in a timestamped run directory
//!
//! Plugin output is never interpreted, only stored.

pub mod catalog;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod obs;
pub mod organizer;
pub mod runner;
pub mod telemetry;

// Re-export key types
pub use catalog::{lookup, resolve, PluginSpec, ScanTier, UnknownTier};
pub use context::{RunContext, ScanConfig};
pub use coordinator::{PluginOutcome, RunCoordinator, RunSummary, SUMMARY_FILE_NAME};
pub use error::{ScanError, ScanResult};
pub use obs::{
    emit_plugin_finished, emit_plugin_started, emit_scan_finished, emit_scan_started, scan_span,
};
pub use organizer::{path_for, prepare_run_directory, ArtifactKind};
pub use runner::{
    ExitFailure, PluginResult, PluginRunner, PluginStatus, RunnerConfig, ToolkitRunner,
    DEFAULT_TOOLKIT_PATH,
};
pub use telemetry::{init_tracing, RunLog, RUN_LOG_FILE_NAME};
