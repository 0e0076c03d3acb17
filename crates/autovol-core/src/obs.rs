//! Structured lifecycle events for scan runs.
//!
//! Events are emitted at `info!` level (plugin failures at `warn!`) with an
//! `event` field so they can be filtered out of JSON log streams.

use crate::runner::PluginStatus;
use tracing::{info, warn};

/// Span that tags every event of one scan with its run id.
pub fn scan_span(run_id: &str, tier: &str) -> tracing::Span {
    tracing::info_span!("autovol.scan", run_id = %run_id, tier = %tier)
}

/// Emit event: scan started.
pub fn emit_scan_started(run_id: &str, tier: &str, plugin_count: usize, run_dir: &str) {
    info!(
        event = "scan.started",
        run_id = %run_id,
        tier = %tier,
        plugins = plugin_count,
        run_dir = %run_dir,
    );
}

/// Emit event: a plugin is about to be launched.
pub fn emit_plugin_started(identifier: &str, index: usize, total: usize) {
    info!(
        event = "plugin.started",
        plugin = %identifier,
        position = index + 1,
        total = total,
    );
}

/// Emit event: a plugin finished and its artifact is on disk.
pub fn emit_plugin_finished(
    identifier: &str,
    status: &PluginStatus,
    duration_ms: u64,
    artifact: &str,
) {
    if status.is_success() {
        info!(
            event = "plugin.finished",
            plugin = %identifier,
            duration_ms = duration_ms,
            artifact = %artifact,
        );
    } else {
        warn!(
            event = "plugin.failed",
            plugin = %identifier,
            status = %status,
            duration_ms = duration_ms,
            artifact = %artifact,
        );
    }
}

/// Emit event: scan finished with counts.
pub fn emit_scan_finished(run_id: &str, duration_ms: u64, succeeded: usize, failed: usize) {
    info!(
        event = "scan.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        succeeded = succeeded,
        failed = failed,
    );
}
