//! Scan orchestration: run every plugin of a tier and file the results.

use crate::catalog::{self, PluginSpec, ScanTier};
use crate::context::{RunContext, ScanConfig};
use crate::error::{ScanError, ScanResult};
use crate::obs;
use crate::organizer::{self, ArtifactKind};
use crate::runner::{PluginResult, PluginRunner, PluginStatus, RunnerConfig, ToolkitRunner};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, warn, Instrument};
use uuid::Uuid;

/// Run-level record written next to the plugin artifacts.
pub const SUMMARY_FILE_NAME: &str = "summary.json";

/// What happened to one plugin, after its artifact was written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PluginOutcome {
    pub identifier: String,
    pub label: String,
    pub status: PluginStatus,

    /// Output or error file.
    pub kind: ArtifactKind,
    pub artifact: PathBuf,

    /// SHA-256 of the artifact bytes, hex encoded.
    pub sha256: String,

    /// Stderr of a successful plugin (lossy UTF-8). Failed plugins keep
    /// theirs in the error artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,

    pub duration_ms: u64,
}

/// Result of a complete scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: String,
    pub tier: ScanTier,
    pub dump: PathBuf,

    /// Toolkit entry point the plugins were run with.
    pub toolkit: PathBuf,
    pub run_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,

    /// One entry per plugin, in catalog order.
    pub outcomes: Vec<PluginOutcome>,
}

impl RunSummary {
    /// Status recorded for a plugin, if it was part of this run.
    pub fn status_of(&self, identifier: &str) -> Option<&PluginStatus> {
        self.outcomes
            .iter()
            .find(|o| o.identifier == identifier)
            .map(|o| &o.status)
    }

    pub fn succeeded_identifiers(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.status.is_success())
            .map(|o| o.identifier.as_str())
            .collect()
    }

    pub fn failed_identifiers(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.status.is_success())
            .map(|o| o.identifier.as_str())
            .collect()
    }
}

/// Scan orchestrator.
///
/// Plugin failures never abort a run; only setup errors and failures to
/// write artifacts are returned as `Err`.
pub struct RunCoordinator {
    runner: Arc<dyn PluginRunner>,
}

impl RunCoordinator {
    pub fn new(runner: Arc<dyn PluginRunner>) -> Self {
        Self { runner }
    }

    /// Coordinator backed by the real toolkit.
    pub fn with_toolkit(config: RunnerConfig) -> Self {
        Self::new(Arc::new(ToolkitRunner::new(config)))
    }

    /// Setup and execute in one step.
    pub async fn scan<Tz>(
        &self,
        config: ScanConfig,
        timestamp: DateTime<Tz>,
    ) -> ScanResult<RunSummary>
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let ctx = RunContext::prepare(config, timestamp)?;
        self.execute(&ctx).await
    }

    /// Run every plugin of the context's tier and write one artifact per plugin.
    ///
    /// Up to `ctx.jobs` plugins run at once; outcomes are reported in catalog
    /// order regardless of completion order. Dropping the returned future
    /// aborts outstanding workers, which kills their subprocesses.
    pub async fn execute(&self, ctx: &RunContext) -> ScanResult<RunSummary> {
        let run_id = Uuid::new_v4().to_string();
        let span = obs::scan_span(&run_id, ctx.tier.name());
        self.execute_inner(ctx, run_id).instrument(span).await
    }

    async fn execute_inner(&self, ctx: &RunContext, run_id: String) -> ScanResult<RunSummary> {
        let start = Instant::now();
        let plugins = catalog::resolve(ctx.tier);
        let total = plugins.len();

        obs::emit_scan_started(
            &run_id,
            ctx.tier.name(),
            total,
            &ctx.run_dir.to_string_lossy(),
        );
        debug!(
            toolkit = %ctx.runner.toolkit.display(),
            output_root = %ctx.output_root.display(),
            jobs = ctx.jobs,
            "Scan settings"
        );

        let sem = Arc::new(Semaphore::new(ctx.jobs.max(1)));
        let mut join_set = JoinSet::new();

        // Raised by a worker that could not write its artifact, before it releases its permit.
        let (fatal_tx, fatal_rx) = watch::channel(false);
        let fatal = Arc::new(fatal_tx);

        for (idx, plugin) in plugins.iter().enumerate() {
            // Permits are taken here, not inside the task, so launches follow catalog order.
            let permit = Arc::clone(&sem)
                .acquire_owned()
                .await
                .map_err(|e| ScanError::WorkerJoin(e.to_string()))?;
            if *fatal_rx.borrow() {
                warn!(
                    skipped = total - idx,
                    "Artifact write failed; not launching remaining plugins"
                );
                break;
            }
            let runner = Arc::clone(&self.runner);
            let fatal = Arc::clone(&fatal);
            let dump = ctx.dump.clone();
            let run_dir = ctx.run_dir.clone();

            join_set.spawn(
                async move {
                    let _permit = permit;
                    obs::emit_plugin_started(plugin.identifier, idx, total);
                    let result = runner.run(&dump, plugin).await;
                    let outcome = match persist(&run_dir, plugin, result) {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            let _ = fatal.send(true);
                            return Err(e);
                        }
                    };
                    obs::emit_plugin_finished(
                        &outcome.identifier,
                        &outcome.status,
                        outcome.duration_ms,
                        &outcome.artifact.to_string_lossy(),
                    );
                    Ok::<(usize, PluginOutcome), ScanError>((idx, outcome))
                }
                .in_current_span(),
            );
        }

        let mut slots: Vec<Option<PluginOutcome>> = vec![None; total];
        while let Some(joined) = join_set.join_next().await {
            let (idx, outcome) = joined.map_err(|e| ScanError::WorkerJoin(e.to_string()))??;
            slots[idx] = Some(outcome);
        }

        let mut outcomes = Vec::with_capacity(total);
        for (plugin, slot) in plugins.iter().zip(slots) {
            let outcome = slot.ok_or_else(|| {
                ScanError::WorkerJoin(format!("no outcome recorded for {}", plugin.identifier))
            })?;
            outcomes.push(outcome);
        }

        let succeeded = outcomes.iter().filter(|o| o.status.is_success()).count();
        let summary = RunSummary {
            run_id,
            tier: ctx.tier,
            dump: ctx.dump.clone(),
            toolkit: ctx.runner.toolkit.clone(),
            run_dir: ctx.run_dir.clone(),
            started_at: ctx.started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            total,
            succeeded,
            failed: total - succeeded,
            outcomes,
        };

        write_summary(&summary)?;
        obs::emit_scan_finished(
            &summary.run_id,
            summary.duration_ms,
            summary.succeeded,
            summary.failed,
        );

        Ok(summary)
    }
}

/// Write a plugin result to its artifact and reduce it to an outcome.
fn persist(
    run_dir: &Path,
    plugin: &PluginSpec,
    result: PluginResult,
) -> ScanResult<PluginOutcome> {
    let PluginResult {
        identifier,
        status,
        stdout,
        stderr,
        duration_ms,
    } = result;

    let diagnostics = (status.is_success() && !stderr.is_empty())
        .then(|| String::from_utf8_lossy(&stderr).into_owned());

    let (kind, body) = if status.is_success() {
        (ArtifactKind::Output, stdout)
    } else {
        let body = organizer::error_artifact_body(&identifier, &status.to_string(), &stderr);
        (ArtifactKind::Error, body)
    };

    let artifact = organizer::path_for(run_dir, &identifier, kind);
    organizer::write_artifact(&artifact, &body)?;

    Ok(PluginOutcome {
        identifier,
        label: plugin.label.to_string(),
        status,
        kind,
        artifact,
        sha256: hex::encode(Sha256::digest(&body)),
        stderr: diagnostics,
        duration_ms,
    })
}

fn write_summary(summary: &RunSummary) -> ScanResult<()> {
    let path = summary.run_dir.join(SUMMARY_FILE_NAME);
    let json = serde_json::to_vec_pretty(summary).map_err(|e| ScanError::SummaryWrite {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    organizer::write_artifact(&path, &json).map_err(|e| ScanError::SummaryWrite {
        path: path.clone(),
        reason: e.to_string(),
    })
}
