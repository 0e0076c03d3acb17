//! Scan tiers and the fixed plugin catalog.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named preset selecting which plugins run.
///
/// Tiers nest: every plugin in `Minimal` is in `Normal`, every plugin in
/// `Normal` is in `Full`.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum ScanTier {
    /// System info and the process views.
    Minimal,

    /// Minimal plus modules, network, malware and DLL listings.
    #[default]
    Normal,

    /// Normal plus file, socket, SID and registry analysis.
    Full,
}

impl ScanTier {
    /// All tiers, smallest first.
    pub const ALL: [ScanTier; 3] = [ScanTier::Minimal, ScanTier::Normal, ScanTier::Full];

    /// Get the tier name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            ScanTier::Minimal => "minimal",
            ScanTier::Normal => "normal",
            ScanTier::Full => "full",
        }
    }

    /// Number of leading catalog entries this tier runs.
    fn len(&self) -> usize {
        match self {
            ScanTier::Minimal => MINIMAL_LEN,
            ScanTier::Normal => NORMAL_LEN,
            ScanTier::Full => CATALOG.len(),
        }
    }
}

impl fmt::Display for ScanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown tier name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown scan tier '{0}' (expected minimal, normal or full)")]
pub struct UnknownTier(pub String);

impl FromStr for ScanTier {
    type Err = UnknownTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minimal" => Ok(ScanTier::Minimal),
            "normal" => Ok(ScanTier::Normal),
            "full" => Ok(ScanTier::Full),
            other => Err(UnknownTier(other.to_string())),
        }
    }
}

/// One toolkit plugin the catalog knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PluginSpec {
    /// Toolkit plugin name, passed verbatim on the command line.
    pub identifier: &'static str,

    /// Human-readable label.
    pub label: &'static str,
}

impl PluginSpec {
    const fn new(identifier: &'static str, label: &'static str) -> Self {
        Self { identifier, label }
    }
}

const MINIMAL_LEN: usize = 4;
const NORMAL_LEN: usize = 9;

// Ordered so that each tier is a prefix of the next one.
static CATALOG: [PluginSpec; 14] = [
    // minimal
    PluginSpec::new("windows.info", "System information"),
    PluginSpec::new("windows.pslist", "Process list"),
    PluginSpec::new("windows.pstree", "Process tree"),
    PluginSpec::new("windows.cmdline", "Process command lines"),
    // normal
    PluginSpec::new("windows.psxview", "Process cross-view"),
    PluginSpec::new("windows.modules", "Kernel modules"),
    PluginSpec::new("windows.netstat", "Network connections"),
    PluginSpec::new("windows.malfind", "Injected code detection"),
    PluginSpec::new("windows.dlllist", "Loaded DLLs"),
    // full
    PluginSpec::new("windows.filescan", "File objects"),
    PluginSpec::new("windows.netscan", "Socket scan"),
    PluginSpec::new("windows.getsids", "Process security identifiers"),
    PluginSpec::new("windows.registry.hivelist", "Registry hives"),
    PluginSpec::new("windows.registry.scheduled_tasks", "Scheduled tasks"),
];

/// Ordered plugin list for a tier.
pub fn resolve(tier: ScanTier) -> &'static [PluginSpec] {
    &CATALOG[..tier.len()]
}

/// Find a catalog entry by its toolkit identifier.
pub fn lookup(identifier: &str) -> Option<&'static PluginSpec> {
    CATALOG.iter().find(|p| p.identifier == identifier)
}
