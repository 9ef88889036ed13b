//! Store configuration.

use serde::{Deserialize, Serialize};

/// Events per encoded chunk when nothing else is configured.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Simulation labels that are never exported as debug traces.
pub const DEFAULT_SIMULATION_IGNORE: [&str; 4] = [
    "unlabeled",
    "optimisticFlexSpeedIndex",
    "optimisticSpeedIndex",
    "pessimisticSpeedIndex",
];

/// Configuration threaded into [`crate::ArtifactStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Trace events serialized per chunk. Bounds peak encoder memory.
    pub batch_size: usize,
    /// Dump recorded simulation timings next to the saved directory.
    pub debug_export: bool,
    /// Simulation labels skipped by the debug exporter.
    pub simulation_ignore: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            debug_export: false,
            simulation_ignore: DEFAULT_SIMULATION_IGNORE
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl StoreConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_debug_export(mut self, enabled: bool) -> Self {
        self.debug_export = enabled;
        self
    }
}
