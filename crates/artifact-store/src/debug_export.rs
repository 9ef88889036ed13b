//! Debug export of recorded simulation timings.
//!
//! When enabled, every recorded simulation timing (other than ignored
//! labels) is converted to a trace and streamed to
//! `<base>-<label>.trace.json`, next to the artifact directory. This path is
//! best-effort: one label failing does not stop the others, and the caller
//! only logs the aggregated failure.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::config::StoreConfig;
use crate::domain::{validate_pass_name, ArtifactError, Result, Trace};
use crate::encoder::TraceChunks;
use crate::sink::stream_to_file;
use crate::store::{suffixed_path, TRACE_SUFFIX};

/// Source of timing results recorded by the simulation engine.
pub trait SimulationTimings: Send + Sync {
    /// Recorded timing results keyed by simulation label.
    fn recorded_timings(&self) -> Vec<(String, Value)>;

    /// Convert one timing result into trace shape.
    fn to_trace(&self, timings: &Value) -> Trace;
}

/// Streams simulation timings through the regular trace encoder.
pub struct DebugTraceExporter {
    source: Arc<dyn SimulationTimings>,
    ignore: Vec<String>,
    batch_size: usize,
}

impl DebugTraceExporter {
    pub fn new(source: Arc<dyn SimulationTimings>, config: &StoreConfig) -> Self {
        Self {
            source,
            ignore: config.simulation_ignore.clone(),
            batch_size: config.batch_size,
        }
    }

    /// `<base>-<label>.trace.json`
    pub fn trace_path(base: &Path, label: &str) -> PathBuf {
        suffixed_path(base, &format!("-{label}{TRACE_SUFFIX}"))
    }

    /// Export every non-ignored label. Returns the written paths.
    pub async fn export(&self, base: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        let mut failures = Vec::new();

        for (label, timings) in self.source.recorded_timings() {
            if self.ignore.iter().any(|ignored| *ignored == label) {
                continue;
            }
            if let Err(e) = validate_pass_name(&label) {
                warn!(label = %label, error = %e, "skipping simulation label");
                failures.push(e.to_string());
                continue;
            }

            let path = Self::trace_path(base, &label);
            let trace = self.source.to_trace(&timings);
            match stream_to_file(TraceChunks::new(&trace, self.batch_size), &path).await {
                Ok(_) => {
                    info!(
                        label = %label,
                        path = %path.display(),
                        "simulation trace streamed to disk"
                    );
                    written.push(path);
                }
                Err(e) => failures.push(format!("{label}: {e}")),
            }
        }

        if failures.is_empty() {
            Ok(written)
        } else {
            Err(ArtifactError::DebugExport(failures.join("; ")))
        }
    }
}
