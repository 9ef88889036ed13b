//! Structured observability hooks for save and load.
//!
//! This module provides:
//! - A directory-scoped span for instrumenting save and load futures
//! - Emission functions for the persistence lifecycle: save start, pass
//!   written, save finish, load finish, debug export failure

use std::path::Path;

use tracing::{info, warn};

/// Span tagged with the artifact directory and the operation name.
///
/// Attach it with [`tracing::Instrument`] rather than entering it, so the
/// instrumented future stays `Send` across await points.
pub fn store_span(op: &'static str, base: &Path) -> tracing::Span {
    tracing::info_span!("artifacts.store", op = op, base = %base.display())
}

/// Emit event: save started for `passes` passes.
pub fn emit_save_started(base: &Path, passes: usize) {
    info!(event = "save.started", base = %base.display(), passes = passes);
}

/// Emit event: one pass's trace and log are on disk.
pub fn emit_pass_written(pass: &str, events: usize, trace_bytes: u64) {
    info!(
        event = "pass.written",
        pass = %pass,
        events = events,
        trace_bytes = trace_bytes,
    );
}

/// Emit event: save finished, successfully or not.
pub fn emit_save_finished(base: &Path, passes: usize, duration_ms: u64, success: bool) {
    info!(
        event = "save.finished",
        base = %base.display(),
        passes = passes,
        duration_ms = duration_ms,
        success = success,
    );
}

/// Emit event: artifact set loaded.
pub fn emit_load_finished(base: &Path, traces: usize, logs: usize) {
    info!(
        event = "load.finished",
        base = %base.display(),
        traces = traces,
        logs = logs,
    );
}

/// Emit event: debug trace export failed (warning level).
pub fn emit_debug_export_failed(error: &dyn std::fmt::Display) {
    warn!(event = "debug_export.failed", error = %error);
}
