//! Artifact Store Library
//!
//! Persists the artifact set of a multi-pass capture session to a directory
//! and reconstructs it later. Traces are streamed to disk in event batches
//! so a large trace is never materialized as one in-memory string.

pub mod assets;
pub mod bundle;
pub mod config;
pub mod debug_export;
pub mod domain;
pub mod encoder;
pub mod metrics;
pub mod network;
pub mod obs;
pub mod sink;
pub mod store;
pub mod telemetry;

pub use assets::LoggedAsset;
pub use bundle::{
    prepare_pass_assets, AuditAugmentation, AuditResults, PassBundle, SyntheticMarkerGenerator,
};
pub use config::{StoreConfig, DEFAULT_BATCH_SIZE, DEFAULT_SIMULATION_IGNORE};
pub use debug_export::{DebugTraceExporter, SimulationTimings};
pub use domain::{
    ArtifactError, ArtifactSet, PassName, ProtocolLog, Result, Trace, TraceFormat, GATHER_MARKER,
    TIMING_FIELD,
};
pub use encoder::TraceChunks;
pub use network::{save_network_data, NetworkAnalyzer};
pub use sink::{stream_chunks, stream_to_file, stream_to_string, write_document, StreamStats};
pub use store::{
    log_path, trace_path, ArtifactStore, ARTIFACTS_FILENAME, DEVTOOLS_LOG_SUFFIX, TRACE_SUFFIX,
};

pub use metrics::METRICS;
pub use obs::{
    emit_debug_export_failed, emit_load_finished, emit_pass_written, emit_save_finished,
    emit_save_started, store_span,
};
pub use telemetry::init_tracing;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
