//! Domain models for artifact persistence.
//!
//! - `ArtifactSet`: named results of one capture session
//! - `Trace`: ordered event sequence of one pass plus auxiliary fields
//! - `ProtocolLog`: ordered protocol messages of one pass

pub mod artifacts;
pub mod error;

pub use artifacts::{
    is_reserved_key, validate_pass_name, validate_trace, ArtifactSet, PassName, ProtocolLog, Trace, TraceFormat,
    GATHER_MARKER, PROTOCOL_LOGS_KEY, TIMING_FIELD, TRACES_KEY, TRACE_EVENTS_KEY,
};
pub use error::{ArtifactError, Result};
