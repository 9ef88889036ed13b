//! Per-pass asset bundles.
//!
//! [`prepare_pass_assets`] pairs each pass's trace with its protocol log.
//! When audit results are supplied, the bundle carries a copy of the trace
//! with synthetic marker events appended; the source artifact set is only
//! ever borrowed.

use std::borrow::Cow;

use serde_json::{Map, Value};

use crate::domain::{ArtifactSet, ProtocolLog, Trace};

/// Computed audit results, keyed by audit id.
pub type AuditResults = Map<String, Value>;

/// Derives display-only marker events from computed metric values.
pub trait SyntheticMarkerGenerator: Send + Sync {
    /// Events to append after `events`. Must not depend on mutating them.
    fn marker_events(&self, events: &[Value], audits: &AuditResults) -> Vec<Value>;
}

/// Audit results plus the generator that turns them into marker events.
#[derive(Clone, Copy)]
pub struct AuditAugmentation<'a> {
    pub results: &'a AuditResults,
    pub markers: &'a dyn SyntheticMarkerGenerator,
}

/// Trace and protocol log of one pass, ready to be written.
#[derive(Debug, Clone)]
pub struct PassBundle<'a> {
    pub pass_name: &'a str,
    pub trace: Cow<'a, Trace>,
    /// `None` when the artifact set has a trace but no log for this pass.
    pub protocol_log: Option<&'a ProtocolLog>,
}

impl PassBundle<'_> {
    /// Whether the trace was copied to carry marker events.
    pub fn is_augmented(&self) -> bool {
        matches!(self.trace, Cow::Owned(_))
    }
}

/// Build one bundle per pass in `artifacts.traces`, in map order.
pub fn prepare_pass_assets<'a>(
    artifacts: &'a ArtifactSet,
    audit: Option<AuditAugmentation<'_>>,
) -> Vec<PassBundle<'a>> {
    artifacts
        .traces
        .iter()
        .map(|(pass_name, trace)| {
            let trace = match audit {
                Some(audit) => {
                    let markers = audit.markers.marker_events(&trace.events, audit.results);
                    let mut copy = trace.clone();
                    copy.events.extend(markers);
                    Cow::Owned(copy)
                }
                None => Cow::Borrowed(trace),
            };
            PassBundle {
                pass_name: pass_name.as_str(),
                trace,
                protocol_log: artifacts.protocol_logs.get(pass_name),
            }
        })
        .collect()
}
