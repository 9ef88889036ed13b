//! Artifact set, trace and protocol log models.
//!
//! An [`ArtifactSet`] is what one capture session produces: opaque named
//! fields plus, per pass, a [`Trace`] and a [`ProtocolLog`]. Events and
//! protocol messages are carried as raw JSON values and never inspected.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::{ArtifactError, Result};

/// Key of the per-pass trace map.
pub const TRACES_KEY: &str = "traces";
/// Key of the per-pass protocol log map.
pub const PROTOCOL_LOGS_KEY: &str = "protocolLogs";
/// On-disk key of a trace's event array.
pub const TRACE_EVENTS_KEY: &str = "traceEvents";
/// Field holding capture-phase timing entries.
pub const TIMING_FIELD: &str = "Timing";
/// Marker added to every reloaded timing entry.
pub const GATHER_MARKER: &str = "capturedDuringGather";

/// Identifier of one capture pass. Also used as a filename component.
pub type PassName = String;

/// Ordered protocol messages captured during one pass.
pub type ProtocolLog = Vec<Value>;

/// Everything one capture session produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSet {
    /// Trace per pass name.
    #[serde(default)]
    pub traces: BTreeMap<PassName, Trace>,
    /// Protocol log per pass name.
    #[serde(default, rename = "protocolLogs")]
    pub protocol_logs: BTreeMap<PassName, ProtocolLog>,
    /// Every other artifact, persisted verbatim.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ArtifactSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an opaque field. Reserved keys are rejected so they cannot
    /// shadow the per-pass maps.
    pub fn insert_field(&mut self, key: impl Into<String>, value: Value) -> bool {
        let key = key.into();
        if is_reserved_key(&key) {
            return false;
        }
        self.fields.insert(key, value);
        true
    }

    /// Add a pass with its trace and protocol log.
    pub fn insert_pass(&mut self, name: impl Into<PassName>, trace: Trace, log: ProtocolLog) {
        let name = name.into();
        self.traces.insert(name.clone(), trace);
        self.protocol_logs.insert(name, log);
    }

    /// Opaque fields with any reserved key filtered out.
    pub fn plain_fields(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .filter(|(k, _)| !is_reserved_key(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Tag every entry of the timing field with the gather marker.
    ///
    /// Entries loaded from disk were recorded during capture; later analysis
    /// appends its own entries to the same field, and the marker tells them
    /// apart. Non-array timing fields and non-object entries are left alone.
    pub fn mark_gather_timings(&mut self) {
        if let Some(Value::Array(entries)) = self.fields.get_mut(TIMING_FIELD) {
            for entry in entries.iter_mut() {
                if let Value::Object(obj) = entry {
                    obj.insert(GATHER_MARKER.to_string(), Value::Bool(true));
                }
            }
        }
    }
}

/// Whether `key` names one of the per-pass maps.
pub fn is_reserved_key(key: &str) -> bool {
    key == TRACES_KEY || key == PROTOCOL_LOGS_KEY
}

/// One pass's event trace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// Events in capture order. Order is preserved exactly on save and load.
    #[serde(rename = "traceEvents")]
    pub events: Vec<Value>,
    /// Auxiliary top-level fields such as `metadata`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Trace {
    pub fn new(events: Vec<Value>) -> Self {
        Self {
            events,
            extra: Map::new(),
        }
    }

    /// Build a trace from a parsed document of either supported shape.
    pub fn from_document(doc: Value) -> std::result::Result<Self, String> {
        match TraceFormat::detect(&doc) {
            Some(TraceFormat::LegacyArray) => match doc {
                Value::Array(events) => Ok(Self::new(events)),
                _ => Err("expected an event array".to_string()),
            },
            Some(TraceFormat::Object) => serde_json::from_value(doc).map_err(|e| e.to_string()),
            None => Err(format!(
                "expected an object with `{TRACE_EVENTS_KEY}` or a bare event array"
            )),
        }
    }
}

/// Shape of a serialized trace document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceFormat {
    /// `{"traceEvents": [...], ...}`
    Object,
    /// Older writers stored only the event array.
    LegacyArray,
}

impl TraceFormat {
    /// Classify a parsed document. Returns `None` for unsupported shapes.
    pub fn detect(doc: &Value) -> Option<Self> {
        match doc {
            Value::Array(_) => Some(Self::LegacyArray),
            Value::Object(obj) if obj.get(TRACE_EVENTS_KEY).is_some_and(Value::is_array) => {
                Some(Self::Object)
            }
            _ => None,
        }
    }
}

/// Reject pass names that cannot safely be used as a filename component.
pub fn validate_pass_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if invalid {
        return Err(ArtifactError::InvalidPassName(name.to_string()));
    }
    Ok(())
}

/// Reject a trace whose auxiliary fields would collide with its event array.
pub fn validate_trace(pass: &str, trace: &Trace) -> Result<()> {
    if trace.extra.contains_key(TRACE_EVENTS_KEY) {
        return Err(ArtifactError::ReservedTraceField {
            pass: pass.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trace_serializes_events_under_trace_events_key() {
        let mut trace = Trace::new(vec![json!({"ts": 1, "name": "a"})]);
        trace.extra.insert("metadata".into(), json!({"source": "test"}));

        let value = serde_json::to_value(&trace).unwrap();
        assert_eq!(value["traceEvents"][0]["name"], "a");
        assert_eq!(value["metadata"]["source"], "test");
        assert!(value.get("events").is_none());
        assert!(value.get("extra").is_none());
    }

    #[test]
    fn test_from_document_normalizes_legacy_array() {
        let doc = json!([{"ts": 1}, {"ts": 2}]);
        assert_eq!(TraceFormat::detect(&doc), Some(TraceFormat::LegacyArray));

        let trace = Trace::from_document(doc).unwrap();
        assert_eq!(trace.events, vec![json!({"ts": 1}), json!({"ts": 2})]);
        assert!(trace.extra.is_empty());
    }

    #[test]
    fn test_from_document_rejects_unknown_shapes() {
        assert!(Trace::from_document(json!({"events": []})).is_err());
        assert!(Trace::from_document(json!("trace")).is_err());
        assert!(Trace::from_document(json!({"traceEvents": {}})).is_err());
    }

    #[test]
    fn test_artifact_set_flattens_fields() {
        let mut set = ArtifactSet::new();
        set.insert_field("RequestedUrl", json!("https://example.com"));
        set.insert_pass("defaultPass", Trace::default(), vec![json!({"method": "x"})]);

        let value = serde_json::to_value(&set).unwrap();
        assert_eq!(value["RequestedUrl"], "https://example.com");
        assert!(value["traces"]["defaultPass"]["traceEvents"].is_array());
        assert_eq!(value["protocolLogs"]["defaultPass"][0]["method"], "x");

        let back: ArtifactSet = serde_json::from_value(value).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn test_insert_field_rejects_reserved_keys() {
        let mut set = ArtifactSet::new();
        assert!(!set.insert_field("traces", json!({})));
        assert!(!set.insert_field("protocolLogs", json!({})));
        assert!(set.insert_field("Stacks", json!([])));
        assert_eq!(set.fields.len(), 1);
    }

    #[test]
    fn test_mark_gather_timings_tags_object_entries_only() {
        let mut set = ArtifactSet::new();
        set.insert_field("Timing", json!([{"name": "gather"}, 7]));
        set.mark_gather_timings();

        assert_eq!(set.fields["Timing"][0]["capturedDuringGather"], json!(true));
        assert_eq!(set.fields["Timing"][1], json!(7));
    }

    #[test]
    fn test_mark_gather_timings_ignores_non_array() {
        let mut set = ArtifactSet::new();
        set.insert_field("Timing", json!({"name": "x"}));
        set.mark_gather_timings();
        assert_eq!(set.fields["Timing"], json!({"name": "x"}));
    }

    #[test]
    fn test_validate_trace_rejects_shadowing_extra_field() {
        let mut trace = Trace::new(vec![json!({"ts": 1})]);
        assert!(validate_trace("defaultPass", &trace).is_ok());

        trace.extra.insert("traceEvents".into(), json!([{"ts": 99}]));
        match validate_trace("defaultPass", &trace) {
            Err(ArtifactError::ReservedTraceField { pass }) => assert_eq!(pass, "defaultPass"),
            other => panic!("expected ReservedTraceField, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_pass_name() {
        assert!(validate_pass_name("defaultPass").is_ok());
        assert!(validate_pass_name("offline-pass_2").is_ok());
        for bad in ["", ".", "..", "a/b", "a\\b", "../escape"] {
            assert!(
                matches!(validate_pass_name(bad), Err(ArtifactError::InvalidPassName(_))),
                "{bad:?} should be rejected"
            );
        }
    }
}
