//! Directory-level save and load of artifact sets.
//!
//! Layout under a base directory:
//!
//! | File                          | Content                                      |
//! |-------------------------------|----------------------------------------------|
//! | `artifacts.json`              | every field except traces and protocol logs  |
//! | `<pass>.trace.json`           | one trace, events streamed in batches        |
//! | `<pass>.devtoolslog.json`     | one protocol log, written in one shot        |
//!
//! A save first clears trace, log and main files left by an earlier save,
//! then writes every pass concurrently. Pass writes are joined inside the
//! calling task; a failing pass does not cancel its siblings, and the first
//! failure in pass order is returned once all of them have settled.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, warn, Instrument};

use crate::bundle::{prepare_pass_assets, PassBundle};
use crate::config::StoreConfig;
use crate::debug_export::{DebugTraceExporter, SimulationTimings};
use crate::domain::{
    validate_pass_name, validate_trace, ArtifactError, ArtifactSet, ProtocolLog, Result, Trace,
    PROTOCOL_LOGS_KEY, TRACES_KEY,
};
use crate::encoder::TraceChunks;
use crate::metrics::METRICS;
use crate::obs;
use crate::sink::{stream_to_file, write_document};

/// Main document holding every non-pass field.
pub const ARTIFACTS_FILENAME: &str = "artifacts.json";
/// Suffix of per-pass trace files.
pub const TRACE_SUFFIX: &str = ".trace.json";
/// Suffix of per-pass protocol log files.
pub const DEVTOOLS_LOG_SUFFIX: &str = ".devtoolslog.json";
/// Suffix of temp files left behind by an interrupted write.
const PARTIAL_SUFFIX: &str = ".partial";

/// Saves and loads artifact sets as a directory of JSON files.
pub struct ArtifactStore {
    config: StoreConfig,
    simulation: Option<Arc<dyn SimulationTimings>>,
}

impl ArtifactStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            simulation: None,
        }
    }

    /// Attach the simulation timing source used by debug export.
    pub fn with_simulation_timings(mut self, source: Arc<dyn SimulationTimings>) -> Self {
        self.simulation = Some(source);
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Persist `artifacts` under `base`, replacing any earlier save there.
    pub async fn save(&self, artifacts: &ArtifactSet, base: &Path) -> Result<()> {
        let started = Instant::now();
        let passes = pass_count(artifacts);
        obs::emit_save_started(base, passes);

        let result = self
            .save_inner(artifacts, base)
            .instrument(obs::store_span("save", base))
            .await;

        let duration_ms = started.elapsed().as_millis() as u64;
        obs::emit_save_finished(base, passes, duration_ms, result.is_ok());
        result
    }

    async fn save_inner(&self, artifacts: &ArtifactSet, base: &Path) -> Result<()> {
        for name in artifacts.traces.keys().chain(artifacts.protocol_logs.keys()) {
            validate_pass_name(name)?;
        }
        for (name, trace) in &artifacts.traces {
            validate_trace(name, trace)?;
        }

        tokio::fs::create_dir_all(base).await?;
        let removed = clear_previous_save(base).await?;
        if removed > 0 {
            debug!(removed = removed, "cleared files from previous save");
        }

        let bundles = prepare_pass_assets(artifacts, None);
        let pass_writes = join_all(bundles.iter().map(|b| self.write_pass(b, base)));
        // Logs without a matching trace still belong to the set.
        let log_only_writes = join_all(
            artifacts
                .protocol_logs
                .iter()
                .filter(|(name, _)| !artifacts.traces.contains_key(*name))
                .map(|(name, log)| async move {
                    write_protocol_log(log, &log_path(base, name)).await
                }),
        );
        let (pass_results, log_results) = futures::join!(pass_writes, log_only_writes);

        for result in pass_results.into_iter().chain(log_results) {
            result?;
        }

        write_document(
            &artifacts.plain_fields(),
            &base.join(ARTIFACTS_FILENAME),
            true,
        )
        .await?;

        self.run_debug_export(base).await;
        Ok(())
    }

    async fn write_pass(&self, bundle: &PassBundle<'_>, base: &Path) -> Result<()> {
        let trace_file = trace_path(base, bundle.pass_name);
        let bytes = write_trace(&bundle.trace, &trace_file, self.config.batch_size).await?;
        if let Some(log) = bundle.protocol_log {
            write_protocol_log(log, &log_path(base, bundle.pass_name)).await?;
        }
        obs::emit_pass_written(bundle.pass_name, bundle.trace.events.len(), bytes);
        Ok(())
    }

    /// Export simulation timings when enabled. Failures are only logged.
    pub(crate) async fn run_debug_export(&self, base: &Path) {
        if !self.config.debug_export {
            return;
        }
        let Some(source) = &self.simulation else {
            warn!("debug export enabled but no simulation timing source attached");
            return;
        };
        let exporter = DebugTraceExporter::new(Arc::clone(source), &self.config);
        if let Err(e) = exporter.export(base).await {
            obs::emit_debug_export_failed(&e);
        }
    }

    /// Reconstruct the artifact set saved under `base`.
    ///
    /// Every entry of the `Timing` field gains a `capturedDuringGather`
    /// marker.
    pub async fn load(&self, base: &Path) -> Result<ArtifactSet> {
        load_inner(base)
            .instrument(obs::store_span("load", base))
            .await
    }
}

async fn load_inner(base: &Path) -> Result<ArtifactSet> {
    match tokio::fs::metadata(base).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(ArtifactError::NotFound {
                path: base.to_path_buf(),
            })
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ArtifactError::NotFound {
                path: base.to_path_buf(),
            })
        }
        Err(e) => return Err(ArtifactError::Io(e)),
    }

    let main_path = base.join(ARTIFACTS_FILENAME);
    let mut fields = match read_json(&main_path).await? {
        Value::Object(fields) => fields,
        _ => return Err(ArtifactError::malformed(&main_path, "expected a JSON object")),
    };
    fields.remove(TRACES_KEY);
    fields.remove(PROTOCOL_LOGS_KEY);

    let mut artifacts = ArtifactSet {
        fields,
        ..ArtifactSet::default()
    };

    let mut entries = tokio::fs::read_dir(base).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !resolves_to_file(&path).await? {
            continue;
        }
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };

        if let Some(pass) = name.strip_suffix(TRACE_SUFFIX).filter(|p| !p.is_empty()) {
            let trace = Trace::from_document(read_json(&path).await?)
                .map_err(|reason| ArtifactError::malformed(&path, reason))?;
            artifacts.traces.insert(pass.to_string(), trace);
        } else if let Some(pass) = name
            .strip_suffix(DEVTOOLS_LOG_SUFFIX)
            .filter(|p| !p.is_empty())
        {
            let log: ProtocolLog = serde_json::from_value(read_json(&path).await?)
                .map_err(|e| ArtifactError::malformed(&path, e))?;
            artifacts.protocol_logs.insert(pass.to_string(), log);
        }
    }

    artifacts.mark_gather_timings();

    METRICS.inc_sets_loaded();
    obs::emit_load_finished(base, artifacts.traces.len(), artifacts.protocol_logs.len());
    Ok(artifacts)
}

/// Whether `path` is a regular file, following symlinks. Dangling links
/// count as absent.
async fn resolves_to_file(path: &Path) -> Result<bool> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ArtifactError::Io(e)),
    }
}

/// Remove trace, log, main and temp files written by an earlier save.
///
/// Log files are cleared together with trace files so a save with fewer
/// passes leaves no orphans of either kind. Symlinks with a matching name
/// are unlinked; their targets are left alone.
async fn clear_previous_save(base: &Path) -> Result<usize> {
    let mut removed = 0;
    let mut entries = tokio::fs::read_dir(base).await?;
    while let Some(entry) = entries.next_entry().await? {
        let file_type = entry.file_type().await?;
        if !(file_type.is_file() || file_type.is_symlink()) {
            continue;
        }
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();
        let stale = name == ARTIFACTS_FILENAME
            || name.ends_with(TRACE_SUFFIX)
            || name.ends_with(DEVTOOLS_LOG_SUFFIX)
            || (name.starts_with(".artifact-") && name.ends_with(PARTIAL_SUFFIX));
        if stale {
            tokio::fs::remove_file(entry.path()).await?;
            removed += 1;
        }
    }
    Ok(removed)
}

pub(crate) async fn write_trace(trace: &Trace, path: &Path, batch_size: usize) -> Result<u64> {
    let stats = stream_to_file(TraceChunks::new(trace, batch_size), path).await?;
    METRICS.inc_traces_written();
    Ok(stats.bytes)
}

async fn write_protocol_log(log: &ProtocolLog, path: &Path) -> Result<()> {
    write_document(log, path, false).await.map(|_| ())
}

async fn read_json(path: &Path) -> Result<Value> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            ArtifactError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ArtifactError::Io(e)
        }
    })?;
    serde_json::from_slice(&bytes).map_err(|e| ArtifactError::malformed(path, e))
}

fn pass_count(artifacts: &ArtifactSet) -> usize {
    let log_only = artifacts
        .protocol_logs
        .keys()
        .filter(|name| !artifacts.traces.contains_key(*name))
        .count();
    artifacts.traces.len() + log_only
}

/// `<base>/<pass>.trace.json`
pub fn trace_path(base: &Path, pass: &str) -> PathBuf {
    base.join(format!("{pass}{TRACE_SUFFIX}"))
}

/// `<base>/<pass>.devtoolslog.json`
pub fn log_path(base: &Path, pass: &str) -> PathBuf {
    base.join(format!("{pass}{DEVTOOLS_LOG_SUFFIX}"))
}

/// `<base><suffix>`, a sibling of `base` rather than a child.
pub(crate) fn suffixed_path(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.components().as_path().as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_artifacts(passes: &[&str]) -> ArtifactSet {
        let mut set = ArtifactSet::new();
        set.insert_field("RequestedUrl", json!("https://example.com"));
        for pass in passes {
            set.insert_pass(
                *pass,
                Trace::new(vec![json!({"ts": 1, "name": pass})]),
                vec![json!({"method": "Page.frameNavigated"})],
            );
        }
        set
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_paths() {
        let base = Path::new("/tmp/run");
        assert_eq!(
            trace_path(base, "defaultPass"),
            PathBuf::from("/tmp/run/defaultPass.trace.json")
        );
        assert_eq!(
            log_path(base, "defaultPass"),
            PathBuf::from("/tmp/run/defaultPass.devtoolslog.json")
        );
        assert_eq!(
            suffixed_path(base, "-0.trace.json"),
            PathBuf::from("/tmp/run-0.trace.json")
        );
    }

    #[tokio::test]
    async fn test_save_creates_missing_directory_tree() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("nested").join("run");
        let store = ArtifactStore::new(StoreConfig::default());

        store.save(&make_artifacts(&["defaultPass"]), &base).await.unwrap();
        assert_eq!(
            file_names(&base),
            vec!["artifacts.json", "defaultPass.devtoolslog.json", "defaultPass.trace.json"]
        );
    }

    #[tokio::test]
    async fn test_save_clears_previous_pass_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(StoreConfig::default());

        store
            .save(&make_artifacts(&["a", "b", "c"]), dir.path())
            .await
            .unwrap();
        std::fs::write(dir.path().join(".artifact-abc.partial"), b"{").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"keep me").unwrap();

        store.save(&make_artifacts(&["a"]), dir.path()).await.unwrap();
        assert_eq!(
            file_names(dir.path()),
            vec!["a.devtoolslog.json", "a.trace.json", "artifacts.json", "notes.txt"]
        );
    }

    #[tokio::test]
    async fn test_save_rejects_invalid_pass_name_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("run");
        let store = ArtifactStore::new(StoreConfig::default());

        let err = store
            .save(&make_artifacts(&["../escape"]), &base)
            .await
            .unwrap_err();
        assert!(matches!(err, ArtifactError::InvalidPassName(_)));
        assert!(!base.exists());
    }

    #[tokio::test]
    async fn test_save_rejects_trace_with_shadowing_extra_field() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("run");
        let mut artifacts = make_artifacts(&["defaultPass"]);
        artifacts
            .traces
            .get_mut("defaultPass")
            .unwrap()
            .extra
            .insert("traceEvents".into(), json!([{"ts": 99}]));

        let store = ArtifactStore::new(StoreConfig::default());
        let err = store.save(&artifacts, &base).await.unwrap_err();
        match err {
            ArtifactError::ReservedTraceField { pass } => assert_eq!(pass, "defaultPass"),
            other => panic!("expected ReservedTraceField, got {other:?}"),
        }
        assert!(!base.exists());
    }

    #[tokio::test]
    async fn test_load_missing_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(StoreConfig::default());
        let err = store.load(&dir.path().join("absent")).await.unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_load_missing_main_document_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(StoreConfig::default());
        let err = store.load(dir.path()).await.unwrap_err();
        match err {
            ArtifactError::NotFound { path } => assert!(path.ends_with(ARTIFACTS_FILENAME)),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_load_normalizes_legacy_trace_array() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(ARTIFACTS_FILENAME), "{}").unwrap();
        std::fs::write(
            dir.path().join("legacyPass.trace.json"),
            r#"[{"ts": 1}, {"ts": 2}]"#,
        )
        .unwrap();

        let store = ArtifactStore::new(StoreConfig::default());
        let loaded = store.load(dir.path()).await.unwrap();
        let trace = &loaded.traces["legacyPass"];
        assert_eq!(trace.events, vec![json!({"ts": 1}), json!({"ts": 2})]);
        assert!(trace.extra.is_empty());
    }

    #[tokio::test]
    async fn test_load_malformed_trace_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(ARTIFACTS_FILENAME), "{}").unwrap();
        std::fs::write(dir.path().join("broken.trace.json"), "{\"traceEvents\": [").unwrap();

        let store = ArtifactStore::new(StoreConfig::default());
        let err = store.load(dir.path()).await.unwrap_err();
        match err {
            ArtifactError::MalformedDocument { path, .. } => {
                assert!(path.ends_with("broken.trace.json"))
            }
            other => panic!("expected MalformedDocument, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_load_malformed_main_document_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(ARTIFACTS_FILENAME), "[1, 2]").unwrap();

        let store = ArtifactStore::new(StoreConfig::default());
        let err = store.load(dir.path()).await.unwrap_err();
        assert!(matches!(err, ArtifactError::MalformedDocument { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_load_follows_symlinked_trace() {
        let dir = tempfile::tempdir().unwrap();
        let shared = tempfile::tempdir().unwrap();
        let target = shared.path().join("captured.json");
        std::fs::write(&target, r#"{"traceEvents": [{"ts": 7}]}"#).unwrap();
        std::fs::write(dir.path().join(ARTIFACTS_FILENAME), "{}").unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("linked.trace.json")).unwrap();
        std::os::unix::fs::symlink(
            shared.path().join("gone.json"),
            dir.path().join("dangling.trace.json"),
        )
        .unwrap();

        let store = ArtifactStore::new(StoreConfig::default());
        let loaded = store.load(dir.path()).await.unwrap();
        assert_eq!(loaded.traces.keys().collect::<Vec<_>>(), vec!["linked"]);
        assert_eq!(loaded.traces["linked"].events, vec![json!({"ts": 7})]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_save_unlinks_stale_symlinked_pass_files() {
        let dir = tempfile::tempdir().unwrap();
        let shared = tempfile::tempdir().unwrap();
        let target = shared.path().join("captured.json");
        std::fs::write(&target, r#"{"traceEvents": []}"#).unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("old.trace.json")).unwrap();

        let store = ArtifactStore::new(StoreConfig::default());
        store.save(&make_artifacts(&["a"]), dir.path()).await.unwrap();

        assert_eq!(
            file_names(dir.path()),
            vec!["a.devtoolslog.json", "a.trace.json", "artifacts.json"]
        );
        assert!(target.exists());
    }

    #[tokio::test]
    async fn test_log_only_pass_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut artifacts = ArtifactSet::new();
        artifacts
            .protocol_logs
            .insert("logOnly".into(), vec![json!({"method": "Log.entryAdded"})]);

        let store = ArtifactStore::new(StoreConfig::default());
        store.save(&artifacts, dir.path()).await.unwrap();
        let loaded = store.load(dir.path()).await.unwrap();
        assert_eq!(loaded, artifacts);
    }
}
