//! Asset export alongside computed audit results.
//!
//! Unlike [`ArtifactStore::save`], these paths name files by pass index and
//! can carry synthetic marker events derived from audit results:
//!
//! - [`ArtifactStore::save_assets`] writes `<base>-<index>.trace.json` and
//!   `<base>-<index>.devtoolslog.json` next to `base`.
//! - [`ArtifactStore::log_assets`] renders every asset in memory and emits
//!   one `loggedAsset %%% <name> %%% <contents>` line per asset.

use std::fmt;
use std::path::Path;

use futures::future::join_all;
use tracing::info;

use crate::bundle::{prepare_pass_assets, AuditAugmentation, PassBundle};
use crate::domain::{validate_trace, ArtifactSet, Result};
use crate::encoder::TraceChunks;
use crate::sink::{stream_to_string, write_document};
use crate::store::{
    suffixed_path, write_trace, ArtifactStore, DEVTOOLS_LOG_SUFFIX, TRACE_SUFFIX,
};

/// One asset rendered for log output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedAsset {
    /// `devtoolslog-<pass>.json` or `trace-<pass>.json`
    pub name: String,
    pub contents: String,
}

impl fmt::Display for LoggedAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loggedAsset %%% {} %%% {}", self.name, self.contents)
    }
}

impl ArtifactStore {
    /// Write every pass by index next to `path_with_basename`.
    ///
    /// Traces are streamed; logs are pretty-printed in one shot. All passes
    /// are written concurrently, then debug export runs when enabled.
    pub async fn save_assets(
        &self,
        artifacts: &ArtifactSet,
        audit: Option<AuditAugmentation<'_>>,
        path_with_basename: &Path,
    ) -> Result<()> {
        for (name, trace) in &artifacts.traces {
            validate_trace(name, trace)?;
        }
        if let Some(parent) = path_with_basename.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let bundles = prepare_pass_assets(artifacts, audit);
        let writes = bundles
            .iter()
            .enumerate()
            .map(|(index, bundle)| self.write_indexed(index, bundle, path_with_basename));
        for result in join_all(writes).await {
            result?;
        }

        info!(
            base = %path_with_basename.display(),
            passes = bundles.len(),
            "assets saved"
        );
        self.run_debug_export(path_with_basename).await;
        Ok(())
    }

    async fn write_indexed(
        &self,
        index: usize,
        bundle: &PassBundle<'_>,
        base: &Path,
    ) -> Result<()> {
        if let Some(log) = bundle.protocol_log {
            let log_file = suffixed_path(base, &format!("-{index}{DEVTOOLS_LOG_SUFFIX}"));
            write_document(log, &log_file, true).await?;
        }
        let trace_file = suffixed_path(base, &format!("-{index}{TRACE_SUFFIX}"));
        write_trace(&bundle.trace, &trace_file, self.config().batch_size).await?;
        Ok(())
    }

    /// Render every pass's log and trace in memory and log one line each.
    ///
    /// Traces go through the same chunk encoder and sink as file output,
    /// with an in-memory buffer as the destination.
    pub async fn log_assets(
        &self,
        artifacts: &ArtifactSet,
        audit: Option<AuditAugmentation<'_>>,
    ) -> Result<Vec<LoggedAsset>> {
        let mut logged = Vec::new();
        for bundle in prepare_pass_assets(artifacts, audit) {
            if let Some(log) = bundle.protocol_log {
                logged.push(LoggedAsset {
                    name: format!("devtoolslog-{}.json", bundle.pass_name),
                    contents: serde_json::to_string(log)?,
                });
            }
            let contents =
                stream_to_string(TraceChunks::new(&bundle.trace, self.config().batch_size))
                    .await?;
            logged.push(LoggedAsset {
                name: format!("trace-{}.json", bundle.pass_name),
                contents,
            });
        }

        for asset in &logged {
            info!("{asset}");
        }
        Ok(logged)
    }
}
