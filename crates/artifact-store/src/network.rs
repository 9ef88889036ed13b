//! Network timing data export.
//!
//! Runs one protocol log through the network analysis engine and writes the
//! saveable form of the result as a single pretty-printed document.

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::domain::{ProtocolLog, Result};
use crate::sink::write_document;

/// Network timing analysis engine.
#[async_trait]
pub trait NetworkAnalyzer: Send + Sync {
    /// Analyze the requests recorded in `log`.
    async fn analyze(&self, log: &ProtocolLog) -> Result<Value>;

    /// Convert an analysis into its saveable form.
    fn to_saveable(&self, analysis: Value) -> Value;
}

/// Analyze `log` and write the saveable result to `path`.
pub async fn save_network_data(
    analyzer: &dyn NetworkAnalyzer,
    log: &ProtocolLog,
    path: &Path,
) -> Result<()> {
    let analysis = analyzer.analyze(log).await?;
    let saveable = analyzer.to_saveable(analysis);
    let bytes = write_document(&saveable, path, true).await?;
    info!(path = %path.display(), bytes = bytes, "network data saved");
    Ok(())
}
