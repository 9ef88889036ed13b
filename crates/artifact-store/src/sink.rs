//! Streaming sinks for encoded chunks.
//!
//! [`stream_chunks`] drives a pull-based chunk iterator into any
//! [`AsyncWrite`] destination. The next chunk is only pulled once the
//! destination has accepted the previous one, so a slow destination stalls
//! the encoder instead of letting encoded output pile up in memory. On the
//! first write error nothing further is pulled and the error is returned.
//!
//! File destinations are written through a temp file in the target
//! directory and renamed onto the final name once flushed and synced. An
//! existing file is replaced, never appended to, and keeps its permissions.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::TempPath;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::domain::{ArtifactError, Result};
use crate::metrics::METRICS;

/// Totals for one completed stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub chunks: u64,
    pub bytes: u64,
}

/// Write every chunk to `writer` in order, then flush.
///
/// An encoding error from the iterator is surfaced as `InvalidData`.
pub async fn stream_chunks<I, W>(chunks: I, writer: &mut W) -> io::Result<StreamStats>
where
    I: IntoIterator<Item = serde_json::Result<String>>,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut stats = StreamStats::default();
    for chunk in chunks {
        let chunk = chunk.map_err(io::Error::from)?;
        writer.write_all(chunk.as_bytes()).await?;
        stats.chunks += 1;
        stats.bytes += chunk.len() as u64;
    }
    writer.flush().await?;
    METRICS.add_streamed(stats.chunks, stats.bytes);
    Ok(stats)
}

/// Stream chunks into an in-memory buffer and return the text.
pub async fn stream_to_string<I>(chunks: I) -> io::Result<String>
where
    I: IntoIterator<Item = serde_json::Result<String>>,
{
    let mut buf: Vec<u8> = Vec::new();
    stream_chunks(chunks, &mut buf).await?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Stream chunks into `path`, replacing any existing file.
pub async fn stream_to_file<I>(chunks: I, path: &Path) -> Result<StreamStats>
where
    I: IntoIterator<Item = serde_json::Result<String>>,
{
    let fail = |e: io::Error| ArtifactError::write_failure(path, e);

    let mut pending = PendingFile::create(path).map_err(fail)?;
    let stats = stream_chunks(chunks, &mut pending.file)
        .await
        .map_err(fail)?;
    pending.commit().await.map_err(fail)?;

    debug!(path = %path.display(), chunks = stats.chunks, bytes = stats.bytes, "stream written");
    Ok(stats)
}

/// Serialize `value` in one shot and write it to `path`.
pub async fn write_document<T>(value: &T, path: &Path, pretty: bool) -> Result<u64>
where
    T: Serialize + ?Sized,
{
    let bytes = if pretty {
        serde_json::to_vec_pretty(value)?
    } else {
        serde_json::to_vec(value)?
    };
    let fail = |e: io::Error| ArtifactError::write_failure(path, e);

    let mut pending = PendingFile::create(path).map_err(fail)?;
    pending.file.write_all(&bytes).await.map_err(fail)?;
    pending.commit().await.map_err(fail)?;

    debug!(path = %path.display(), bytes = bytes.len(), "document written");
    Ok(bytes.len() as u64)
}

/// A temp file next to its final destination.
struct PendingFile {
    file: tokio::fs::File,
    temp: TempPath,
    dest: PathBuf,
}

impl PendingFile {
    fn create(dest: &Path) -> io::Result<Self> {
        let dir = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut builder = tempfile::Builder::new();
        builder.prefix(".artifact-").suffix(".partial");
        // Plain files get the process umask, as `File::create` would.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(std::fs::Permissions::from_mode(0o666));
        }
        let (file, temp) = builder.tempfile_in(dir)?.into_parts();

        // An overwritten file keeps its mode.
        if let Ok(meta) = std::fs::metadata(dest) {
            if meta.is_file() {
                file.set_permissions(meta.permissions())?;
            }
        }

        Ok(Self {
            file: tokio::fs::File::from_std(file),
            temp,
            dest: dest.to_path_buf(),
        })
    }

    async fn commit(mut self) -> io::Result<()> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        drop(self.file);
        self.temp.persist(&self.dest).map_err(|e| e.error)
    }
}
