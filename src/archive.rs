//! Streaming zip assembly over many remote object streams.
//!
//! Object bytes are piped one entry at a time through the compressor into a
//! bounded channel of `Result<Bytes>`, so a slow consumer backpressures the
//! gateway reads instead of buffering whole objects. A failure mid-assembly
//! terminates the outbound stream with an `Err` item; the consumer never
//! mistakes a truncated container for a complete one.

use crate::enumerate::{Exclusion, RecursiveEnumerator};
use crate::error::{Error, Result};
use crate::gateway::{base_name, ObjectStoreGateway};
use async_zip::tokio::write::ZipFileWriter;
use async_zip::{Compression, ZipEntryBuilder};
use bytes::Bytes;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::compat::TokioAsyncReadCompatExt;
use tokio_util::sync::PollSender;
use tracing::{debug, warn};

/// One resolved archive member: the store key it reads from and the path it
/// gets inside the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub key: String,
    pub name: String,
}

/// How a resolved key is named inside the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryNaming {
    /// Final path segment only; used for flat multi-file downloads.
    BaseName,
    /// Full key, preserving the folder hierarchy inside the archive.
    FullKey,
}

impl EntryNaming {
    fn apply(&self, key: &str) -> String {
        match self {
            EntryNaming::BaseName => base_name(key).to_string(),
            EntryNaming::FullKey => key.to_string(),
        }
    }
}

/// Explicit keys under the chosen naming strategy. Caller validates caps.
pub fn entries_for_keys(keys: &[String], naming: EntryNaming) -> Vec<ArchiveEntry> {
    keys.iter()
        .map(|key| ArchiveEntry {
            key: key.clone(),
            name: naming.apply(key),
        })
        .collect()
}

/// Expand folder prefixes into entries named by their full key, dropping
/// placeholder markers. Explicit keys come first, then folder contents in
/// page order.
pub async fn resolve_entries(
    gateway: &dyn ObjectStoreGateway,
    bucket: &str,
    file_keys: &[String],
    folder_prefixes: &[String],
) -> Result<Vec<ArchiveEntry>> {
    let mut entries = entries_for_keys(file_keys, EntryNaming::BaseName);

    let enumerator = RecursiveEnumerator::new(gateway);
    for prefix in folder_prefixes {
        let keys = enumerator
            .collect_keys(bucket, prefix, Exclusion::PlaceholderMarkers)
            .await?;
        entries.extend(entries_for_keys(&keys, EntryNaming::FullKey));
    }

    Ok(entries)
}

pub struct ArchiveStreamAssembler {
    gateway: Arc<dyn ObjectStoreGateway>,
    channel_capacity: usize,
}

impl ArchiveStreamAssembler {
    pub fn new(gateway: Arc<dyn ObjectStoreGateway>, channel_capacity: usize) -> Self {
        Self {
            gateway,
            channel_capacity,
        }
    }

    /// Start assembling and return the outbound byte stream immediately;
    /// entries are appended while the consumer is already reading. The
    /// stream is not restartable. Duplicate entry names are appended as-is
    /// (last-write-wins for extractors).
    pub fn stream(
        &self,
        bucket: String,
        entries: Vec<ArchiveEntry>,
    ) -> ReceiverStream<std::result::Result<Bytes, Error>> {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let gateway = self.gateway.clone();

        tokio::spawn(async move {
            let error_tx = tx.clone();
            if let Err(e) = assemble(gateway.as_ref(), &bucket, &entries, tx).await {
                if error_tx.is_closed() {
                    // Consumer went away; nothing left to signal.
                    debug!(bucket = %bucket, "archive consumer disconnected");
                } else {
                    warn!(bucket = %bucket, error = %e, "archive assembly failed");
                    let _ = error_tx.send(Err(e)).await;
                }
            }
        });

        ReceiverStream::new(rx)
    }
}

async fn assemble(
    gateway: &dyn ObjectStoreGateway,
    bucket: &str,
    entries: &[ArchiveEntry],
    tx: mpsc::Sender<std::result::Result<Bytes, Error>>,
) -> Result<()> {
    let sink = ChannelWriter::new(tx);
    let mut zip = ZipFileWriter::with_tokio(sink);

    for entry in entries {
        debug!(bucket, key = %entry.key, name = %entry.name, "appending archive entry");

        let reader = gateway.get_object_stream(bucket, &entry.key).await?;
        let builder = ZipEntryBuilder::new(entry.name.clone().into(), Compression::Deflate);

        let mut entry_writer = zip
            .write_entry_stream(builder)
            .await
            .map_err(|e| Error::Stream(e.to_string()))?;
        futures::io::copy(reader.compat(), &mut entry_writer)
            .await
            .map_err(|e| Error::Stream(e.to_string()))?;
        entry_writer
            .close()
            .await
            .map_err(|e| Error::Stream(e.to_string()))?;
    }

    // Central directory and trailer; only after this is the container whole.
    zip.close().await.map_err(|e| Error::Stream(e.to_string()))?;
    Ok(())
}

/// `AsyncWrite` adapter pushing chunks into the bounded outbound channel.
/// A dropped receiver surfaces as a broken pipe, which aborts the assembly
/// loop and with it any further gateway calls.
struct ChannelWriter {
    tx: PollSender<std::result::Result<Bytes, Error>>,
}

impl ChannelWriter {
    fn new(tx: mpsc::Sender<std::result::Result<Bytes, Error>>) -> Self {
        Self {
            tx: PollSender::new(tx),
        }
    }
}

impl AsyncWrite for ChannelWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let this = self.get_mut();
        if ready!(this.tx.poll_reserve(cx)).is_err() {
            return Poll::Ready(Err(disconnected()));
        }
        if this
            .tx
            .send_item(Ok(Bytes::copy_from_slice(buf)))
            .is_err()
        {
            return Poll::Ready(Err(disconnected()));
        }
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn disconnected() -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        "archive consumer disconnected",
    )
}
