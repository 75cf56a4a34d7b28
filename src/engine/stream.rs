//! Streaming output for CPU-bound encoders.
//!
//! Encoding runs on the blocking pool and writes into a [`ChunkWriter`], which
//! hands fixed-size chunks to the request task over a bounded channel. The
//! client receives bytes while the encoder is still running, and if the client
//! goes away the next send fails and the encoder stops with a broken pipe.

use std::io::{self, Write};

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::EngineError;

use super::ImageStream;

/// Size of the chunks handed to the response body.
pub const CHUNK_SIZE: usize = 16 * 1024;

/// Chunks buffered between the encoder and the response.
const CHANNEL_DEPTH: usize = 4;

/// `io::Write` sink that forwards output in chunks over a channel.
///
/// Must only be used from a blocking thread.
pub struct ChunkWriter {
    tx: mpsc::Sender<Result<Bytes, EngineError>>,
    buf: Vec<u8>,
    chunk_size: usize,
    bytes_sent: usize,
}

impl ChunkWriter {
    fn new(tx: mpsc::Sender<Result<Bytes, EngineError>>, chunk_size: usize) -> Self {
        Self {
            tx,
            buf: Vec::with_capacity(chunk_size),
            chunk_size,
            bytes_sent: 0,
        }
    }

    /// Total bytes handed to the receiver so far.
    pub fn bytes_sent(&self) -> usize {
        self.bytes_sent
    }

    fn send(&mut self, chunk: Vec<u8>) -> io::Result<()> {
        let len = chunk.len();
        self.tx
            .blocking_send(Ok(Bytes::from(chunk)))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "image stream receiver dropped"))?;
        self.bytes_sent += len;
        Ok(())
    }
}

impl Write for ChunkWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        while self.buf.len() >= self.chunk_size {
            let rest = self.buf.split_off(self.chunk_size);
            let chunk = std::mem::replace(&mut self.buf, rest);
            self.send(chunk)?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            let chunk = std::mem::take(&mut self.buf);
            self.send(chunk)?;
        }
        Ok(())
    }
}

/// Run `produce` on the blocking pool and stream what it writes.
///
/// An error returned by `produce` becomes the last item of the stream.
pub fn stream_blocking<F>(produce: F) -> ImageStream
where
    F: FnOnce(&mut ChunkWriter) -> Result<(), EngineError> + Send + 'static,
{
    stream_blocking_with_chunk_size(CHUNK_SIZE, produce)
}

fn stream_blocking_with_chunk_size<F>(chunk_size: usize, produce: F) -> ImageStream
where
    F: FnOnce(&mut ChunkWriter) -> Result<(), EngineError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);

    tokio::task::spawn_blocking(move || {
        let mut writer = ChunkWriter::new(tx.clone(), chunk_size);
        let result = produce(&mut writer).and_then(|()| {
            writer
                .flush()
                .map_err(|e| EngineError::Generation(e.to_string()))
        });

        match result {
            Ok(()) => debug!(bytes = writer.bytes_sent(), "Image stream complete"),
            Err(_) if tx.is_closed() => {
                debug!(bytes = writer.bytes_sent(), "Image stream abandoned by client");
            }
            Err(e) => {
                let _ = tx.blocking_send(Err(e));
            }
        }
    });

    Box::pin(futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    }))
}
