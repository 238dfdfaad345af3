//! Line-delimited JSON transport over the server's stdin/stdout.
//!
//! Each JSON-RPC message is a single line terminated by `\n`.
//! Reads are bounded: an expired wait is an error, never a hang.

use std::io::ErrorKind;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::trace;

use crate::error::TransportError;

/// Writes requests to the server's stdin, reads replies from its stdout.
///
/// Generic over reader/writer so tests can use in-memory pipes.
pub struct LineTransport<R, W> {
    reader: BufReader<R>,
    writer: W,
}

impl<R, W> LineTransport<R, W>
where
    R: tokio::io::AsyncRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    /// Creates a new transport with the given reader and writer.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Reads the next line from the server.
    ///
    /// Returns `None` on EOF (the server closed stdout). A blank line
    /// is returned as an empty string. A line that is not UTF-8 is an
    /// [`TransportError::InvalidUtf8`] carrying a lossy copy of it.
    pub async fn read_line(&mut self) -> Result<Option<String>, TransportError> {
        let mut buf = Vec::new();
        let bytes_read = self
            .reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| TransportError::Read(e.to_string()))?;

        if bytes_read == 0 {
            return Ok(None);
        }

        let line = match String::from_utf8(buf) {
            Ok(line) => line,
            Err(e) => {
                let raw = String::from_utf8_lossy(e.as_bytes()).trim().to_string();
                return Err(TransportError::InvalidUtf8 { raw });
            }
        };
        let trimmed = line.trim().to_string();
        trace!(len = trimmed.len(), "read message");
        Ok(Some(trimmed))
    }

    /// Reads the next line, giving up after `limit`.
    ///
    /// A partially received line is discarded on timeout; callers
    /// abandon the conversation after a timeout anyway.
    pub async fn read_line_within(
        &mut self,
        limit: Duration,
    ) -> Result<Option<String>, TransportError> {
        match tokio::time::timeout(limit, self.read_line()).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                timeout_ms: limit.as_millis() as u64,
            }),
        }
    }

    /// Writes one message followed by `\n` and flushes.
    pub async fn write_line(&mut self, message: &str) -> Result<(), TransportError> {
        trace!(len = message.len(), "writing message");

        self.writer
            .write_all(message.as_bytes())
            .await
            .map_err(write_error)?;

        self.writer.write_all(b"\n").await.map_err(write_error)?;

        self.writer.flush().await.map_err(write_error)?;

        Ok(())
    }

    /// Writes one message, giving up after `limit`.
    pub async fn write_line_within(
        &mut self,
        message: &str,
        limit: Duration,
    ) -> Result<(), TransportError> {
        match tokio::time::timeout(limit, self.write_line(message)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                timeout_ms: limit.as_millis() as u64,
            }),
        }
    }
}

fn write_error(e: std::io::Error) -> TransportError {
    match e.kind() {
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset => TransportError::ConnectionClosed,
        _ => TransportError::Write(e.to_string()),
    }
}
