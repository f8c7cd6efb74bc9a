//! Async field reader/writer over any byte stream.
//!
//! [`FieldStream`] wraps an `AsyncRead + AsyncWrite` transport (a
//! `TcpStream` in production, an in-memory duplex or mock in tests) and moves
//! whole fields across it using the codec in [`crate::protocol::codec`].
//!
//! # Staying in sync
//!
//! The stream must never lose track of field boundaries, because the protocol
//! is a strict request/response sequence.  Two malformed inputs are therefore
//! *consumed completely* before being reported:
//!
//! - a frame whose declared length is over [`MAX_FIELD_LEN`] is drained from
//!   the transport;
//! - a frame whose payload is not UTF-8 has already been read in full.
//!
//! Both surface as [`StreamError::Malformed`], which callers may treat as a
//! recoverable protocol error.  Everything else (`Closed`, `Io`) is fatal for
//! the connection.

use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::protocol::codec::{
    decode_field, decode_length_prefix, encode_field, ProtocolError, LENGTH_PREFIX_SIZE,
    MAX_FIELD_LEN,
};

/// Errors produced while reading or writing fields.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The peer closed the connection.
    #[error("connection closed by peer")]
    Closed,

    /// The transport failed.
    #[error("connection I/O error: {0}")]
    Io(#[from] io::Error),

    /// A complete frame was received but its content is invalid.  The stream
    /// is still positioned at the next frame boundary.
    #[error("malformed field: {0}")]
    Malformed(#[source] ProtocolError),
}

impl StreamError {
    /// Returns `true` if the connection can keep going after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StreamError::Malformed(_))
    }
}

/// A byte stream that exchanges length-prefixed text fields.
pub struct FieldStream<S> {
    inner: S,
}

impl<S> FieldStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps `inner`.
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Reads exactly one field.
    ///
    /// # Errors
    ///
    /// - [`StreamError::Closed`] if the peer hung up (including mid-frame).
    /// - [`StreamError::Malformed`] for an over-long or non-UTF-8 frame.
    /// - [`StreamError::Io`] for any other transport failure.
    pub async fn read_field(&mut self) -> Result<String, StreamError> {
        let mut frame = vec![0u8; LENGTH_PREFIX_SIZE];
        read_exact_or_closed(&mut self.inner, &mut frame).await?;

        let payload_len = match decode_length_prefix(&frame) {
            Ok(len) => len,
            Err(ProtocolError::FieldTooLong { len, max }) => {
                debug!("discarding {len}-byte field (limit {max})");
                self.discard(len).await?;
                return Err(StreamError::Malformed(ProtocolError::FieldTooLong {
                    len,
                    max,
                }));
            }
            Err(e) => return Err(StreamError::Malformed(e)),
        };

        frame.resize(LENGTH_PREFIX_SIZE + payload_len, 0);
        read_exact_or_closed(&mut self.inner, &mut frame[LENGTH_PREFIX_SIZE..]).await?;

        decode_field(&frame)
            .map(|(text, _)| text)
            .map_err(StreamError::Malformed)
    }

    /// Writes one field and flushes it.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Malformed`] if `text` is longer than
    /// [`MAX_FIELD_LEN`] bytes (nothing is written in that case), or
    /// [`StreamError::Io`] if the transport fails.
    pub async fn write_field(&mut self, text: &str) -> Result<(), StreamError> {
        let bytes = encode_field(text).map_err(StreamError::Malformed)?;
        self.inner.write_all(&bytes).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Shuts down the write side of the transport.
    pub async fn shutdown(&mut self) -> Result<(), StreamError> {
        self.inner.shutdown().await?;
        Ok(())
    }

    /// Returns the wrapped transport.
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Reads and drops `len` payload bytes so the next read starts on a frame
    /// boundary.
    async fn discard(&mut self, len: usize) -> Result<(), StreamError> {
        let mut scratch = [0u8; MAX_FIELD_LEN];
        let mut remaining = len;
        while remaining > 0 {
            let chunk = remaining.min(scratch.len());
            read_exact_or_closed(&mut self.inner, &mut scratch[..chunk]).await?;
            remaining -= chunk;
        }
        Ok(())
    }
}

/// `read_exact` that maps an early EOF to [`StreamError::Closed`].
async fn read_exact_or_closed<R>(reader: &mut R, buf: &mut [u8]) -> Result<(), StreamError>
where
    R: AsyncRead + Unpin,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(StreamError::Closed),
        Err(e) => Err(StreamError::Io(e)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
