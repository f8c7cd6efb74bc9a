//! Length-prefixed codec for protocol fields.
//!
//! Wire format of a single field:
//! ```text
//! [payload_len:2][payload:N]
//! ```
//! `payload_len` is big-endian and counts bytes, not characters.  The payload
//! is UTF-8 text (a mode token, a username, a password, or a status word).
//!
//! Every field the protocol exchanges is framed this way, in both directions.
//! A stream transport may split one write across several reads or merge
//! several writes into one read; the length prefix lets the receiver recover
//! the exact field boundaries either way.

use thiserror::Error;

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Largest payload a single field may carry, in bytes.
pub const MAX_FIELD_LEN: usize = 1024;

/// Errors that can occur during field encoding or decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the frame it announces.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The declared payload length exceeds [`MAX_FIELD_LEN`].
    #[error("field too long: {len} bytes exceeds the {max}-byte limit")]
    FieldTooLong { len: usize, max: usize },

    /// The payload is not valid UTF-8.
    #[error("field is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes `text` as one length-prefixed field.
///
/// # Errors
///
/// Returns [`ProtocolError::FieldTooLong`] if `text` is longer than
/// [`MAX_FIELD_LEN`] bytes.
///
/// # Examples
///
/// ```rust
/// use auth_core::protocol::{decode_field, encode_field};
///
/// let bytes = encode_field("LOGIN_SUCCESS").unwrap();
/// let (text, consumed) = decode_field(&bytes).unwrap();
/// assert_eq!(text, "LOGIN_SUCCESS");
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_field(text: &str) -> Result<Vec<u8>, ProtocolError> {
    let len = text.len();
    if len > MAX_FIELD_LEN {
        return Err(ProtocolError::FieldTooLong {
            len,
            max: MAX_FIELD_LEN,
        });
    }

    let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE + len);
    buf.extend_from_slice(&(len as u16).to_be_bytes());
    buf.extend_from_slice(text.as_bytes());
    Ok(buf)
}

/// Decodes one field from the beginning of `bytes`.
///
/// Returns the decoded text and the total number of bytes consumed
/// (prefix + payload), so the caller can advance their read cursor.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the buffer is incomplete, the declared length
/// is over the limit, or the payload is not UTF-8.
pub fn decode_field(bytes: &[u8]) -> Result<(String, usize), ProtocolError> {
    let len = decode_length_prefix(bytes)?;

    let total_needed = LENGTH_PREFIX_SIZE + len;
    if bytes.len() < total_needed {
        return Err(ProtocolError::InsufficientData {
            needed: total_needed,
            available: bytes.len(),
        });
    }

    let text = std::str::from_utf8(&bytes[LENGTH_PREFIX_SIZE..total_needed])?;
    Ok((text.to_owned(), total_needed))
}

/// Reads and validates the length prefix at the start of `bytes`.
///
/// # Errors
///
/// Returns [`ProtocolError::InsufficientData`] when fewer than
/// [`LENGTH_PREFIX_SIZE`] bytes are available, and
/// [`ProtocolError::FieldTooLong`] when the declared length is over the limit.
pub fn decode_length_prefix(bytes: &[u8]) -> Result<usize, ProtocolError> {
    if bytes.len() < LENGTH_PREFIX_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: LENGTH_PREFIX_SIZE,
            available: bytes.len(),
        });
    }

    let len = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
    if len > MAX_FIELD_LEN {
        return Err(ProtocolError::FieldTooLong {
            len,
            max: MAX_FIELD_LEN,
        });
    }
    Ok(len)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
