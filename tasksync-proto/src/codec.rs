//! Serialization for the daemon socket protocol.
//!
//! Messages are encoded with postcard and framed with a 4-byte little-endian
//! length prefix, since a Unix stream socket does not preserve message
//! boundaries.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Largest payload accepted by [`decode_framed`] and [`frame_len`].
pub const MAX_FRAME_LEN: usize = 4 * 1024 * 1024;

/// Size of the length prefix in bytes.
pub const PREFIX_LEN: usize = 4;

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Frame is incomplete or has an invalid length prefix.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

/// Encodes a message into a byte vector using postcard.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the value cannot be serialized.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(value).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a message from a byte slice using postcard.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the bytes cannot be deserialized.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    postcard::from_bytes(bytes).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Encodes a message with a 4-byte little-endian length prefix.
///
/// Wire format: `[u32 length (LE)][payload bytes]`
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the value cannot be serialized,
/// or `CodecError::InvalidFrame` if the payload exceeds [`MAX_FRAME_LEN`].
pub fn encode_framed<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    let payload = encode(value)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(CodecError::InvalidFrame(format!(
            "payload too large for framing: {} bytes",
            payload.len()
        )));
    }
    let len = u32::try_from(payload.len()).map_err(|_| {
        CodecError::InvalidFrame(format!(
            "payload too large for framing: {} bytes",
            payload.len()
        ))
    })?;
    let mut frame = Vec::with_capacity(PREFIX_LEN + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Reads the payload length out of a length prefix.
///
/// Stream readers call this after reading exactly [`PREFIX_LEN`] bytes to
/// learn how many payload bytes follow.
///
/// # Errors
///
/// Returns `CodecError::InvalidFrame` if the announced length exceeds
/// [`MAX_FRAME_LEN`].
pub fn frame_len(prefix: [u8; PREFIX_LEN]) -> Result<usize, CodecError> {
    let len = u32::from_le_bytes(prefix) as usize;
    if len > MAX_FRAME_LEN {
        return Err(CodecError::InvalidFrame(format!(
            "frame of {len} bytes exceeds limit of {MAX_FRAME_LEN}"
        )));
    }
    Ok(len)
}

/// Decodes a length-prefixed frame.
///
/// Returns the decoded message and the total number of bytes consumed
/// from the input (including the length prefix).
///
/// # Errors
///
/// Returns `CodecError::InvalidFrame` if the input is too short, or the
/// length prefix is over the limit or indicates more data than available.
/// Returns `CodecError::Serialization` if the payload cannot be deserialized.
pub fn decode_framed<T: DeserializeOwned>(bytes: &[u8]) -> Result<(T, usize), CodecError> {
    if bytes.len() < PREFIX_LEN {
        return Err(CodecError::InvalidFrame(format!(
            "need at least {PREFIX_LEN} bytes for length prefix, got {}",
            bytes.len()
        )));
    }
    let prefix: [u8; PREFIX_LEN] = bytes[..PREFIX_LEN]
        .try_into()
        .map_err(|_| CodecError::InvalidFrame("failed to read length prefix".into()))?;
    let payload_len = frame_len(prefix)?;

    let total_len = PREFIX_LEN + payload_len;
    if bytes.len() < total_len {
        return Err(CodecError::InvalidFrame(format!(
            "frame indicates {} bytes but only {} available",
            payload_len,
            bytes.len() - PREFIX_LEN
        )));
    }

    let value = decode(&bytes[PREFIX_LEN..total_len])?;
    Ok((value, total_len))
}
