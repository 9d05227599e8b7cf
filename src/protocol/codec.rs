//! Length-prefixed JSON framing.
//!
//! Every frame is a 4-byte big-endian payload length followed by that many
//! bytes of UTF-8 JSON. Requests carry exactly one frame; response streams
//! carry any number, ending with `end_of_messages`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Bytes in the length prefix.
pub const FRAME_HEADER_LEN: usize = 4;

/// Largest payload accepted by the decoder.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame of {0} bytes exceeds the frame size limit")]
    FrameTooLarge(usize),

    #[error("truncated frame: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialize `message` into a single frame.
pub fn encode_frame<T: Serialize + ?Sized>(message: &T) -> Result<Vec<u8>, CodecError> {
    let payload = serde_json::to_vec(message)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLarge(payload.len()));
    }

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decode the single frame of a request body. Empty input yields `None`.
pub fn decode_single<T: DeserializeOwned>(bytes: &[u8]) -> Result<Option<T>, CodecError> {
    let mut decoder = FrameDecoder::new();
    decoder.extend(bytes);
    match decoder.next_message()? {
        Some(message) => Ok(Some(message)),
        None if bytes.is_empty() => Ok(None),
        None => Err(decoder.truncation()),
    }
}

/// Decode every frame in `bytes`. Trailing partial frames are an error.
pub fn decode_all<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>, CodecError> {
    let mut decoder = FrameDecoder::new();
    decoder.extend(bytes);

    let mut messages = Vec::new();
    while let Some(message) = decoder.next_message()? {
        messages.push(message);
    }
    if decoder.buffered() > 0 {
        return Err(decoder.truncation());
    }
    Ok(messages)
}

/// Incremental decoder for a stream of frames arriving in chunks.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Bytes received but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Next complete payload, or `None` until more bytes arrive.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, CodecError> {
        let Some(len) = self.declared_len() else {
            return Ok(None);
        };
        if len > MAX_FRAME_LEN {
            return Err(CodecError::FrameTooLarge(len));
        }
        if self.buf.len() < FRAME_HEADER_LEN + len {
            return Ok(None);
        }

        let payload = self.buf[FRAME_HEADER_LEN..FRAME_HEADER_LEN + len].to_vec();
        self.buf.drain(..FRAME_HEADER_LEN + len);
        Ok(Some(payload))
    }

    pub fn next_message<T: DeserializeOwned>(&mut self) -> Result<Option<T>, CodecError> {
        match self.next_frame()? {
            Some(payload) => Ok(Some(serde_json::from_slice(&payload)?)),
            None => Ok(None),
        }
    }

    fn declared_len(&self) -> Option<usize> {
        let header: [u8; FRAME_HEADER_LEN] = self.buf.get(..FRAME_HEADER_LEN)?.try_into().ok()?;
        Some(u32::from_be_bytes(header) as usize)
    }

    fn truncation(&self) -> CodecError {
        CodecError::Truncated {
            expected: self
                .declared_len()
                .map_or(FRAME_HEADER_LEN, |len| FRAME_HEADER_LEN + len),
            actual: self.buf.len(),
        }
    }
}
