//! Frame Codec
//!
//! Newline-delimited framing for the feed connection.
//!
//! - **Inbound**: bytes up to each `\n`, with a trailing `\r` removed. Blank
//!   lines are skipped. The frame is yielded undecoded so that a malformed
//!   message never poisons the stream.
//! - **Outbound**: any `Serialize` value, fully encoded before a single `\n`
//!   is appended.

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use tokio_util::codec::{Decoder, Encoder};

/// Default upper bound on a single inbound frame (1 MiB).
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 1024 * 1024;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Underlying read or write failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Outbound value could not be encoded.
    #[error("JSON encode error: {0}")]
    Json(#[from] serde_json::Error),

    /// No newline within the configured maximum frame length.
    #[error("frame of {length} bytes exceeds maximum of {max} bytes")]
    FrameTooLong {
        /// Bytes buffered without a delimiter.
        length: usize,
        /// Configured maximum.
        max: usize,
    },
}

/// Newline-delimited JSON codec.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_length: usize,
    /// Bytes of the buffer already scanned for a newline.
    next_index: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LENGTH)
    }
}

impl FrameCodec {
    /// Create a codec that rejects frames longer than `max_frame_length`.
    #[must_use]
    pub const fn new(max_frame_length: usize) -> Self {
        Self {
            max_frame_length,
            next_index: 0,
        }
    }

    /// Configured maximum frame length.
    #[must_use]
    pub const fn max_frame_length(&self) -> usize {
        self.max_frame_length
    }

    fn check_length(&self, length: usize) -> Result<(), CodecError> {
        if length > self.max_frame_length {
            return Err(CodecError::FrameTooLong {
                length,
                max: self.max_frame_length,
            });
        }
        Ok(())
    }
}

fn trim_line(mut line: BytesMut) -> Option<Bytes> {
    if line.last() == Some(&b'\r') {
        line.truncate(line.len() - 1);
    }
    if line.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    Some(line.freeze())
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let start = self.next_index.min(src.len());
            let Some(offset) = src[start..].iter().position(|byte| *byte == b'\n') else {
                self.check_length(src.len())?;
                self.next_index = src.len();
                return Ok(None);
            };

            let newline = start + offset;
            self.next_index = 0;
            let mut line = src.split_to(newline + 1);
            line.truncate(newline);
            self.check_length(line.len())?;

            if let Some(frame) = trim_line(line) {
                return Ok(Some(frame));
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        // Final frame without a trailing newline.
        self.next_index = 0;
        if src.is_empty() {
            return Ok(None);
        }
        Ok(trim_line(src.split_to(src.len())))
    }
}

impl<T: Serialize> Encoder<T> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let encoded = serde_json::to_vec(&item)?;
        dst.reserve(encoded.len() + 1);
        dst.put_slice(&encoded);
        dst.put_u8(b'\n');
        Ok(())
    }
}
