//! Wire framing for `RpcFrame`s on a byte stream
//!
//! Each frame is a big-endian `u32` body length followed by the protobuf
//! body. The prefix does not count itself.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use prost::Message;
use thiserror::Error;

use crate::RpcFrame;

/// Largest body accepted in either direction (4 MB)
pub const MAX_FRAME_SIZE: u32 = 4 * 1024 * 1024;

/// Size of the length prefix
pub const PREFIX_LEN: usize = 4;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Frame body of {0} bytes exceeds {MAX_FRAME_SIZE}")]
    FrameTooLarge(usize),

    #[error("Peer announced a {0} byte frame")]
    InvalidLength(u32),

    #[error("Malformed frame body: {0}")]
    DecodeError(#[from] prost::DecodeError),

    #[error("Could not encode frame: {0}")]
    EncodeError(#[from] prost::EncodeError),
}

/// Encode one frame into its own buffer
pub fn encode(frame: &RpcFrame) -> Result<Bytes, CodecError> {
    let mut out = BytesMut::new();
    encode_into(frame, &mut out)?;
    Ok(out.freeze())
}

/// Append one framed `frame` to `out`
pub fn encode_into(frame: &RpcFrame, out: &mut BytesMut) -> Result<(), CodecError> {
    let body_len = frame.encoded_len();
    let prefix = u32::try_from(body_len)
        .ok()
        .filter(|len| *len <= MAX_FRAME_SIZE)
        .ok_or(CodecError::FrameTooLarge(body_len))?;

    out.reserve(PREFIX_LEN + body_len);
    out.put_u32(prefix);
    frame.encode(out)?;
    Ok(())
}

/// Body length announced at the front of `buf`, once the whole prefix is there
fn peek_body_len(buf: &[u8]) -> Option<u32> {
    let mut prefix = buf.get(..PREFIX_LEN)?;
    Some(prefix.get_u32())
}

/// Take the first complete frame off the front of `buf`
///
/// Leaves `buf` untouched and returns `Ok(None)` while the frame is still
/// incomplete.
pub fn decode(buf: &mut BytesMut) -> Result<Option<RpcFrame>, CodecError> {
    let Some(body_len) = peek_body_len(buf) else {
        return Ok(None);
    };
    if body_len > MAX_FRAME_SIZE {
        return Err(CodecError::InvalidLength(body_len));
    }

    let frame_len = PREFIX_LEN + body_len as usize;
    if buf.len() < frame_len {
        buf.reserve(frame_len - buf.len());
        return Ok(None);
    }

    let body = buf.split_to(frame_len).split_off(PREFIX_LEN).freeze();
    Ok(Some(RpcFrame::decode(body)?))
}

/// Reassembles frames from arbitrarily split reads
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the stream
    pub fn extend(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    /// Next complete frame, `Ok(None)` until more bytes arrive
    pub fn decode_next(&mut self) -> Result<Option<RpcFrame>, CodecError> {
        decode(&mut self.pending)
    }

    /// Bytes received but not yet part of a returned frame
    pub fn buffer_len(&self) -> usize {
        self.pending.len()
    }
}
