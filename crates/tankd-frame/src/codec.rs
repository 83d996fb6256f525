use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header size: a 3-byte big-endian payload length.
pub const LEN_SIZE: usize = 3;

/// Maximum payload size representable in 3 length bytes: 16 MiB − 1.
pub const MAX_PAYLOAD: usize = (1 << 24) - 1;

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────────┬─────────────────┐
/// │ Length (3B BE) │ Payload          │
/// └────────────────┴─────────────────┘
/// ```
///
/// A payload larger than [`MAX_PAYLOAD`] is a caller error and is rejected
/// here, at encode time; it can never appear on the wire.
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    let len = payload.len() as u32;
    dst.reserve(LEN_SIZE + payload.len());
    dst.put_slice(&[(len >> 16) as u8, (len >> 8) as u8, len as u8]);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `None` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer. The 3-byte length
/// field cannot express an out-of-range payload, so decoding is total.
pub fn decode_frame(src: &mut BytesMut) -> Option<Bytes> {
    if src.len() < LEN_SIZE {
        return None; // Need more data
    }

    let payload_len =
        ((src[0] as usize) << 16) | ((src[1] as usize) << 8) | (src[2] as usize);

    let total = LEN_SIZE + payload_len;
    if src.len() < total {
        return None; // Need more data
    }

    src.advance(LEN_SIZE);
    Some(src.split_to(payload_len).freeze())
}
