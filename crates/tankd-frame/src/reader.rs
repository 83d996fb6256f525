use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};

use crate::codec::decode_frame;
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally — callers always get complete payloads.
/// A stream that yields zero bytes at any point, mid-header included, is
/// reported as [`FrameError::ConnectionClosed`]; a partial frame is never
/// surfaced.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Read the next complete frame payload (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Bytes> {
        loop {
            if let Some(payload) = decode_frame(&mut self.buf) {
                return Ok(payload);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
