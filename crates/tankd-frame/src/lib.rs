//! Length-prefixed message framing for the tankd wire protocol.
//!
//! Every message on a tankd connection is framed as a 3-byte big-endian
//! payload length followed by the payload itself. Three length bytes cap a
//! payload at 16 MiB − 1, which is the protocol's message size limit. There
//! is no magic number and no checksum — the transport trusts its peer.
//!
//! No partial reads, no buffer management in user code: [`FrameReader`]
//! blocks until a complete frame arrived or the stream ended, and stream
//! closure is reported as the distinguished [`FrameError::ConnectionClosed`].

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{decode_frame, encode_frame, LEN_SIZE, MAX_PAYLOAD};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
