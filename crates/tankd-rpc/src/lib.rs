//! Request/response RPC layer shared by all tankd services.
//!
//! One JSON message per frame, one response per request, strictly
//! alternating, no pipelining. The server runs one independent session per
//! connection; the client keeps one reusable connection and serializes
//! concurrent callers. Handler failures never kill a session — they are
//! converted into structured error envelopes (`{ok, errorKind, message}`)
//! and sent back as ordinary responses.

pub mod client;
pub mod envelope;
pub mod error;
pub mod server;

pub use client::RpcClient;
pub use envelope::Envelope;
pub use error::{ClientError, ErrorKind, Result, RpcError, ServiceError};
pub use server::{Handler, RpcServer, ServerConfig, ServerHandle};
pub use tankd_transport::BindScope;
