//! TCP transport endpoints for tankd services.
//!
//! Every tankd service speaks the same stream protocol over plain TCP on a
//! trusted segment. This is the lowest layer of the workspace: it only knows
//! how to bind, accept and connect. Framing lives one layer up in
//! `tankd-frame`.

pub mod error;
pub mod tcp;

pub use error::{Result, TransportError};
pub use tcp::{BindScope, TcpEndpoint};
