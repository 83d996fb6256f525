use std::net::TcpStream;
use std::sync::Mutex;

use serde_json::Value;
use tankd_frame::{FrameReader, FrameWriter};
use tankd_transport::TcpEndpoint;
use tracing::debug;

use crate::envelope::Envelope;
use crate::error::ClientError;

struct Connection {
    reader: FrameReader<TcpStream>,
    writer: FrameWriter<TcpStream>,
}

/// A blocking RPC client holding one reusable connection to a server.
///
/// Concurrent callers are serialized internally: one mutex covers
/// connect + send + receive, so at most one request is in flight at a time.
/// When the cached connection reports closed during a request, exactly one
/// fresh connection is attempted and the request retried exactly once on it;
/// a failed connection attempt surfaces as [`ClientError::Unreachable`] and
/// leaves the client with nothing cached, so the next call reconnects from
/// scratch instead of reusing a broken stream.
pub struct RpcClient {
    target: String,
    conn: Mutex<Option<Connection>>,
}

impl RpcClient {
    /// Create a client for `host:port`. No connection is made until the
    /// first request.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            conn: Mutex::new(None),
        }
    }

    /// The configured server address.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Send one request and block for its response.
    pub fn request(&self, body: &Value) -> Result<Value, ClientError> {
        let bytes = serde_json::to_vec(body)?;

        let mut guard = self
            .conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut conn = match guard.take() {
            Some(conn) => conn,
            None => self.connect()?,
        };

        match exchange(&mut conn, &bytes) {
            Ok(response) => {
                *guard = Some(conn);
                Ok(response)
            }
            Err(err) if err.is_closed() => {
                debug!(server = %self.target, "connection closed, reconnecting once");
                drop(conn);
                let mut fresh = self.connect()?;
                match exchange(&mut fresh, &bytes) {
                    Ok(response) => {
                        *guard = Some(fresh);
                        Ok(response)
                    }
                    Err(retry_err) => {
                        if !retry_err.is_closed() {
                            *guard = Some(fresh);
                        }
                        Err(retry_err)
                    }
                }
            }
            Err(err) => {
                *guard = Some(conn);
                Err(err)
            }
        }
    }

    /// Send a request and decode the response envelope: `Ok` payloads come
    /// back as values, error envelopes as [`ClientError::Remote`].
    pub fn call(&self, body: &Value) -> Result<Value, ClientError> {
        let response = self.request(body)?;
        let envelope = Envelope::from_value(&response).map_err(ClientError::BadEnvelope)?;
        envelope.into_result().map_err(ClientError::Remote)
    }

    fn connect(&self) -> Result<Connection, ClientError> {
        let stream =
            TcpEndpoint::connect(&self.target).map_err(|source| ClientError::Unreachable {
                addr: self.target.clone(),
                source,
            })?;
        let writer_stream = stream.try_clone().map_err(tankd_frame::FrameError::Io)?;
        Ok(Connection {
            reader: FrameReader::new(stream),
            writer: FrameWriter::new(writer_stream),
        })
    }
}

fn exchange(conn: &mut Connection, request: &[u8]) -> Result<Value, ClientError> {
    conn.writer.send(request)?;
    let payload = conn.reader.read_frame()?;
    Ok(serde_json::from_slice(&payload)?)
}
