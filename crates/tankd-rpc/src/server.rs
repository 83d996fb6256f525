use std::net::{Shutdown, SocketAddr, TcpStream};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use serde_json::Value;
use tankd_frame::{FrameError, FrameReader, FrameWriter};
use tankd_transport::{BindScope, TcpEndpoint};
use tracing::{debug, warn};

use crate::envelope::Envelope;
use crate::error::{Result, ServiceError};

/// The application-supplied request handler.
///
/// Invoked once per decoded request with the request body and the peer
/// address. Handlers run concurrently across sessions; a handler that must
/// not run concurrently with itself brings its own lock.
pub type Handler = dyn Fn(Value, SocketAddr) -> std::result::Result<Value, ServiceError>
    + Send
    + Sync;

/// Server configuration: where to listen.
#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
    pub scope: BindScope,
    pub port: u16,
}

struct SessionSlot {
    stream: TcpStream,
    done: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// A bound RPC server, not yet accepting.
pub struct RpcServer {
    endpoint: TcpEndpoint,
    handler: Arc<Handler>,
}

impl RpcServer {
    /// Bind the listening endpoint.
    pub fn bind(config: ServerConfig, handler: Arc<Handler>) -> Result<Self> {
        let endpoint = TcpEndpoint::bind(config.scope, config.port)?;
        Ok(Self { endpoint, handler })
    }

    /// The bound address (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.endpoint.local_addr()
    }

    /// Start the accept loop on its own thread and return a control handle.
    pub fn spawn(self) -> ServerHandle {
        let addr = self.endpoint.local_addr();
        let stop = Arc::new(AtomicBool::new(false));
        let sessions: Arc<Mutex<Vec<SessionSlot>>> = Arc::new(Mutex::new(Vec::new()));

        let accept = {
            let stop = Arc::clone(&stop);
            let sessions = Arc::clone(&sessions);
            let handler = Arc::clone(&self.handler);
            let endpoint = self.endpoint;
            std::thread::spawn(move || accept_loop(&endpoint, &handler, &stop, &sessions))
        };

        ServerHandle {
            addr,
            stop,
            sessions,
            accept: Some(accept),
        }
    }
}

/// Controls a running RPC server.
pub struct ServerHandle {
    addr: SocketAddr,
    stop: Arc<AtomicBool>,
    sessions: Arc<Mutex<Vec<SessionSlot>>>,
    accept: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// The address the server is accepting on.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Graceful shutdown: stop accepting, close every open session stream to
    /// unblock its read loop, and wait for all session workers to finish.
    /// No workers are left dangling once this returns.
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        // Wake the blocked accept with a throwaway connection.
        let _ = TcpStream::connect(self.addr);
        if let Some(handle) = self.accept.take() {
            let _ = handle.join();
        }

        let mut slots = lock_unpoisoned(&self.sessions);
        for slot in slots.drain(..) {
            let _ = slot.stream.shutdown(Shutdown::Both);
            let _ = slot.handle.join();
        }
    }
}

fn accept_loop(
    endpoint: &TcpEndpoint,
    handler: &Arc<Handler>,
    stop: &Arc<AtomicBool>,
    sessions: &Arc<Mutex<Vec<SessionSlot>>>,
) {
    while !stop.load(Ordering::SeqCst) {
        let (stream, peer) = match endpoint.accept() {
            Ok(pair) => pair,
            Err(err) => {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                warn!(%err, "accept failed");
                continue;
            }
        };
        if stop.load(Ordering::SeqCst) {
            // The wake-up connection from shutdown(), not a real peer.
            break;
        }

        reap_finished(sessions);

        let control = match stream.try_clone() {
            Ok(clone) => clone,
            Err(err) => {
                warn!(%peer, %err, "could not clone session stream");
                continue;
            }
        };

        let done = Arc::new(AtomicBool::new(false));
        let handle = {
            let handler = Arc::clone(handler);
            let done = Arc::clone(&done);
            std::thread::spawn(move || session(stream, peer, &handler, &done))
        };

        lock_unpoisoned(sessions).push(SessionSlot {
            stream: control,
            done,
            handle,
        });
    }
}

/// One session per connection: read a frame, dispatch, answer, repeat.
/// Ends on closed stream, never on handler failure.
fn session(stream: TcpStream, peer: SocketAddr, handler: &Arc<Handler>, done: &Arc<AtomicBool>) {
    let writer_stream = match stream.try_clone() {
        Ok(clone) => clone,
        Err(err) => {
            warn!(%peer, %err, "could not clone stream for writing");
            done.store(true, Ordering::SeqCst);
            return;
        }
    };

    let mut reader = FrameReader::new(stream);
    let mut writer = FrameWriter::new(writer_stream);

    loop {
        let payload = match reader.read_frame() {
            Ok(payload) => payload,
            Err(FrameError::ConnectionClosed) => {
                debug!(%peer, "session closed");
                break;
            }
            Err(err) => {
                debug!(%peer, %err, "session read failed");
                break;
            }
        };

        let envelope = match serde_json::from_slice::<Value>(&payload) {
            Ok(request) => dispatch(handler.as_ref(), request, peer),
            Err(err) => Envelope::Err(ServiceError::malformed(format!(
                "request is not valid JSON: {err}"
            ))),
        };

        let bytes = match serde_json::to_vec(&envelope.to_value()) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(%peer, %err, "response serialization failed");
                break;
            }
        };

        if let Err(err) = writer.send(&bytes) {
            debug!(%peer, %err, "session write failed");
            break;
        }
    }

    done.store(true, Ordering::SeqCst);
}

fn dispatch(handler: &Handler, request: Value, peer: SocketAddr) -> Envelope {
    match catch_unwind(AssertUnwindSafe(|| handler(request, peer))) {
        Ok(result) => Envelope::from_result(result),
        Err(panic) => Envelope::Err(ServiceError::internal(panic_text(panic.as_ref()))),
    }
}

fn panic_text(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else {
        "handler panicked".to_string()
    }
}

fn reap_finished(sessions: &Arc<Mutex<Vec<SessionSlot>>>) {
    let mut slots = lock_unpoisoned(sessions);
    let mut i = 0;
    while i < slots.len() {
        if slots[i].done.load(Ordering::SeqCst) {
            let slot = slots.swap_remove(i);
            let _ = slot.handle.join();
        } else {
            i += 1;
        }
    }
}

fn lock_unpoisoned<'a, T>(mutex: &'a Arc<Mutex<T>>) -> std::sync::MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
