//! Side-channel status framing.
//!
//! The supervised child reports liveness out-of-band from the RPC protocol,
//! over its stderr stream. Each message is a 5-digit zero-padded decimal
//! ASCII length header followed by exactly that many UTF-8 bytes, the last
//! of which is the `\n` terminator. The explicit length lets payloads carry
//! embedded newlines without delimiter escaping; the decoder keeps pulling
//! lines until the promised byte count arrived.

use std::io::{BufRead, Write};

use tracing::warn;

use crate::error::StatusError;
use crate::params::Params;
use crate::state::State;

/// Width of the decimal length header.
pub const HEADER_WIDTH: usize = 5;

/// Largest framed message (payload + terminator) the header can describe.
pub const MAX_FRAMED_LEN: usize = 99_999;

/// One status message on the side-channel.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusMessage {
    /// Emitted once at loop startup with the active params.
    Params(Params),
    /// Tick start.
    Running,
    /// Peltier sub-tick failed this tick.
    PeltierFail(String),
    /// Fan sub-tick failed this tick.
    FanFail(String),
    /// State after the tick.
    State(State),
    /// Tick end.
    Done,
}

impl StatusMessage {
    /// The unframed payload text, `kind` or `kind;body`.
    pub fn payload(&self) -> Result<String, StatusError> {
        Ok(match self {
            StatusMessage::Params(params) => {
                format!("params;{}", serde_json::to_string(params)?)
            }
            StatusMessage::Running => "running".to_string(),
            StatusMessage::PeltierFail(text) => format!("peltier_fail;{text}"),
            StatusMessage::FanFail(text) => format!("fan_fail;{text}"),
            StatusMessage::State(state) => {
                format!("state;{}", serde_json::to_string(state)?)
            }
            StatusMessage::Done => "done".to_string(),
        })
    }

    /// The full framed message: length header, payload, terminator.
    pub fn encode(&self) -> Result<String, StatusError> {
        let payload = self.payload()?;
        let framed_len = payload.len() + 1;
        if framed_len > MAX_FRAMED_LEN {
            return Err(StatusError::PayloadTooLarge(framed_len));
        }
        Ok(format!("{framed_len:05}{payload}\n"))
    }

    fn parse_payload(payload: &str) -> Result<StatusMessage, String> {
        let (kind, body) = match payload.split_once(';') {
            Some((kind, body)) => (kind, Some(body)),
            None => (payload, None),
        };

        match (kind, body) {
            ("running", None) => Ok(StatusMessage::Running),
            ("done", None) => Ok(StatusMessage::Done),
            ("params", Some(body)) => serde_json::from_str(body)
                .map(StatusMessage::Params)
                .map_err(|e| format!("bad params body: {e}")),
            ("state", Some(body)) => serde_json::from_str(body)
                .map(StatusMessage::State)
                .map_err(|e| format!("bad state body: {e}")),
            ("peltier_fail", Some(body)) => Ok(StatusMessage::PeltierFail(body.to_string())),
            ("fan_fail", Some(body)) => Ok(StatusMessage::FanFail(body.to_string())),
            _ => Err(format!("unrecognised status message `{kind}`")),
        }
    }
}

/// Where the control loop publishes its status messages.
///
/// Emission is fire-and-forget: a sink that can no longer deliver must not
/// take the control loop down with it.
pub trait StatusSink: Send {
    fn emit(&mut self, message: &StatusMessage);
}

/// A sink that discards everything. Used when the loop runs unsupervised.
pub struct NullSink;

impl StatusSink for NullSink {
    fn emit(&mut self, _message: &StatusMessage) {}
}

/// Frames status messages onto a byte stream (the child's stderr).
pub struct StatusWriter<W> {
    inner: W,
}

impl<W: Write> StatusWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Encode and write one message.
    pub fn write(&mut self, message: &StatusMessage) -> Result<(), StatusError> {
        let framed = message.encode()?;
        self.inner.write_all(framed.as_bytes())?;
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Send> StatusSink for StatusWriter<W> {
    fn emit(&mut self, message: &StatusMessage) {
        if let Err(err) = self.write(message) {
            warn!(%err, "status emission failed");
        }
    }
}

/// One decoded event from the side-channel stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    Message(StatusMessage),
    /// Text that is not a well-formed status message. The consumer
    /// accumulates these as diagnostics — a crashing child writes its
    /// failure output to the same stream.
    Malformed(String),
}

/// Decodes status messages from the side-channel stream.
pub struct StatusReader<R> {
    inner: R,
}

impl<R: BufRead> StatusReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Read the next event (blocking). `None` means the stream ended.
    pub fn next_event(&mut self) -> std::io::Result<Option<StatusEvent>> {
        let mut line = String::new();
        if self.inner.read_line(&mut line)? == 0 {
            return Ok(None);
        }

        let header = line.as_bytes().get(..HEADER_WIDTH);
        let is_packet = header
            .map(|h| h.iter().all(u8::is_ascii_digit))
            .unwrap_or(false);
        if !is_packet {
            return Ok(Some(StatusEvent::Malformed(line)));
        }

        let Ok(length) = line[..HEADER_WIDTH].parse::<usize>() else {
            return Ok(Some(StatusEvent::Malformed(line)));
        };

        let mut content = line[HEADER_WIDTH..].to_string();
        while content.len() < length {
            if self.inner.read_line(&mut content)? == 0 {
                // Truncated packet at EOF.
                return Ok(Some(StatusEvent::Malformed(content)));
            }
        }

        let payload = content.strip_suffix('\n').unwrap_or(&content);
        match StatusMessage::parse_payload(payload) {
            Ok(message) => Ok(Some(StatusEvent::Message(message))),
            Err(reason) => Ok(Some(StatusEvent::Malformed(format!(
                "{payload} ({reason})"
            )))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use crate::state::Phase;

    use super::*;

    fn params() -> Params {
        Params {
            low: 20.0,
            high: 24.0,
            fan_retain: 30.0,
            tick_time: 5.0,
        }
    }

    #[test]
    fn framing_is_five_digit_length_plus_terminator() {
        let framed = StatusMessage::Running.encode().unwrap();
        assert_eq!(framed, "00008running\n");

        let framed = StatusMessage::Done.encode().unwrap();
        assert_eq!(framed, "00005done\n");
    }

    #[test]
    fn roundtrip_every_kind() {
        let messages = vec![
            StatusMessage::Params(params()),
            StatusMessage::Running,
            StatusMessage::PeltierFail("gpio request failed: server unreachable".to_string()),
            StatusMessage::FanFail("relay stuck".to_string()),
            StatusMessage::State(State {
                phase: Phase::Idle,
                last_peltier_on: 3,
            }),
            StatusMessage::Done,
        ];

        let mut writer = StatusWriter::new(Vec::new());
        for message in &messages {
            writer.write(message).unwrap();
        }

        let wire = writer.into_inner();
        let mut reader = StatusReader::new(Cursor::new(wire));
        for expected in &messages {
            let event = reader.next_event().unwrap().expect("event expected");
            assert_eq!(event, StatusEvent::Message(expected.clone()));
        }
        assert!(reader.next_event().unwrap().is_none());
    }

    #[test]
    fn payload_with_embedded_newline_reassembles() {
        let message = StatusMessage::PeltierFail("line one\nline two".to_string());
        let framed = message.encode().unwrap();

        let mut reader = StatusReader::new(Cursor::new(framed.into_bytes()));
        let event = reader.next_event().unwrap().expect("event expected");
        assert_eq!(event, StatusEvent::Message(message));
    }

    #[test]
    fn malformed_line_surfaces_as_diagnostic() {
        let wire = b"thread 'main' panicked at src/main.rs:10\n".to_vec();
        let mut reader = StatusReader::new(Cursor::new(wire));

        let event = reader.next_event().unwrap().expect("event expected");
        match event {
            StatusEvent::Malformed(text) => assert!(text.contains("panicked")),
            other => panic!("expected malformed event, got {other:?}"),
        }
    }

    #[test]
    fn short_line_is_malformed_not_a_crash() {
        let mut reader = StatusReader::new(Cursor::new(b"hi\n".to_vec()));
        let event = reader.next_event().unwrap().expect("event expected");
        assert!(matches!(event, StatusEvent::Malformed(_)));
    }

    #[test]
    fn unknown_kind_is_malformed() {
        let framed = "00010heartbeat\n";
        assert_eq!(framed.len(), HEADER_WIDTH + 10);

        let mut reader = StatusReader::new(Cursor::new(framed.as_bytes().to_vec()));
        let event = reader.next_event().unwrap().expect("event expected");
        match event {
            StatusEvent::Malformed(text) => assert!(text.contains("heartbeat")),
            other => panic!("expected malformed event, got {other:?}"),
        }
    }

    #[test]
    fn truncated_packet_at_eof_is_malformed() {
        // Header promises 64 bytes; the stream ends first.
        let wire = b"00064state;{\"phase\"".to_vec();
        let mut reader = StatusReader::new(Cursor::new(wire));

        let event = reader.next_event().unwrap().expect("event expected");
        assert!(matches!(event, StatusEvent::Malformed(_)));
        assert!(reader.next_event().unwrap().is_none());
    }

    #[test]
    fn mixed_stream_preserves_order() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&StatusMessage::Running.encode().unwrap().into_bytes());
        wire.extend_from_slice(b"stray stderr text\n");
        wire.extend_from_slice(&StatusMessage::Done.encode().unwrap().into_bytes());

        let mut reader = StatusReader::new(Cursor::new(wire));
        assert_eq!(
            reader.next_event().unwrap(),
            Some(StatusEvent::Message(StatusMessage::Running))
        );
        assert!(matches!(
            reader.next_event().unwrap(),
            Some(StatusEvent::Malformed(_))
        ));
        assert_eq!(
            reader.next_event().unwrap(),
            Some(StatusEvent::Message(StatusMessage::Done))
        );
        assert!(reader.next_event().unwrap().is_none());
    }

    #[test]
    fn oversized_payload_rejected_at_encode() {
        let message = StatusMessage::FanFail("x".repeat(MAX_FRAMED_LEN));
        let err = message.encode().unwrap_err();
        assert!(matches!(err, StatusError::PayloadTooLarge(_)));
    }
}
