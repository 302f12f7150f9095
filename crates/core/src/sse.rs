//! SSE frame codec for the line-oriented streaming event protocol.
//!
//! One frame is an `event:` line, a `data:` line, and a blank-line
//! terminator:
//!
//! ```text
//! event: <type>
//! data: <JSON payload>
//!
//! ```
//!
//! The encoder produces exactly that byte shape. The decoder is
//! incremental: it buffers incoming bytes and splits on line boundaries,
//! so a frame arriving split across any number of reads decodes to the
//! same sequence as the unsplit stream. Consumers never assume one read
//! equals one frame.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A decoded SSE frame: event name plus raw data payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The `event:` field. Empty if the frame carried only data lines.
    pub event: String,

    /// The `data:` field, joined with newlines if sent as multiple lines.
    pub data: String,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }

    /// Encode this frame in wire shape.
    pub fn encode(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.event, self.data)
    }

    /// Parse the data payload as JSON.
    pub fn parse_data<T: DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_str(&self.data)
    }
}

/// Encode a typed event as a wire frame.
pub fn encode_event<T: Serialize>(
    event: &str,
    payload: &T,
) -> std::result::Result<String, serde_json::Error> {
    Ok(Frame::new(event, serde_json::to_string(payload)?).encode())
}

/// Incremental SSE decoder.
///
/// Feed it byte chunks as they arrive; it returns every frame completed by
/// that chunk. Call [`SseDecoder::finish`] at end of stream to flush a
/// trailing frame that was never blank-line terminated.
#[derive(Debug, Default)]
pub struct SseDecoder {
    // Raw bytes; converted to text one complete line at a time, so a chunk
    // boundary inside a multi-byte character never corrupts the payload.
    buffer: Vec<u8>,
    event: String,
    data: String,
    has_fields: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk of bytes, returning all frames it completed.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(bytes);

        let mut frames = Vec::new();
        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let rest = self.buffer.split_off(line_end + 1);
            let raw = std::mem::replace(&mut self.buffer, rest);
            let line = String::from_utf8_lossy(&raw[..line_end]);
            let line = line.trim_end_matches('\r');

            if line.is_empty() {
                if let Some(frame) = self.take_pending() {
                    frames.push(frame);
                }
                continue;
            }

            // Comment line, per the SSE grammar
            if line.starts_with(':') {
                continue;
            }

            if let Some(value) = line.strip_prefix("event:") {
                self.event = value.strip_prefix(' ').unwrap_or(value).to_string();
                self.has_fields = true;
            } else if let Some(value) = line.strip_prefix("data:") {
                let value = value.strip_prefix(' ').unwrap_or(value);
                if !self.data.is_empty() {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_fields = true;
            }
            // Unknown field names are ignored, also per the grammar.
        }

        frames
    }

    /// Flush a frame left pending at end of stream.
    pub fn finish(&mut self) -> Option<Frame> {
        // An unterminated trailing line still counts toward the frame.
        if !self.buffer.is_empty() {
            let mut rest = std::mem::take(&mut self.buffer);
            rest.push(b'\n');
            self.feed(&rest);
        }
        self.take_pending()
    }

    fn take_pending(&mut self) -> Option<Frame> {
        if !self.has_fields {
            return None;
        }
        self.has_fields = false;
        Some(Frame {
            event: std::mem::take(&mut self.event),
            data: std::mem::take(&mut self.data),
        })
    }
}

/// Decode a complete byte buffer in one pass (frames plus trailing flush).
pub fn decode_all(bytes: &[u8]) -> Vec<Frame> {
    let mut decoder = SseDecoder::new();
    let mut frames = decoder.feed(bytes);
    if let Some(frame) = decoder.finish() {
        frames.push(frame);
    }
    frames
}
