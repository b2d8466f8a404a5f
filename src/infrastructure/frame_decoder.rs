// Line-framed event decoding for the streaming chart endpoint
use crate::application::analytics_repository::ByteStream;
use crate::application::error::ApiError;
use crate::domain::chart::ChartResult;
use bytes::BytesMut;
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;

const FRAME_PREFIX: &str = "data: ";

/// One decoded frame of the chart stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Progress { message: String },
    Complete { result: ChartResult },
    Error { message: String },
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Option<ChartResult>,
}

/// Incremental decoder: bytes in, complete frames out.
///
/// Frames are delimited by `\n` only. The unterminated tail stays buffered as
/// raw bytes until the next chunk, so a UTF-8 sequence split across chunks is
/// never decoded half-way.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
    /// Bytes at the front of `buffer` already known to hold no `\n`
    scanned: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') {
            let pos = self.scanned + offset;
            let line = self.buffer.split_to(pos + 1);
            self.scanned = 0;
            if let Some(event) = decode_line(&line[..pos]) {
                events.push(event);
            }
        }
        self.scanned = self.buffer.len();
        events
    }

    /// Decode whatever is left once the stream ends; servers may omit the final newline.
    pub fn finish(self) -> Option<StreamEvent> {
        if self.buffer.is_empty() {
            return None;
        }
        decode_line(&self.buffer)
    }
}

/// Decode a single line. Non-frame lines, malformed JSON and unknown events yield `None`.
pub fn decode_line(line: &[u8]) -> Option<StreamEvent> {
    let text = String::from_utf8_lossy(line);
    let payload = text.trim().strip_prefix(FRAME_PREFIX)?;

    let frame: RawFrame = match serde_json::from_str(payload) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!("Dropping malformed stream frame: {} ({})", payload, e);
            return None;
        }
    };

    match frame.event.as_str() {
        "progress" => Some(StreamEvent::Progress {
            message: frame.message.unwrap_or_default(),
        }),
        "complete" => match frame.result {
            Some(result) => Some(StreamEvent::Complete { result }),
            None => {
                tracing::warn!("Dropping complete frame without a result");
                None
            }
        },
        "error" => Some(StreamEvent::Error {
            message: frame.message.unwrap_or_default(),
        }),
        other => {
            tracing::debug!("Ignoring stream event '{}'", other);
            None
        }
    }
}

/// Decode a response body lazily, in arrival order.
///
/// A transport error is yielded once, after every frame decoded before it,
/// and ends the stream.
pub fn decode_stream(mut body: ByteStream) -> impl Stream<Item = Result<StreamEvent, ApiError>> + Send {
    async_stream::stream! {
        let mut decoder = FrameDecoder::new();

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    for event in decoder.push(&bytes) {
                        yield Ok(event);
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        if let Some(event) = decoder.finish() {
            yield Ok(event);
        }
    }
}
