//! Newline-delimited JSON framing over any ordered byte stream.
//!
//! The transport is deliberately dumb: one UTF-8 JSON object per line, no
//! handshaking, no retransmission. Back-pressure propagates through the
//! underlying sink; frames are never dropped on overflow.

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::trace;

use crate::error::{ProtocolError, ProtocolResult};
use crate::frames::Frame;

/// One frame per line is generous: the largest frames are tool results
/// carrying file contents.
const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// A framed duplex channel carrying [`Frame`]s.
pub struct FrameTransport<T> {
    reader: FramedRead<ReadHalf<T>, LinesCodec>,
    writer: FramedWrite<WriteHalf<T>, LinesCodec>,
}

impl<T: AsyncRead + AsyncWrite> FrameTransport<T> {
    /// Wrap a duplex byte stream.
    pub fn new(stream: T) -> Self {
        let (read, write) = tokio::io::split(stream);
        Self {
            reader: FramedRead::new(read, LinesCodec::new_with_max_length(MAX_FRAME_BYTES)),
            writer: FramedWrite::new(write, LinesCodec::new_with_max_length(MAX_FRAME_BYTES)),
        }
    }

    /// Send one frame, flushing it to the peer.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the stream is closed.
    pub async fn send(&mut self, frame: &Frame) -> ProtocolResult<()> {
        let line = serde_json::to_string(frame)?;
        trace!(kind = frame.kind(), len = line.len(), "sending frame");
        self.writer.send(line).await.map_err(map_codec_error)
    }

    /// Receive the next frame.
    ///
    /// Returns `Ok(None)` when the peer closed the channel. A line that is
    /// not valid JSON (or does not match the taxonomy) yields
    /// [`ProtocolError::InvalidFrame`]; the channel stays usable, so the
    /// caller can answer with an `error` frame and keep reading.
    ///
    /// # Errors
    ///
    /// Returns an error for I/O failures, oversized lines, and malformed
    /// frames.
    pub async fn recv(&mut self) -> ProtocolResult<Option<Frame>> {
        match self.reader.next().await {
            None => Ok(None),
            Some(Err(e)) => Err(map_codec_error(e)),
            Some(Ok(line)) => match serde_json::from_str::<Frame>(&line) {
                Ok(frame) => {
                    trace!(kind = frame.kind(), "received frame");
                    Ok(Some(frame))
                },
                Err(e) => {
                    // Distinguish "not JSON at all" from "JSON with an
                    // unknown type" so the peer can answer with the right
                    // error code.
                    match serde_json::from_str::<serde_json::Value>(&line) {
                        Ok(value) => Err(ProtocolError::UnrecognizedFrame {
                            frame_type: value
                                .get("type")
                                .and_then(serde_json::Value::as_str)
                                .map(ToString::to_string),
                        }),
                        Err(_) => Err(ProtocolError::InvalidFrame(e)),
                    }
                },
            },
        }
    }
}

fn map_codec_error(error: LinesCodecError) -> ProtocolError {
    match error {
        LinesCodecError::MaxLineLengthExceeded => ProtocolError::FrameTooLong,
        LinesCodecError::Io(io) => ProtocolError::Io(io),
    }
}
