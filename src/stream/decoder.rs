//! Incremental frame decoder
//!
//! Bytes go in as the transport delivers them; protocol events come out once
//! a whole frame has been seen. Frames are `"data: " + payload`, separated by
//! a blank line. Neither frame boundaries nor UTF-8 sequences need to line up
//! with chunk boundaries.

/// Separator between frames
pub const FRAME_DELIMITER: &str = "\n\n";
/// Prefix every data frame carries
pub const DATA_PREFIX: &str = "data: ";
/// Payload prefix of the terminal frame; the rest is the thread id
pub const DONE_SENTINEL: &str = "[DONE]|";

/// Event decoded from one complete frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Text to append to the in-progress reply
    TextDelta(String),
    /// Turn finished; `thread_id` is `None` when the server sent an empty id
    TurnComplete { thread_id: Option<String> },
}

/// UTF-8 decoding state carried between chunks
///
/// Invalid sequences become U+FFFD; an incomplete sequence at the end of a
/// chunk waits for the next one.
#[derive(Debug, Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn decode(&mut self, chunk: &[u8], out: &mut String) {
        let bytes = if self.pending.is_empty() {
            chunk.to_vec()
        } else {
            let mut joined = std::mem::take(&mut self.pending);
            joined.extend_from_slice(chunk);
            joined
        };

        let mut rest = bytes.as_slice();
        while !rest.is_empty() {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(err) => {
                    let (valid, tail) = rest.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    if let Some(bad_len) = err.error_len() {
                        out.push(char::REPLACEMENT_CHARACTER);
                        rest = &tail[bad_len..];
                    } else {
                        self.pending = tail.to_vec();
                        break;
                    }
                }
            }
        }
    }

    /// Bytes of a sequence the stream never finished
    fn leftover(&self) -> usize {
        self.pending.len()
    }
}

/// Stateful, single-pass frame decoder
#[derive(Debug, Default)]
pub struct StreamDecoder {
    utf8: Utf8Decoder,
    /// Text after the last delimiter seen so far
    buffer: String,
    dropped_frames: usize,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, returning the events for every frame it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.utf8.decode(chunk, &mut self.buffer);

        if !self.buffer.contains(FRAME_DELIMITER) {
            return Vec::new();
        }

        let mut frames: Vec<&str> = self.buffer.split(FRAME_DELIMITER).collect();
        let tail = frames.pop().unwrap_or_default().to_string();

        let mut dropped = 0;
        let events = frames
            .into_iter()
            .filter_map(|frame| {
                let event = parse_frame(frame);
                if event.is_none() {
                    dropped += 1;
                }
                event
            })
            .collect();

        self.buffer = tail;
        self.dropped_frames += dropped;
        events
    }

    /// Frames skipped so far because they were not data frames or were empty
    pub fn dropped_frames(&self) -> usize {
        self.dropped_frames
    }

    /// End the stream, returning any text that never became a complete frame
    ///
    /// Unterminated text is discarded, never emitted as a delta. Consuming
    /// `self` keeps the decoder from being fed again.
    pub fn finish(self) -> Option<String> {
        if self.utf8.leftover() > 0 {
            tracing::debug!(
                bytes = self.utf8.leftover(),
                "Stream ended inside a UTF-8 sequence"
            );
        }
        if self.buffer.is_empty() {
            None
        } else {
            tracing::debug!(
                len = self.buffer.len(),
                "Discarding unterminated frame at end of stream"
            );
            Some(self.buffer)
        }
    }
}

/// Classify one frame; `None` means it carries nothing to apply
fn parse_frame(frame: &str) -> Option<StreamEvent> {
    let line = frame.trim_start_matches(['\r', '\n']);

    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        tracing::trace!(frame = %line, "Skipping non-data frame");
        return None;
    };

    if let Some(thread_id) = payload.strip_prefix(DONE_SENTINEL) {
        return Some(StreamEvent::TurnComplete {
            thread_id: (!thread_id.is_empty()).then(|| thread_id.to_string()),
        });
    }

    if payload.is_empty() {
        tracing::trace!("Skipping empty data frame");
        return None;
    }

    Some(StreamEvent::TextDelta(payload.to_string()))
}
