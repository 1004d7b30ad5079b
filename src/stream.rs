//! Streaming reply decoding
//!
//! Turns the chunked body of `/chat/stream` into an ordered sequence of
//! protocol events.

mod decoder;


pub use decoder::{StreamDecoder, StreamEvent};

use crate::backend::BackendError;
use futures::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;

struct DecodeState<S> {
    chunks: S,
    /// `None` once the body ended or failed
    decoder: Option<StreamDecoder>,
    ready: VecDeque<StreamEvent>,
}

/// Lazily decode a byte stream into protocol events
///
/// Events come out in frame order. A transport error is yielded once and ends
/// the sequence; text left unterminated when the body ends is discarded.
pub fn decode_events<S>(chunks: S) -> impl Stream<Item = Result<StreamEvent, BackendError>>
where
    S: Stream<Item = Result<Vec<u8>, BackendError>> + Unpin,
{
    let state = DecodeState {
        chunks,
        decoder: Some(StreamDecoder::new()),
        ready: VecDeque::new(),
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.ready.pop_front() {
                return Some((Ok(event), state));
            }

            let decoder = state.decoder.as_mut()?;
            match state.chunks.next().await {
                Some(Ok(chunk)) => state.ready.extend(decoder.push(&chunk)),
                Some(Err(e)) => {
                    state.decoder = None;
                    return Some((Err(e), state));
                }
                None => {
                    if let Some(decoder) = state.decoder.take() {
                        let dropped = decoder.dropped_frames();
                        if dropped > 0 {
                            tracing::debug!(dropped, "Skipped frames while decoding stream");
                        }
                        decoder.finish();
                    }
                    return None;
                }
            }
        }
    })
}
