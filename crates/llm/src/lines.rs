//! Line framing for HTTP response bodies.
//!
//! Providers receive newline-delimited payloads (NDJSON, server-sent events)
//! whose lines may be split across network chunks. `byte_lines` buffers
//! bytes and yields whole lines.

use futures::{Stream, StreamExt};
use grounded_core::{AppError, AppResult};
use std::fmt::Display;

struct LineState<S> {
    bytes: S,
    buffer: Vec<u8>,
    finished: bool,
}

/// Split a byte stream into lines without their trailing `\r\n` / `\n`.
///
/// A final unterminated line is yielded when the body ends. A transport
/// error is yielded once and ends the stream.
pub fn byte_lines<S, B, E>(bytes: S) -> impl Stream<Item = AppResult<String>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
{
    let state = LineState {
        bytes,
        buffer: Vec::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(pos) = state.buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = state.buffer.drain(..=pos).collect();
                return Some((Ok(decode_line(&line)), state));
            }

            if state.finished {
                if state.buffer.is_empty() {
                    return None;
                }
                let line = std::mem::take(&mut state.buffer);
                return Some((Ok(decode_line(&line)), state));
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => state.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    state.buffer.clear();
                    state.finished = true;
                    return Some((
                        Err(AppError::Completion(format!("Stream error: {}", e))),
                        state,
                    ));
                }
                None => state.finished = true,
            }
        }
    })
}

fn decode_line(line: &[u8]) -> String {
    String::from_utf8_lossy(line)
        .trim_end_matches(['\r', '\n'])
        .to_string()
}
