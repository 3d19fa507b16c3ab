//! Server-sent event framing.

use std::fmt::Display;

use futures::{Stream, StreamExt, stream};

use crate::model::ModelError;

const DONE: &str = "[DONE]";

/// Split a byte stream into SSE `data` payloads.
///
/// Frames may arrive split across chunks, including inside a multi-byte
/// character or a CRLF pair; bytes are only decoded once a frame is complete.
/// Comment lines and non-data fields are ignored, multi-line data is joined
/// with `\n`, and the stream ends at the `[DONE]` sentinel or at end of input.
pub fn frames<S, B, E>(input: S) -> impl Stream<Item = Result<String, ModelError>> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Unpin + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    stream::unfold(Some((input, Vec::new())), |state| async move {
        let (mut input, mut buf) = state?;
        loop {
            if let Some(end) = frame_end(&buf) {
                let frame: Vec<u8> = buf.drain(..end).collect();
                match data_of(&String::from_utf8_lossy(&frame)) {
                    Some(data) if data == DONE => return None,
                    Some(data) => return Some((Ok(data), Some((input, buf)))),
                    None => continue,
                }
            }

            match input.next().await {
                Some(Ok(chunk)) => buf.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => return Some((Err(ModelError::Stream(e.to_string())), None)),
                None => {
                    return match data_of(&String::from_utf8_lossy(&buf)) {
                        Some(data) if data != DONE => Some((Ok(data), None)),
                        _ => None,
                    };
                }
            }
        }
    })
}

/// Length of the first complete frame in `buf`, blank line included.
fn frame_end(buf: &[u8]) -> Option<usize> {
    buf.iter().enumerate().find_map(|(i, &byte)| {
        if byte != b'\n' {
            return None;
        }
        let rest = &buf[i + 1..];
        if rest.starts_with(b"\n") {
            Some(i + 2)
        } else if rest.starts_with(b"\r\n") {
            Some(i + 3)
        } else {
            None
        }
    })
}

fn data_of(frame: &str) -> Option<String> {
    let lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}
