//! Splits a chunked byte stream into text lines.
//!
//! Both streaming protocols we speak (SSE and NDJSON) are line oriented, but network chunks
//! cut lines at arbitrary byte offsets, including inside multi-byte UTF-8 sequences.

use futures::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;

use crate::LlmError;

#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append a chunk and return every line it completed, without the terminator.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Whatever is left once the stream ended without a trailing newline.
    pub(crate) fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

struct LineState<B> {
    inner: BoxStream<'static, Result<B, String>>,
    buf: LineBuffer,
    ready: VecDeque<String>,
    done: bool,
}

/// Turn a byte-chunk stream into a line stream. A transport error ends the stream.
pub(crate) fn lines<B>(
    inner: BoxStream<'static, Result<B, String>>,
) -> BoxStream<'static, Result<String, LlmError>>
where
    B: AsRef<[u8]> + Send + 'static,
{
    let state = LineState {
        inner,
        buf: LineBuffer::default(),
        ready: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(line) = st.ready.pop_front() {
                return Some((Ok(line), st));
            }
            if st.done {
                return None;
            }
            match st.inner.next().await {
                Some(Ok(chunk)) => {
                    let completed = st.buf.push(chunk.as_ref());
                    st.ready.extend(completed);
                }
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(LlmError::Unavailable(format!("stream broke: {e}"))), st));
                }
                None => {
                    st.done = true;
                    if let Some(rest) = st.buf.finish() {
                        st.ready.push_back(rest);
                    }
                }
            }
        }
    })
    .boxed()
}
