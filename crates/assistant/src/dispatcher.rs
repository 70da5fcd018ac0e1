//! Turns answers into [`StreamEvent`] sequences.
//!
//! Every stream produced here ends with exactly one `done` event. Relayed streams are lazy:
//! tokens are pulled from the completion backend only as the consumer polls, and dropping the
//! stream drops the backend stream with it, which abandons the generation.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use llm::TokenStream;

use crate::guardrail::Guardrails;
use crate::metrics::AnswerMetrics;
use crate::synthesizer::SynthesisConfig;
use crate::types::{StreamEvent, Tier};

pub type EventStream = BoxStream<'static, StreamEvent>;

#[derive(Clone)]
pub struct StreamingDispatcher {
    empty_message: String,
    error_message: String,
    metrics: Arc<dyn AnswerMetrics>,
}

impl std::fmt::Debug for StreamingDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingDispatcher")
            .field("empty_message", &self.empty_message)
            .field("error_message", &self.error_message)
            .finish_non_exhaustive()
    }
}

struct Relay {
    tokens: TokenStream,
    pending: VecDeque<StreamEvent>,
    text: String,
    count: usize,
    finished: bool,
    query: String,
    guardrails: Guardrails,
    empty_message: String,
    error_message: String,
    metrics: Arc<dyn AnswerMetrics>,
}

impl Relay {
    fn finish(&mut self, failed: bool) {
        self.finished = true;
        if self.count == 0 {
            let message = if failed {
                &self.error_message
            } else {
                &self.empty_message
            };
            self.pending.push_back(StreamEvent::finish(message.clone()));
        } else {
            if !failed {
                if let Some(rule) = self.guardrails.violated(&self.query, &self.text) {
                    tracing::warn!(topic = %rule.topic, "streamed answer missed required fact, appending note");
                    self.pending.push_back(StreamEvent::token(rule.note.clone()));
                }
            }
            self.pending.push_back(StreamEvent::done());
        }
        self.metrics.record_stream(Tier::VectorAnswer, self.count);
    }
}

impl StreamingDispatcher {
    pub fn new(cfg: &SynthesisConfig, metrics: Arc<dyn AnswerMetrics>) -> Self {
        Self {
            empty_message: cfg.empty_stream_message.clone(),
            error_message: cfg.stream_error_message.clone(),
            metrics,
        }
    }

    /// A single terminal event carrying the whole answer.
    pub fn instant(&self, tier: Tier, text: String) -> EventStream {
        self.metrics.record_stream(tier, 0);
        stream::iter([StreamEvent::finish(text)]).boxed()
    }

    /// The terminal error event, for generations that failed before streaming began.
    pub fn failed(&self) -> EventStream {
        self.instant(Tier::VectorAnswer, self.error_message.clone())
    }

    /// Relay generated tokens one event each, then the terminal marker.
    ///
    /// No tokens at all yields the configured "no information" message. A backend error after
    /// some tokens ends the stream with a bare terminal event. If a guardrail for `query` is
    /// violated by the complete text, its note goes out as one more token before the end.
    pub fn relay(&self, tokens: TokenStream, query: &str, guardrails: Guardrails) -> EventStream {
        let state = Relay {
            tokens,
            pending: VecDeque::new(),
            text: String::new(),
            count: 0,
            finished: false,
            query: query.to_string(),
            guardrails,
            empty_message: self.empty_message.clone(),
            error_message: self.error_message.clone(),
            metrics: self.metrics.clone(),
        };

        stream::unfold(state, |mut st| async move {
            loop {
                if let Some(event) = st.pending.pop_front() {
                    return Some((event, st));
                }
                if st.finished {
                    return None;
                }
                match st.tokens.next().await {
                    Some(Ok(token)) if token.is_empty() => continue,
                    Some(Ok(token)) => {
                        st.count += 1;
                        st.text.push_str(&token);
                        return Some((StreamEvent::token(token), st));
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, relayed = st.count, "token stream failed");
                        st.finish(true);
                    }
                    None => {
                        tracing::debug!(relayed = st.count, "token stream complete");
                        st.finish(false);
                    }
                }
            }
        })
        .boxed()
    }
}
