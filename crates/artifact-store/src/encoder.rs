//! Chunked trace encoding.
//!
//! [`TraceChunks`] turns a [`Trace`] into a lazy sequence of text chunks whose
//! concatenation is one JSON document:
//!
//! ```text
//! {
//! "traceEvents": [
//!   {...},
//!   {...}
//! ],
//! "metadata": {
//!   ...
//! }}
//! ```
//!
//! Events are serialized `batch_size` at a time, so at most one batch of
//! encoded events is held in memory regardless of trace length. The iterator
//! borrows the trace and cannot be restarted; build a new one to re-encode.

use std::iter::FusedIterator;

use serde_json::{map, Value};

use crate::config::DEFAULT_BATCH_SIZE;
use crate::domain::{Trace, TRACE_EVENTS_KEY};

/// Lazily encoded chunks of one trace document.
pub struct TraceChunks<'a> {
    events: &'a [Value],
    extra: map::Iter<'a>,
    batch_size: usize,
    state: State,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Header,
    Events { next: usize },
    CloseEvents,
    Extra,
    Footer,
    Done,
}

impl<'a> TraceChunks<'a> {
    /// Encode `trace` in batches of `batch_size` events (minimum 1).
    pub fn new(trace: &'a Trace, batch_size: usize) -> Self {
        Self {
            events: &trace.events,
            extra: trace.extra.iter(),
            batch_size: batch_size.max(1),
            state: State::Header,
        }
    }

    /// Encode with the default batch size.
    pub fn with_default_batch(trace: &'a Trace) -> Self {
        Self::new(trace, DEFAULT_BATCH_SIZE)
    }

    fn encode_batch(&self, start: usize) -> serde_json::Result<(String, usize)> {
        let end = (start + self.batch_size).min(self.events.len());
        let mut chunk = String::new();
        for (i, event) in self.events[start..end].iter().enumerate() {
            // Separator goes before every event except the very first one.
            if start + i > 0 {
                chunk.push_str(",\n");
            }
            chunk.push_str("  ");
            chunk.push_str(&serde_json::to_string(event)?);
        }
        Ok((chunk, end))
    }

    fn encode_extra(key: &str, value: &Value) -> serde_json::Result<String> {
        Ok(format!(
            ",\n{}: {}",
            serde_json::to_string(key)?,
            serde_json::to_string_pretty(value)?
        ))
    }

    fn step(&mut self) -> Option<serde_json::Result<String>> {
        match self.state {
            State::Header => {
                self.state = if self.events.is_empty() {
                    State::CloseEvents
                } else {
                    State::Events { next: 0 }
                };
                Some(Ok(format!("{{\n\"{TRACE_EVENTS_KEY}\": [\n")))
            }
            State::Events { next } => match self.encode_batch(next) {
                Ok((chunk, end)) => {
                    self.state = if end >= self.events.len() {
                        State::CloseEvents
                    } else {
                        State::Events { next: end }
                    };
                    Some(Ok(chunk))
                }
                Err(e) => Some(Err(e)),
            },
            State::CloseEvents => {
                self.state = State::Extra;
                Some(Ok("\n]".to_string()))
            }
            State::Extra => match self
                .extra
                .find(|(key, _)| key.as_str() != TRACE_EVENTS_KEY)
            {
                Some((key, value)) => Some(Self::encode_extra(key, value)),
                None => {
                    self.state = State::Footer;
                    self.step()
                }
            },
            State::Footer => {
                self.state = State::Done;
                Some(Ok("}\n".to_string()))
            }
            State::Done => None,
        }
    }
}

impl Iterator for TraceChunks<'_> {
    type Item = serde_json::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.step();
        if matches!(item, Some(Err(_))) {
            self.state = State::Done;
        }
        item
    }
}

impl FusedIterator for TraceChunks<'_> {}
