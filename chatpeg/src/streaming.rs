//! Streaming frontend (component J).
//!
//! Caller-driven, no internal yield points: each new chunk is appended to
//! a byte buffer, the buffer is truncated to
//! its longest valid-UTF-8 prefix, the format's parser runs with
//! `is_partial = true`, and the resulting snapshot is diffed against the
//! previous one to produce monotonic deltas. `close()` reparses once with
//! `is_partial = false`.

use tracing::trace;

use crate::dispatcher::FormatDescriptor;
use crate::message::ChatMessage;

/// One emitted change. Tool-call deltas are keyed by ordinal index into
/// `tool_calls`, not by name or id, since a name may not be known yet when
/// the call first opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    Content(String),
    Reasoning(String),
    ToolOpen {
        index: usize,
        name: String,
        id: Option<String>,
    },
    ToolArgs {
        index: usize,
        delta: String,
    },
    Close,
}

/// Find the longest prefix of `bytes` that ends on a UTF-8 code-point
/// boundary — up to three trailing bytes may be withheld for a code point
/// still arriving.
pub fn utf8_safe_prefix(bytes: &[u8]) -> &str {
    match std::str::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            std::str::from_utf8(&bytes[..e.valid_up_to()]).expect("valid_up_to is always a char boundary")
        }
    }
}

/// One streaming parse session bound to a single format descriptor.
pub struct StreamingSession {
    descriptor: FormatDescriptor,
    buffer: Vec<u8>,
    previous: ChatMessage,
    closed: bool,
}

impl StreamingSession {
    pub fn new(descriptor: FormatDescriptor) -> Self {
        Self {
            descriptor,
            buffer: Vec::new(),
            previous: ChatMessage::default(),
            closed: false,
        }
    }

    /// Append a chunk of raw model output and return the deltas it produced.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<Delta> {
        if self.closed {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);
        let truncated = utf8_safe_prefix(&self.buffer);
        trace!(len = truncated.len(), "parsing partial snapshot");
        let (message, _outcome) = self.descriptor.parse(truncated, true);
        let deltas = diff(&self.previous, &message);
        self.previous = message;
        deltas
    }

    /// Reparse the full buffer as a completed value and emit final deltas
    /// plus a terminal `Close`.
    pub fn close(&mut self) -> Vec<Delta> {
        if self.closed {
            return vec![Delta::Close];
        }
        let full = utf8_safe_prefix(&self.buffer);
        let (message, _outcome) = self.descriptor.parse(full, false);
        let mut deltas = diff(&self.previous, &message);
        self.previous = message;
        self.closed = true;
        deltas.push(Delta::Close);
        deltas
    }

    /// Abort mid-stream: drain whatever has been accumulated into final
    /// deltas without requiring the format to have closed cleanly.
    pub fn abort(&mut self) -> Vec<Delta> {
        self.close()
    }
}

fn diff(previous: &ChatMessage, next: &ChatMessage) -> Vec<Delta> {
    let mut deltas = Vec::new();

    if next.content.len() > previous.content.len() {
        deltas.push(Delta::Content(next.content[previous.content.len()..].to_string()));
    }
    if next.reasoning_content.len() > previous.reasoning_content.len() {
        deltas.push(Delta::Reasoning(
            next.reasoning_content[previous.reasoning_content.len()..].to_string(),
        ));
    }

    for (index, call) in next.tool_calls.iter().enumerate() {
        match previous.tool_calls.get(index) {
            None => {
                deltas.push(Delta::ToolOpen {
                    index,
                    name: call.name.clone(),
                    id: call.id.clone(),
                });
                if !call.arguments.is_empty() {
                    deltas.push(Delta::ToolArgs {
                        index,
                        delta: call.arguments.clone(),
                    });
                }
            }
            Some(prev_call) if call.arguments.len() > prev_call.arguments.len() => {
                deltas.push(Delta::ToolArgs {
                    index,
                    delta: call.arguments[prev_call.arguments.len()..].to_string(),
                });
            }
            Some(_) => {}
        }
    }

    deltas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::deepseek_r1;

    #[test]
    fn truncates_incomplete_utf8_tail() {
        let bytes = "héllo".as_bytes();
        let truncated = &bytes[..bytes.len() - 1]; // split inside the 2-byte 'é'
        assert_eq!(utf8_safe_prefix(truncated), "h");
    }

    #[test]
    fn streaming_reasoning_grows_monotonically() {
        let descriptor = deepseek_r1::build(&[]);
        let mut session = StreamingSession::new(descriptor);

        let d1 = session.push_chunk(b"<think>let me th");
        assert_eq!(d1, vec![Delta::Reasoning("let me th".to_string())]);

        let d2 = session.push_chunk(b"ink</think>OK");
        assert_eq!(
            d2,
            vec![Delta::Reasoning("ink".to_string()), Delta::Content("OK".to_string())]
        );
    }

    #[test]
    fn close_emits_final_close_event() {
        let descriptor = deepseek_r1::build(&[]);
        let mut session = StreamingSession::new(descriptor);
        session.push_chunk(b"hello");
        let deltas = session.close();
        assert_eq!(deltas.last(), Some(&Delta::Close));
    }
}
