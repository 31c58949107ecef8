//! Rewrites an assistant message stream so that a prompt-embedded tool call
//! comes out as structured tool call deltas instead of raw text.

use async_stream::stream;
use futures::{Stream, StreamExt};
use promptcall_types::ChatMessage;
use tokio_util::sync::CancellationToken;

use crate::config::{InterceptorConfig, RecoveryPolicy};
use crate::delta::delta_message;
use crate::formats::{ParserFactory, ToolCallProtocol};
use crate::state::ParserState;

/// Synchronous core of the interceptor. One instance per model response.
pub struct ToolCallInterceptor {
    protocol: Box<dyn ToolCallProtocol>,
    recovery: RecoveryPolicy,
    /// Text that might still turn out to be the start of a tool call.
    pending: String,
    active: Option<ParserState>,
    completed: bool,
}

impl ToolCallInterceptor {
    pub fn new(config: &InterceptorConfig) -> Self {
        Self::with_protocol(ParserFactory::create_protocol(&config.format), config.recovery)
    }

    pub fn with_protocol(protocol: Box<dyn ToolCallProtocol>, recovery: RecoveryPolicy) -> Self {
        Self {
            protocol,
            recovery,
            pending: String::new(),
            active: None,
            completed: false,
        }
    }

    /// A tool call has been fully assembled; everything after it is dropped.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn is_in_tool_call(&self) -> bool {
        self.active.is_some()
    }

    /// Messages to emit downstream for one upstream message, in order.
    pub fn process_message(&mut self, message: ChatMessage) -> Vec<ChatMessage> {
        if self.completed {
            return Vec::new();
        }
        if !message.is_assistant() || message.has_tool_calls() {
            return vec![message];
        }
        let text = match message.text_parts() {
            Some(parts) => parts.concat(),
            None => return vec![message],
        };

        let mut out = Vec::new();
        for chunk in self.protocol.split(&text) {
            if self.completed {
                break;
            }
            if let Some(state) = self.active.as_mut() {
                state.literal.push_str(chunk);
                self.feed(chunk, &mut out);
                continue;
            }

            self.pending.push_str(chunk);
            let found = self.protocol.detect_start(&self.pending);
            if found.is_in_partial_prefix {
                tracing::debug!("Holding back possible tool call start: {:?}", self.pending);
                continue;
            }
            if found.is_in_tool_call {
                self.enter_tool_call(found.normalized_buffer, &mut out);
            } else {
                out.push(ChatMessage::assistant(std::mem::take(&mut self.pending)));
            }
        }
        out
    }

    /// Flush text held back when upstream ends outside a tool call.
    pub fn finish(&mut self) -> Vec<ChatMessage> {
        if self.completed || self.active.is_some() || self.pending.is_empty() {
            return Vec::new();
        }
        vec![ChatMessage::assistant(std::mem::take(&mut self.pending))]
    }

    fn enter_tool_call(&mut self, normalized: String, out: &mut Vec<ChatMessage>) {
        let call_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(
            "Entering {} tool call region, call id {}",
            self.protocol.format_name(),
            call_id
        );
        let mut state = ParserState::new(call_id);
        state.literal = std::mem::take(&mut self.pending);
        self.active = Some(state);

        let chunks: Vec<String> = self
            .protocol
            .split(&normalized)
            .into_iter()
            .map(str::to_string)
            .collect();
        for chunk in &chunks {
            if self.active.is_none() || self.completed {
                // Passthrough recovery already surfaced the whole region.
                break;
            }
            self.feed(chunk, out);
        }
    }

    fn feed(&mut self, chunk: &str, out: &mut Vec<ChatMessage>) {
        let Some(state) = self.active.as_mut() else {
            return;
        };

        match self.protocol.process_chunk(chunk, state) {
            Ok(Some(delta)) => out.push(delta_message(delta)),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    "Failed to parse {} tool call {}: {}",
                    self.protocol.format_name(),
                    state.call_id(),
                    e
                );
                out.push(ChatMessage::assistant(state.literal().to_string()));
                if self.recovery == RecoveryPolicy::Passthrough {
                    self.active = None;
                }
                return;
            }
        }

        if state.is_done() {
            tracing::info!(
                "Tool call {} complete with {} argument(s)",
                state.call_id(),
                state.processed_args().len()
            );
            self.active = None;
            self.completed = true;
        }
    }
}

/// Wrap an upstream stream of message batches.
///
/// Cancellation is checked before every upstream batch; the batch in hand is
/// always finished. Once a tool call completes the rest of upstream is drained
/// without output.
pub fn intercept_tool_calls<S>(
    upstream: S,
    cancel: CancellationToken,
    config: InterceptorConfig,
) -> impl Stream<Item = Vec<ChatMessage>>
where
    S: Stream<Item = Vec<ChatMessage>> + Send + 'static,
{
    stream! {
        tokio::pin!(upstream);

        let mut interceptor = ToolCallInterceptor::new(&config);
        let mut cancelled = false;

        loop {
            let batch = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("Tool call interception cancelled");
                    cancelled = true;
                    None
                }
                batch = upstream.next() => batch,
            };
            let Some(batch) = batch else {
                break;
            };

            for message in batch {
                for out in interceptor.process_message(message) {
                    yield vec![out];
                }
            }
        }

        if !cancelled {
            for out in interceptor.finish() {
                yield vec![out];
            }
        }
    }
}
