//! Tool call delta construction and the helpers both protocols use to keep the
//! concatenated arguments text valid JSON.

use once_cell::sync::Lazy;
use promptcall_types::{ChatMessage, ToolCall, ToolCallDelta};
use regex::{Captures, Regex};
use serde_json::Value;

use crate::state::ParserState;

/// A double-quoted JSON string token, raw newlines included.
static QUOTED_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?s)"(?:[^"\\]|\\.)*""#).unwrap());

/// Build a delta for the call tracked by `state`.
pub fn emit(state: &ParserState, name_fragment: &str, arguments_fragment: &str) -> ToolCallDelta {
    ToolCallDelta::new(state.call_id(), name_fragment, arguments_fragment)
}

/// Wrap a delta in the assistant message the interceptor yields downstream.
pub fn delta_message(delta: ToolCallDelta) -> ChatMessage {
    ChatMessage::tool_call_delta(delta)
}

/// `{"name":` for the first argument, `,"name":` afterwards.
pub fn arg_key_fragment(name: &str, first: bool) -> String {
    let key = Value::String(name.to_string()).to_string();
    if first {
        format!("{{{}:", key)
    } else {
        format!(",{}:", key)
    }
}

/// Escape raw control characters that appear inside quoted JSON strings.
///
/// Models frequently put multi-line text inside a JSON array or object without
/// escaping the line breaks, which would otherwise make it unparseable.
pub fn escape_newlines_in_json_strings(text: &str) -> String {
    QUOTED_SEGMENT
        .replace_all(text, |caps: &Captures| {
            caps[0]
                .replace('\r', "\\r")
                .replace('\n', "\\n")
                .replace('\t', "\\t")
        })
        .into_owned()
}

/// Interpret raw argument text as JSON, falling back to a JSON string.
///
/// Never fails: anything that is not valid JSON becomes a string value.
pub fn coerce_argument_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    let candidate = if trimmed.starts_with('[') || trimmed.starts_with('{') {
        escape_newlines_in_json_strings(trimmed)
    } else {
        trimmed.to_string()
    };
    match serde_json::from_str::<Value>(&candidate) {
        Ok(value) => value,
        Err(_) => Value::String(trimmed.to_string()),
    }
}

/// [`coerce_argument_value`] rendered as compact JSON text.
pub fn argument_fragment(raw: &str) -> String {
    coerce_argument_value(raw).to_string()
}

/// Result of diffing two successive JSON snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixDelta {
    pub fragment: String,
    /// False when `old` was not a prefix of `new` and the whole snapshot was
    /// handed out again.
    pub consistent: bool,
}

pub fn prefix_delta(old: &str, new: &str) -> PrefixDelta {
    match new.strip_prefix(old) {
        Some(suffix) => PrefixDelta {
            fragment: suffix.to_string(),
            consistent: true,
        },
        None => PrefixDelta {
            fragment: new.to_string(),
            consistent: false,
        },
    }
}

/// Folds a stream of deltas back into a completed call.
#[derive(Debug, Clone, Default)]
pub struct ToolCallAccumulator {
    id: Option<String>,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, delta: &ToolCallDelta) {
        if self.id.is_none() {
            self.id = Some(delta.id.clone());
        }
        self.name.push_str(delta.name_fragment());
        self.arguments.push_str(delta.arguments_fragment());
    }

    /// Push every tool call delta carried by `message`.
    pub fn push_message(&mut self, message: &ChatMessage) {
        for delta in message.tool_calls.iter().flatten() {
            self.push(delta);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &str {
        &self.arguments
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_none()
    }

    /// The assembled call. Empty arguments text means an empty object.
    pub fn finish(self) -> Result<ToolCall, serde_json::Error> {
        let input = if self.arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&self.arguments)?
        };
        Ok(ToolCall {
            tool_call_id: self.id.unwrap_or_default(),
            tool_name: self.name,
            input,
        })
    }
}
