//! Prompt-embedded tool call protocols
//!
//! Each protocol describes one wire convention: the opening spellings it
//! accepts, how text is cut into atomic chunks, how a chunk advances the
//! assembly of a call, and how calls and tool definitions are written back
//! into prompt text.

use promptcall_types::{
    ToolCall, ToolCallDelta, ToolCallFormat, ToolCallParseError, ToolDefinition,
};

use crate::boundary::{BoundaryMatch, ToolStart, detect_tool_call_start};
use crate::splitter::{SplitPolicy, split_chunks};
use crate::state::ParserState;

/// Unified contract for the supported tool call conventions
pub trait ToolCallProtocol: Send + Sync {
    fn format(&self) -> ToolCallFormat;

    /// Get format name for this protocol
    fn format_name(&self) -> &'static str;

    /// Accepted opening spellings, canonical first.
    fn accepted_starts(&self) -> &'static [ToolStart];

    fn split_policy(&self) -> SplitPolicy;

    /// Advance `state` by one atomic chunk.
    ///
    /// Called only while the call is neither done nor failed.
    fn parse_chunk(
        &self,
        chunk: &str,
        state: &mut ParserState,
    ) -> Result<Option<ToolCallDelta>, ToolCallParseError>;

    /// Render a completed call the way the model is expected to write it.
    fn render_tool_call(&self, call: &ToolCall) -> String;

    /// Render a tool definition for the system message.
    fn render_tool_definition(&self, tool: &ToolDefinition) -> String;

    fn system_message_prefix(&self) -> &'static str;

    fn system_message_suffix(&self) -> &'static str;

    /// Get example usage for this format
    fn example_usage(&self) -> &'static str;

    fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        split_chunks(text, self.split_policy())
    }

    fn detect_start(&self, buffer: &str) -> BoundaryMatch {
        detect_tool_call_start(buffer, self.accepted_starts())
    }

    /// Feed one chunk, honouring `done` and the sticky failure on `state`.
    fn process_chunk(
        &self,
        chunk: &str,
        state: &mut ParserState,
    ) -> Result<Option<ToolCallDelta>, ToolCallParseError> {
        if state.done {
            return Ok(None);
        }
        state.raw.push_str(chunk);
        if let Some(failure) = &state.failure {
            return Err(failure.clone());
        }
        let result = self.parse_chunk(chunk, state);
        if let Err(e) = &result {
            state.failure = Some(e.clone());
        }
        result
    }
}

/// Factory for creating protocols based on format
pub struct ParserFactory;

impl ParserFactory {
    pub fn create_protocol(format: &ToolCallFormat) -> Box<dyn ToolCallProtocol> {
        match format {
            ToolCallFormat::Codeblock => Box::new(codeblock::CodeblockProtocol),
            ToolCallFormat::Xml => Box::new(xml::XmlProtocol),
        }
    }
}

/// Human-readable JSON schema type of one parameter.
pub(crate) fn parameter_type(schema: &serde_json::Value) -> String {
    match schema.get("type") {
        Some(serde_json::Value::String(t)) => t.clone(),
        Some(serde_json::Value::Array(types)) => types
            .iter()
            .filter_map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(" | "),
        _ => "any".to_string(),
    }
}

/// `(name, schema, required)` for every declared parameter, in declaration order.
pub(crate) fn parameters_of(tool: &ToolDefinition) -> Vec<(String, serde_json::Value, bool)> {
    let required: Vec<&str> = tool
        .parameters
        .get("required")
        .and_then(|r| r.as_array())
        .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();
    tool.parameters
        .get("properties")
        .and_then(|p| p.as_object())
        .map(|props| {
            props
                .iter()
                .map(|(name, schema)| {
                    (
                        name.clone(),
                        schema.clone(),
                        required.contains(&name.as_str()),
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

pub mod codeblock;
pub mod xml;

#[cfg(test)]
pub mod tests;
