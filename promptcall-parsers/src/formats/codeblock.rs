//! Fenced sentinel-line protocol
//!
//! ````text
//! ```tool
//! TOOL_NAME: search
//! BEGIN_ARG: query
//! rust streaming parsers
//! END_ARG
//! BEGIN_ARG: limit
//! 5
//! END_ARG
//! ```
//! ````
//!
//! Keywords are case-insensitive and the underscore is optional. Arguments are
//! emitted as append-only JSON fragments: `{"query":`, the value, `,"limit":`,
//! the value, and a closing `}` once the fence closes.

use once_cell::sync::Lazy;
use promptcall_types::{ToolCall, ToolCallDelta, ToolCallParseError, ToolDefinition};
use regex::Regex;
use serde_json::Value;

use super::{ToolCallProtocol, parameter_type, parameters_of};
use crate::boundary::ToolStart;
use crate::delta::{arg_key_fragment, argument_fragment, coerce_argument_value, emit};
use crate::splitter::{FENCE, SplitPolicy};
use crate::state::ParserState;

static OPENING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*```\s*tool").unwrap());
static TOOL_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)tool_?name:(.*)").unwrap());
static BEGIN_ARG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)begin_?arg:(.*)").unwrap());
static END_ARG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*end_?arg\b").unwrap());

// The name may share the opening fence line; line 0 folds it into line 1.
const ACCEPTED_STARTS: &[ToolStart] = &[
    ToolStart::new("```tool\n", "```tool\n"),
    ToolStart::new("```tool ", "```tool "),
    ToolStart::new("tool_name:", "```tool\nTOOL_NAME:"),
];

/// Sentinel-line protocol.
///
/// ```
/// use promptcall_parsers::{ParserFactory, ParserState, ToolCallProtocol};
/// use promptcall_types::ToolCallFormat;
///
/// let protocol = ParserFactory::create_protocol(&ToolCallFormat::Codeblock);
/// let mut state = ParserState::new("call-1");
/// let mut name = String::new();
/// for chunk in protocol.split("```tool\nTOOL_NAME: ls\n```") {
///     if let Some(delta) = protocol.process_chunk(chunk, &mut state).unwrap() {
///         name.push_str(delta.name_fragment());
///     }
/// }
/// assert_eq!(name, "ls");
/// assert!(state.is_done());
/// ```
pub struct CodeblockProtocol;

impl ToolCallProtocol for CodeblockProtocol {
    fn format(&self) -> promptcall_types::ToolCallFormat {
        promptcall_types::ToolCallFormat::Codeblock
    }

    fn format_name(&self) -> &'static str {
        "Codeblock"
    }

    fn accepted_starts(&self) -> &'static [ToolStart] {
        ACCEPTED_STARTS
    }

    fn split_policy(&self) -> SplitPolicy {
        SplitPolicy::Codeblock
    }

    fn parse_chunk(
        &self,
        chunk: &str,
        state: &mut ParserState,
    ) -> Result<Option<ToolCallDelta>, ToolCallParseError> {
        if chunk == "\n" {
            return self.complete_line(state);
        }

        // A closing fence at the start of a line ends the call even when the
        // stream stops before the trailing newline.
        if chunk == FENCE
            && state.line_index >= 2
            && state.current_arg.is_none()
            && state.current_line.trim().is_empty()
        {
            state.current_line.push_str(chunk);
            return self.complete_line(state);
        }

        state.current_line.push_str(chunk);
        Ok(None)
    }

    fn render_tool_call(&self, call: &ToolCall) -> String {
        let mut out = format!("```tool\nTOOL_NAME: {}\n", call.tool_name);
        if let Value::Object(args) = &call.input {
            for (name, value) in args {
                out.push_str(&format!(
                    "BEGIN_ARG: {}\n{}\nEND_ARG\n",
                    name,
                    render_value(value)
                ));
            }
        }
        out.push_str("```");
        out
    }

    fn render_tool_definition(&self, tool: &ToolDefinition) -> String {
        let mut out = format!(
            "```tool_definition\nTOOL_NAME: {}\nTOOL_DESCRIPTION:\n{}\n",
            tool.name,
            tool.description.trim()
        );
        for (name, schema, required) in parameters_of(tool) {
            out.push_str(&format!(
                "TOOL_ARG: {} ({}, {})\n",
                name,
                parameter_type(&schema),
                if required { "required" } else { "optional" }
            ));
            if let Some(description) = schema.get("description").and_then(|d| d.as_str()) {
                out.push_str(description.trim());
                out.push('\n');
            }
            out.push_str("END_TOOL_ARG\n");
        }
        if let Some(examples) = &tool.examples {
            out.push_str("TOOL_EXAMPLES:\n");
            out.push_str(examples.trim());
            out.push('\n');
        }
        out.push_str("```");
        out
    }

    fn system_message_prefix(&self) -> &'static str {
        r#"You have access to several "tools" that you can use at any time to retrieve information and/or perform tasks for the User.
To use a tool, respond with a tool code block (```) using the syntax shown in the example below:"#
    }

    fn system_message_suffix(&self) -> &'static str {
        r#"If it seems like the User's request could be solved with one of the tools, choose the BEST one for the job based on the user's request and the tool descriptions.
Then send the ```tool code block, starting on a new line, with the tool name on the TOOL_NAME line and one BEGIN_ARG/END_ARG section per argument.
Write argument values verbatim: plain text, numbers, booleans, or JSON arrays and objects.
NEVER call more than one tool per response. Wait for the tool result before continuing."#
    }

    fn example_usage(&self) -> &'static str {
        r#"```tool
TOOL_NAME: search
BEGIN_ARG: query
example search
END_ARG
BEGIN_ARG: limit
10
END_ARG
```"#
    }
}

impl CodeblockProtocol {
    fn complete_line(
        &self,
        state: &mut ParserState,
    ) -> Result<Option<ToolCallDelta>, ToolCallParseError> {
        let line = std::mem::take(&mut state.current_line);
        let line = line.strip_suffix('\r').unwrap_or(&line).to_string();
        let index = state.line_index;
        state.line_index += 1;

        match index {
            0 => {
                // Anything after the opening fence on the same line belongs to
                // the name line.
                let rest = match OPENING_FENCE.find(&line) {
                    Some(m) => &line[m.end()..],
                    None => "",
                };
                let rest = rest.trim_start();
                if rest.is_empty() {
                    return Ok(None);
                }
                state.current_line = rest.to_string();
                self.complete_line(state)
            }
            1 => {
                let name = TOOL_NAME
                    .captures(&line)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().trim())
                    .unwrap_or_default();
                if name.is_empty() {
                    return Err(ToolCallParseError::MissingToolName(line));
                }
                tracing::debug!("Codeblock tool call name: {}", name);
                Ok(Some(emit(state, name, "")))
            }
            _ => self.complete_body_line(line, state),
        }
    }

    fn complete_body_line(
        &self,
        line: String,
        state: &mut ParserState,
    ) -> Result<Option<ToolCallDelta>, ToolCallParseError> {
        if let Some(arg) = state.current_arg.take() {
            if END_ARG.is_match(&line) {
                let raw_value = std::mem::take(&mut state.arg_value_lines).join("\n");
                let fragment = argument_fragment(&raw_value);
                tracing::debug!("Codeblock argument {} = {}", arg, fragment);
                state.processed_args.push(arg);
                return Ok(Some(emit(state, "", &fragment)));
            }
            state.arg_value_lines.push(line);
            state.current_arg = Some(arg);
            return Ok(None);
        }

        if let Some(captures) = BEGIN_ARG.captures(&line) {
            let name = captures.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
            if name.is_empty() {
                return Err(ToolCallParseError::MissingArgName(line));
            }
            let fragment = arg_key_fragment(name, state.processed_args.is_empty());
            state.current_arg = Some(name.to_string());
            return Ok(Some(emit(state, "", &fragment)));
        }

        let trimmed = line.trim();
        if trimmed == FENCE || trimmed.is_empty() {
            state.done = true;
            tracing::debug!(
                "Codeblock tool call complete with {} argument(s)",
                state.processed_args.len()
            );
            if !state.processed_args.is_empty() {
                return Ok(Some(emit(state, "", "}")));
            }
        }
        Ok(None)
    }
}

/// Raw argument text that reads back as `value`.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) if coerce_argument_value(s) == *value => s.clone(),
        other => other.to_string(),
    }
}
