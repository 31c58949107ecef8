//! Tag protocol
//!
//! ```xml
//! <tool_call>
//!   <name>search</name>
//!   <args>
//!     <query>rust streaming parsers</query>
//!     <limit>5</limit>
//!   </args>
//! </tool_call>
//! ```
//!
//! The accumulated text is re-read on every chunk. Only closed elements are
//! taken, so the arguments snapshot only ever grows; the difference against the
//! previous snapshot is what gets emitted.

use std::borrow::Cow;

use promptcall_types::{ToolCall, ToolCallDelta, ToolCallParseError, ToolDefinition};
use quick_xml::escape::{partial_escape, unescape};
use serde_json::{Map, Value};

use super::{ToolCallProtocol, parameter_type, parameters_of};
use crate::boundary::ToolStart;
use crate::delta::{coerce_argument_value, emit, prefix_delta};
use crate::splitter::SplitPolicy;
use crate::state::ParserState;

const CALL_CLOSE: &str = "</tool_call>";

const ACCEPTED_STARTS: &[ToolStart] = &[
    ToolStart::new("<tool_call>", "<tool_call>"),
    ToolStart::new("```xml\n<tool_call>", "<tool_call>"),
    ToolStart::new("```tool_call\n<tool_call>", "<tool_call>"),
    ToolStart::new("```\n<tool_call>", "<tool_call>"),
];

pub struct XmlProtocol;

/// What a lenient read of the accumulated text found so far.
#[derive(Debug, Default)]
struct PartialCall {
    /// Content of the closed `<name>` element.
    name: Option<String>,
    /// Children of `<args>`, `None` until the element opens.
    args: Option<Map<String, Value>>,
    args_closed: bool,
}

/// Char offsets of one element. The content end is `None` while it is open.
#[derive(Debug, Clone, Copy)]
struct Element {
    open: usize,
    content_start: usize,
    content_end: Option<usize>,
    end: Option<usize>,
}

impl ToolCallProtocol for XmlProtocol {
    fn format(&self) -> promptcall_types::ToolCallFormat {
        promptcall_types::ToolCallFormat::Xml
    }

    fn format_name(&self) -> &'static str {
        "XML"
    }

    fn accepted_starts(&self) -> &'static [ToolStart] {
        ACCEPTED_STARTS
    }

    fn split_policy(&self) -> SplitPolicy {
        SplitPolicy::Xml
    }

    fn parse_chunk(
        &self,
        _chunk: &str,
        state: &mut ParserState,
    ) -> Result<Option<ToolCallDelta>, ToolCallParseError> {
        let call_closed = ends_with_ignore_case(state.raw.trim_end(), CALL_CLOSE);
        let partial = self.read_partial(&state.raw, call_closed);

        let name = match &partial.name {
            Some(name) if name.is_empty() => {
                return Err(ToolCallParseError::MissingToolName(state.raw.clone()));
            }
            Some(name) => name.clone(),
            None if call_closed => {
                return Err(ToolCallParseError::MissingToolName(state.raw.clone()));
            }
            None => return Ok(None),
        };

        if call_closed {
            state.done = true;
            tracing::debug!("XML tool call {} complete", name);
        }

        let snapshot = render_snapshot(&partial);
        let previous = state.last_snapshot.as_deref().unwrap_or_default();
        let diff = prefix_delta(previous, &snapshot);
        if !diff.consistent {
            state.inconsistencies += 1;
            tracing::warn!(
                "XML arguments snapshot diverged from the emitted prefix: {:?} -> {:?}",
                previous,
                snapshot
            );
        }
        state.last_snapshot = Some(snapshot);

        if !state.name_emitted {
            state.name_emitted = true;
            tracing::debug!("XML tool call name: {}", name);
            return Ok(Some(emit(state, &name, &diff.fragment)));
        }
        if diff.fragment.is_empty() {
            return Ok(None);
        }
        Ok(Some(emit(state, "", &diff.fragment)))
    }

    fn render_tool_call(&self, call: &ToolCall) -> String {
        let mut out = format!(
            "<tool_call>\n<name>{}</name>\n",
            partial_escape(&call.tool_name)
        );
        if let Value::Object(args) = &call.input {
            out.push_str("<args>\n");
            for (name, value) in args {
                out.push_str(&format!("<{name}>{}</{name}>\n", render_value(value)));
            }
            out.push_str("</args>\n");
        }
        out.push_str(CALL_CLOSE);
        out
    }

    fn render_tool_definition(&self, tool: &ToolDefinition) -> String {
        let mut out = format!(
            "<tool_definition>\n<name>{}</name>\n<description>{}</description>\n",
            partial_escape(&tool.name),
            partial_escape(tool.description.trim())
        );
        let parameters = parameters_of(tool);
        if !parameters.is_empty() {
            out.push_str("<args>\n");
            for (name, schema, required) in parameters {
                let description = schema
                    .get("description")
                    .and_then(|d| d.as_str())
                    .unwrap_or_default();
                out.push_str(&format!(
                    "<{name} type=\"{}\" required=\"{}\">{}</{name}>\n",
                    parameter_type(&schema),
                    required,
                    partial_escape(description.trim())
                ));
            }
            out.push_str("</args>\n");
        }
        if let Some(examples) = &tool.examples {
            out.push_str(&format!("<examples>\n{}\n</examples>\n", examples.trim()));
        }
        out.push_str("</tool_definition>");
        out
    }

    fn system_message_prefix(&self) -> &'static str {
        r#"You have access to several "tools" that you can use at any time to retrieve information and/or perform tasks for the User.
To use a tool, respond with a <tool_call> element using the syntax shown in the example below:"#
    }

    fn system_message_suffix(&self) -> &'static str {
        r#"If it seems like the User's request could be solved with one of the tools, choose the BEST one for the job based on the user's request and the tool descriptions.
Put the tool name in <name> and one child element per argument inside <args>. Escape <, > and & inside values.
Write argument values verbatim: plain text, numbers, booleans, or JSON arrays and objects.
NEVER call more than one tool per response. Wait for the tool result before continuing."#
    }

    fn example_usage(&self) -> &'static str {
        r#"<tool_call>
<name>search</name>
<args>
<query>example search</query>
<limit>10</limit>
</args>
</tool_call>"#
    }
}

impl XmlProtocol {
    fn read_partial(&self, raw: &str, call_closed: bool) -> PartialCall {
        let chars: Vec<char> = raw.chars().collect();
        let mut partial = PartialCall::default();
        let args = self.find_element(&chars, "args", 0);

        if let Some(name) = self.find_name(&chars, args.as_ref()) {
            if let Some(end) = name.content_end {
                let inner: String = chars[name.content_start..end].iter().collect();
                partial.name = Some(unescape_lossy(inner.trim()).into_owned());
            }
        }

        if let Some(args) = args {
            let region_end = match args.content_end {
                Some(end) => end,
                None => self
                    .find_tag_at_index(&chars, CALL_CLOSE, args.content_start)
                    .unwrap_or(chars.len()),
            };
            partial.args = Some(self.parse_children(&chars[args.content_start..region_end]));
            partial.args_closed = args.content_end.is_some() || call_closed;
        }

        partial
    }

    /// The `<name>` element of the call itself. An argument may also be called
    /// `name`, so candidates inside `<args>` are skipped.
    fn find_name(&self, chars: &[char], args: Option<&Element>) -> Option<Element> {
        let mut from = 0;
        loop {
            let name = self.find_element(chars, "name", from)?;
            let Some(args) = args else {
                return Some(name);
            };
            if name.open < args.open {
                return Some(name);
            }
            match args.end {
                Some(args_end) if name.open >= args_end => return Some(name),
                Some(args_end) => from = args_end,
                // Still inside the open args element.
                None => return None,
            }
        }
    }

    /// First `<tag>` element at or after `from`.
    fn find_element(&self, chars: &[char], tag: &str, from: usize) -> Option<Element> {
        let open_tag = format!("<{}>", tag);
        let close_tag = format!("</{}>", tag);
        let open = self.find_tag_at_index(chars, &open_tag, from)?;
        let content_start = open + open_tag.chars().count();
        let content_end = self.find_tag_at_index(chars, &close_tag, content_start);
        Some(Element {
            open,
            content_start,
            content_end,
            end: content_end.map(|end| end + close_tag.chars().count()),
        })
    }

    /// Find a tag starting at or after the given index
    fn find_tag_at_index(&self, chars: &[char], tag: &str, start_index: usize) -> Option<usize> {
        let tag_chars: Vec<char> = tag.chars().collect();
        let tag_len = tag_chars.len();
        if tag_len > chars.len() {
            return None;
        }

        (start_index..=chars.len() - tag_len).find(|&i| {
            (0..tag_len).all(|j| chars[i + j].eq_ignore_ascii_case(&tag_chars[j]))
        })
    }

    /// Closed child elements, in document order, up to the first open one.
    fn parse_children(&self, chars: &[char]) -> Map<String, Value> {
        let mut children = Map::new();
        let mut index = 0;

        while index < chars.len() {
            if chars[index] != '<' {
                index += 1;
                continue;
            }

            let name_start = index + 1;
            let mut name_end = name_start;
            while name_end < chars.len()
                && chars[name_end] != '>'
                && !chars[name_end].is_whitespace()
            {
                name_end += 1;
            }
            let name: String = chars[name_start..name_end].iter().collect();

            let Some(open_end) = chars[name_end..].iter().position(|c| *c == '>') else {
                break;
            };
            let content_start = name_end + open_end + 1;

            // Stray closing tags and empty names carry no argument.
            if name.is_empty() || name.starts_with('/') {
                index = content_start;
                continue;
            }

            let close_tag = format!("</{}>", name);
            let Some(content_end) = self.find_tag_at_index(chars, &close_tag, content_start)
            else {
                break;
            };

            let value = self.parse_value(&chars[content_start..content_end]);
            if !children.contains_key(&name) {
                children.insert(name, value);
            }
            index = content_end + close_tag.chars().count();
        }

        children
    }

    /// Nested elements become an object, anything else goes through coercion.
    fn parse_value(&self, chars: &[char]) -> Value {
        let content: String = chars.iter().collect();
        let trimmed = content.trim();

        if trimmed.starts_with('<') && !trimmed.starts_with("</") {
            let nested = self.parse_children(chars);
            if !nested.is_empty() {
                return Value::Object(nested);
            }
        }

        coerce_argument_value(&unescape_lossy(trimmed))
    }
}

/// Arguments JSON as far as it is known. The closing brace is held back
/// until `<args>` closes.
fn render_snapshot(partial: &PartialCall) -> String {
    let Some(args) = &partial.args else {
        return String::new();
    };
    let text = Value::Object(args.clone()).to_string();
    if partial.args_closed {
        return text;
    }
    match text.strip_suffix('}') {
        Some(open) => open.to_string(),
        None => text,
    }
}

fn render_value(value: &Value) -> String {
    let text = match value {
        Value::String(s) if coerce_argument_value(s) == *value => s.clone(),
        other => other.to_string(),
    };
    partial_escape(&text).into_owned()
}

fn unescape_lossy(text: &str) -> Cow<'_, str> {
    match unescape(text) {
        Ok(unescaped) => unescaped,
        Err(e) => {
            tracing::debug!("Leaving XML text escaped: {}", e);
            Cow::Borrowed(text)
        }
    }
}

fn ends_with_ignore_case(text: &str, suffix: &str) -> bool {
    text.len() >= suffix.len()
        && text.is_char_boundary(text.len() - suffix.len())
        && text[text.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}
