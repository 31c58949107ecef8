//! Tests for both tool call protocols

use promptcall_types::{ToolCall, ToolCallDelta, ToolCallParseError, ToolDefinition};
use serde_json::json;

use super::ToolCallProtocol;
use crate::delta::ToolCallAccumulator;
use crate::state::ParserState;

mod xml_tests;

/// Everything one protocol produced for one piece of model output.
pub struct Run {
    pub deltas: Vec<ToolCallDelta>,
    pub errors: Vec<ToolCallParseError>,
    pub state: ParserState,
}

impl Run {
    pub fn arguments(&self) -> String {
        self.deltas
            .iter()
            .map(|d| d.arguments_fragment())
            .collect()
    }

    pub fn call(&self) -> ToolCall {
        let mut acc = ToolCallAccumulator::new();
        for delta in &self.deltas {
            acc.push(delta);
        }
        acc.finish().expect("arguments should be valid JSON")
    }
}

/// Normalize the opening the way the interceptor does, then feed every chunk.
pub fn drive(protocol: &dyn ToolCallProtocol, text: &str) -> Run {
    let found = protocol.detect_start(text);
    let normalized = if found.is_in_tool_call {
        found.normalized_buffer
    } else {
        text.to_string()
    };
    let chunks: Vec<String> = protocol
        .split(&normalized)
        .into_iter()
        .map(str::to_string)
        .collect();
    drive_chunks(protocol, chunks.iter().map(String::as_str))
}

/// Feed pre-cut chunks without splitting or normalizing.
pub fn drive_chunks<'a>(
    protocol: &dyn ToolCallProtocol,
    chunks: impl IntoIterator<Item = &'a str>,
) -> Run {
    let mut run = Run {
        deltas: Vec::new(),
        errors: Vec::new(),
        state: ParserState::new("call-1"),
    };
    for chunk in chunks {
        match protocol.process_chunk(chunk, &mut run.state) {
            Ok(Some(delta)) => run.deltas.push(delta),
            Ok(None) => {}
            Err(e) => run.errors.push(e),
        }
    }
    run
}

pub fn sample_call() -> ToolCall {
    ToolCall {
        tool_call_id: "call-1".to_string(),
        tool_name: "create_file".to_string(),
        input: json!({
            "path": "/tmp/test.txt",
            "content": "Hello world!\nSecond line",
            "permissions": 644,
            "overwrite": false,
            "tags": ["a", "b <c>"],
            "options": {"mode": "append", "retries": 2.5},
            "padded": "  spaced  ",
            "numeric_text": "42",
        }),
    }
}

pub fn sample_tool() -> ToolDefinition {
    ToolDefinition {
        name: "search".to_string(),
        description: "Search the web".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "What to look for"},
                "limit": {"type": ["integer", "null"]}
            },
            "required": ["query"]
        }),
        examples: None,
    }
}

#[test]
fn test_factory_picks_protocol_by_format() {
    use super::ParserFactory;
    use promptcall_types::ToolCallFormat;

    for format in [ToolCallFormat::Codeblock, ToolCallFormat::Xml] {
        let protocol = ParserFactory::create_protocol(&format);
        assert_eq!(protocol.format(), format);
        assert!(!protocol.example_usage().is_empty());
    }
}

#[test]
fn test_every_example_usage_parses() {
    use super::ParserFactory;
    use promptcall_types::ToolCallFormat;

    for format in [ToolCallFormat::Codeblock, ToolCallFormat::Xml] {
        let protocol = ParserFactory::create_protocol(&format);
        let run = drive(protocol.as_ref(), protocol.example_usage());
        assert!(run.errors.is_empty(), "{:?}", run.errors);
        assert!(run.state.is_done());
        let call = run.call();
        assert_eq!(call.tool_name, "search");
        assert_eq!(call.input, json!({"query": "example search", "limit": 10}));
    }
}

#[test]
fn test_parameters_of_keeps_declaration_order() {
    let params = super::parameters_of(&sample_tool());
    let names: Vec<_> = params.iter().map(|(n, _, _)| n.as_str()).collect();
    assert_eq!(names, vec!["query", "limit"]);
    assert!(params[0].2);
    assert!(!params[1].2);
    assert_eq!(super::parameter_type(&params[1].1), "integer | null");
}
