//! Tests for the tag protocol

use promptcall_types::{ToolCallDelta, ToolCallParseError};
use serde_json::json;

use super::super::ToolCallProtocol;
use super::super::xml::XmlProtocol;
use super::{drive, drive_chunks, sample_call, sample_tool};

const SEARCH_CALL: &str = "<tool_call>\n<name>search</name>\n<args>\n<query>rust</query>\n<limit>5</limit>\n</args>\n</tool_call>";

#[test]
fn test_xml_full_call() {
    let run = drive(&XmlProtocol, SEARCH_CALL);

    assert!(run.errors.is_empty(), "{:?}", run.errors);
    assert!(run.state.is_done());
    assert_eq!(run.state.inconsistencies(), 0);
    let call = run.call();
    assert_eq!(call.tool_name, "search");
    assert_eq!(call.input, json!({"query": "rust", "limit": 5}));
    assert_eq!(run.arguments(), r#"{"query":"rust","limit":5}"#);
}

#[test]
fn test_xml_second_fragment_is_appended_suffix() {
    let run = drive(&XmlProtocol, SEARCH_CALL);
    let fragments: Vec<_> = run.deltas.iter().map(|d| d.arguments_fragment()).collect();
    assert_eq!(
        fragments,
        vec!["", "{", r#""query":"rust""#, r#","limit":5"#, "}"]
    );
    assert_eq!(run.deltas[0].name_fragment(), "search");
    assert!(run.deltas[1..].iter().all(|d| d.name_fragment().is_empty()));
}

#[test]
fn test_xml_character_by_character_stream() {
    let chars: Vec<String> = SEARCH_CALL.chars().map(String::from).collect();
    let run = drive_chunks(&XmlProtocol, chars.iter().map(String::as_str));

    assert!(run.errors.is_empty());
    assert!(run.state.is_done());
    assert_eq!(run.state.inconsistencies(), 0);
    assert_eq!(run.call().input, json!({"query": "rust", "limit": 5}));
}

#[test]
fn test_xml_no_args_call() {
    let run = drive(&XmlProtocol, "<tool_call><name>list_files</name></tool_call>");
    assert_eq!(run.deltas, vec![ToolCallDelta::new("call-1", "list_files", "")]);
    assert_eq!(run.call().input, json!({}));
}

#[test]
fn test_xml_nested_elements_become_objects() {
    let run = drive(
        &XmlProtocol,
        "<tool_call><name>query</name><args><table>users</table>\
<filter><active>true</active><role>admin</role></filter></args></tool_call>",
    );
    assert!(run.errors.is_empty());
    assert_eq!(
        run.call().input,
        json!({"table": "users", "filter": {"active": true, "role": "admin"}})
    );
}

#[test]
fn test_xml_json_values_and_entities() {
    let run = drive(
        &XmlProtocol,
        "<tool_call><name>t</name><args>\
<expr>a &lt; b &amp;&amp; c</expr>\
<ids>[1, 2, 3]</ids>\
<opts>{\"deep\": {\"x\": null}}</opts>\
</args></tool_call>",
    );
    assert!(run.errors.is_empty());
    assert_eq!(
        run.call().input,
        json!({"expr": "a < b && c", "ids": [1, 2, 3], "opts": {"deep": {"x": null}}})
    );
}

#[test]
fn test_xml_fenced_openings_are_normalized() {
    for opening in ["```xml\n", "```tool_call\n", "```\n", "```XML\n"] {
        let text = format!(
            "{}<tool_call><name>ls</name><args><path>.</path></args></tool_call>\n```",
            opening
        );
        let found = XmlProtocol.detect_start(&text);
        assert!(found.is_in_tool_call, "{:?}", opening);
        assert!(found.normalized_buffer.starts_with("<tool_call>"));

        let run = drive(&XmlProtocol, &text);
        assert!(run.errors.is_empty(), "{:?}", opening);
        assert_eq!(run.call().input, json!({"path": "."}));
    }
}

#[test]
fn test_xml_tags_are_case_insensitive() {
    let run = drive(
        &XmlProtocol,
        "<TOOL_CALL><Name>grep</Name><ARGS><Pattern>fn</Pattern></ARGS></Tool_Call>",
    );
    assert!(run.errors.is_empty(), "{:?}", run.errors);
    assert!(run.state.is_done());
    let call = run.call();
    assert_eq!(call.tool_name, "grep");
    assert_eq!(call.input, json!({"Pattern": "fn"}));
}

#[test]
fn test_xml_argument_called_name_is_not_the_tool_name() {
    let text = "<tool_call><args><name>alice</name><age>3</age></args><name>greet</name></tool_call>";
    let run = drive(&XmlProtocol, text);

    assert!(run.errors.is_empty(), "{:?}", run.errors);
    assert!(run.state.is_done());
    let call = run.call();
    assert_eq!(call.tool_name, "greet");
    assert_eq!(call.input, json!({"name": "alice", "age": 3}));

    let chars: Vec<String> = text.chars().map(String::from).collect();
    let run = drive_chunks(&XmlProtocol, chars.iter().map(String::as_str));
    assert_eq!(run.deltas[0].name_fragment(), "greet");
    assert_eq!(run.state.inconsistencies(), 0);
    assert_eq!(run.call().input, json!({"name": "alice", "age": 3}));
}

#[test]
fn test_xml_name_inside_open_args_is_not_taken() {
    let run = drive(&XmlProtocol, "<tool_call><args><name>alice</name>");
    assert!(run.errors.is_empty());
    assert!(run.deltas.is_empty());
}

#[test]
fn test_xml_empty_name_is_an_error() {
    let run = drive(&XmlProtocol, "<tool_call><name> </name>");
    assert!(run.deltas.is_empty());
    assert!(matches!(
        run.state.failure(),
        Some(ToolCallParseError::MissingToolName(_))
    ));
}

#[test]
fn test_xml_closed_call_without_name_is_an_error() {
    let run = drive(&XmlProtocol, "<tool_call><args><a>1</a></args></tool_call>");
    assert!(run.deltas.is_empty());
    assert_eq!(run.errors.len(), 1);
    assert!(!run.state.is_done());
}

#[test]
fn test_xml_closing_tag_inside_value_ends_the_call() {
    // The close is recognised by a suffix check on the raw text, so a value
    // that happens to contain it ends the call early.
    let chunks = [
        "<tool_call>",
        "<name>",
        "echo",
        "</name>",
        "<args>",
        "<text>",
        "use ",
        "</tool_call>",
        " to finish",
        "</text>",
        "</args>",
        "</tool_call>",
    ];
    let run = drive_chunks(&XmlProtocol, chunks);

    assert!(run.state.is_done());
    assert_eq!(run.arguments(), "{}");
    assert_eq!(run.call().input, json!({}));
}

#[test]
fn test_xml_rendered_call_parses_back() {
    let call = sample_call();
    let rendered = XmlProtocol.render_tool_call(&call);
    println!("{}", rendered);

    let run = drive(&XmlProtocol, &rendered);
    assert!(run.errors.is_empty(), "{:?}", run.errors);
    let parsed = run.call();
    assert_eq!(parsed.tool_name, call.tool_name);
    assert_eq!(parsed.input, call.input);
}

#[test]
fn test_xml_render_tool_definition() {
    let rendered = XmlProtocol.render_tool_definition(&sample_tool());
    assert!(rendered.starts_with("<tool_definition>\n<name>search</name>\n"));
    assert!(rendered.contains("<query type=\"string\" required=\"true\">What to look for</query>"));
    assert!(rendered.contains("<limit type=\"integer | null\" required=\"false\"></limit>"));
    assert!(rendered.ends_with("</tool_definition>"));
}
