use handlebars::Handlebars;
use promptcall_types::{PromptError, ToolDefinition};
use serde_json::json;

use crate::formats::ToolCallProtocol;

const TOOLS_TEMPLATE: &str = r#"{{#if base}}{{base}}

{{/if}}<tool_use_instructions>
{{prefix}}

{{example}}

{{suffix}}

Available tools:
{{#each tools}}

{{this}}
{{/each}}
</tool_use_instructions>"#;

/// Append tool-use instructions and every tool definition to a system message.
///
/// The base message is returned unchanged when there are no tools.
pub fn build_tools_system_message(
    protocol: &dyn ToolCallProtocol,
    base: &str,
    tools: &[ToolDefinition],
) -> Result<String, PromptError> {
    if tools.is_empty() {
        return Ok(base.to_string());
    }

    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(true);
    handlebars.register_escape_fn(handlebars::no_escape);

    let definitions: Vec<String> = tools
        .iter()
        .map(|tool| protocol.render_tool_definition(tool))
        .collect();
    let data = json!({
        "base": base.trim_end(),
        "prefix": protocol.system_message_prefix(),
        "example": protocol.example_usage(),
        "suffix": protocol.system_message_suffix(),
        "tools": definitions,
    });

    tracing::debug!(
        "Building {} system message with {} tool(s)",
        protocol.format_name(),
        tools.len()
    );
    handlebars
        .render_template(TOOLS_TEMPLATE, &data)
        .map_err(|e| PromptError::Template(format!("Failed to render template: {}", e)))
}
