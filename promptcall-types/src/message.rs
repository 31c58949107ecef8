use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// Represents a system message.
    System,
    /// Represents a message from the user.
    User,
    /// Represents a message from the assistant.
    Assistant,
    /// Represents a message from a tool.
    Tool,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

/// A typed content part of a chat message.
#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl MessagePart {
    pub fn text(text: impl Into<String>) -> Self {
        MessagePart::Text { text: text.into() }
    }
}

/// Message content is either a plain string or a list of typed parts.
#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<MessagePart>),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

/// Function portion of a streamed tool call delta.
#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, PartialEq, Eq, Default)]
pub struct FunctionCallDelta {
    /// Fragment of the function name. Concatenated across deltas of one call.
    pub name: String,
    /// Fragment of the JSON arguments text. Concatenated across deltas of one call.
    pub arguments: String,
}

/// One incremental piece of a tool call.
///
/// Concatenating the name fragments of every delta sharing an `id` yields the
/// function name; concatenating the arguments fragments yields the JSON
/// arguments object text.
#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, PartialEq, Eq)]
pub struct ToolCallDelta {
    pub id: String,
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    pub function: FunctionCallDelta,
}

fn default_call_type() -> String {
    "function".to_string()
}

impl ToolCallDelta {
    pub fn new(
        id: impl Into<String>,
        name_fragment: impl Into<String>,
        arguments_fragment: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: default_call_type(),
            function: FunctionCallDelta {
                name: name_fragment.into(),
                arguments: arguments_fragment.into(),
            },
        }
    }

    pub fn name_fragment(&self) -> &str {
        &self.function.name
    }

    pub fn arguments_fragment(&self) -> &str {
        &self.function.arguments
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, PartialEq)]
pub struct ChatMessage {
    pub role: MessageRole,
    #[serde(default)]
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<MessageContent>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, text.into())
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, text.into())
    }

    /// Assistant message carrying a single tool call delta and no text.
    pub fn tool_call_delta(delta: ToolCallDelta) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: MessageContent::Text(String::new()),
            tool_calls: Some(vec![delta]),
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.role == MessageRole::Assistant
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|calls| !calls.is_empty())
    }

    /// Text of every content part, or `None` when any part is not text.
    pub fn text_parts(&self) -> Option<Vec<&str>> {
        match &self.content {
            MessageContent::Text(text) => Some(vec![text.as_str()]),
            MessageContent::Parts(parts) => parts
                .iter()
                .map(|part| match part {
                    MessagePart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }

    /// Concatenated text content, skipping non-text parts.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    MessagePart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }
}

/// A completed tool call.
#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, PartialEq)]
pub struct ToolCall {
    pub tool_call_id: String,
    pub tool_name: String,
    pub input: Value,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examples: Option<String>,
}

/// Supported prompt-embedded tool call conventions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallFormat {
    /// Fenced sentinel-line format
    /// Example: ```tool\nTOOL_NAME: search\nBEGIN_ARG: query\ntest\nEND_ARG\n```
    #[default]
    Codeblock,
    /// Tag format
    /// Example: <tool_call><name>search</name><args><query>test</query></args></tool_call>
    Xml,
}

impl std::fmt::Display for ToolCallFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolCallFormat::Codeblock => write!(f, "codeblock"),
            ToolCallFormat::Xml => write!(f, "xml"),
        }
    }
}

impl std::str::FromStr for ToolCallFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "codeblock" | "codeblocks" | "tool" => Ok(ToolCallFormat::Codeblock),
            "xml" | "tag" => Ok(ToolCallFormat::Xml),
            other => Err(format!("unknown tool call format: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_call_delta_serializes_openai_shape() {
        let delta = ToolCallDelta::new("call_1", "search", "{\"q\":");
        let value = serde_json::to_value(&delta).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "call_1",
                "type": "function",
                "function": {"name": "search", "arguments": "{\"q\":"}
            })
        );
    }

    #[test]
    fn test_message_content_accepts_string_or_parts() {
        let plain: ChatMessage =
            serde_json::from_value(json!({"role": "assistant", "content": "hi"})).unwrap();
        assert_eq!(plain.text_parts(), Some(vec!["hi"]));

        let parts: ChatMessage = serde_json::from_value(json!({
            "role": "user",
            "content": [
                {"type": "text", "text": "look"},
                {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}}
            ]
        }))
        .unwrap();
        assert_eq!(parts.text_parts(), None);
        assert_eq!(parts.text(), "look");
    }

    #[test]
    fn test_tool_call_delta_message() {
        let msg = ChatMessage::tool_call_delta(ToolCallDelta::new("id", "", "}"));
        assert!(msg.is_assistant());
        assert!(msg.has_tool_calls());
        assert_eq!(msg.text(), "");
    }

    #[test]
    fn test_system_message_is_not_assistant() {
        let msg = ChatMessage::new(MessageRole::System, "be terse".to_string());
        assert!(!msg.is_assistant());
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"role": "system", "content": "be terse"})
        );
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("XML".parse::<ToolCallFormat>(), Ok(ToolCallFormat::Xml));
        assert_eq!(
            "codeblock".parse::<ToolCallFormat>(),
            Ok(ToolCallFormat::Codeblock)
        );
        assert!("yaml".parse::<ToolCallFormat>().is_err());
    }
}
