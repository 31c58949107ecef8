/// Recoverable failures raised while assembling a tool call from streamed text.
///
/// None of these are fatal: the interceptor catches them and surfaces the raw
/// model output instead of a tool call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolCallParseError {
    #[error("Missing tool name, line: {0}")]
    MissingToolName(String),
    #[error("Missing argument name, line: {0}")]
    MissingArgName(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Unsupported config file extension: {0}")]
    UnsupportedExtension(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("Template error: {0}")]
    Template(String),
}
