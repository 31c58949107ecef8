use std::path::Path;

use promptcall_types::{ConfigError, ToolCallFormat};
use serde::{Deserialize, Serialize};

/// What the interceptor does with a tool call region the protocol rejects.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryPolicy {
    /// The failure stays on the call; every later chunk re-emits the whole
    /// raw text seen so far.
    #[default]
    ReplayBuffer,
    /// Emit the raw text once, drop the call and go back to looking for a
    /// tool call start.
    Passthrough,
}

/// Interceptor settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct InterceptorConfig {
    /// Tool call convention the model was prompted with (default: codeblock)
    #[serde(default)]
    pub format: ToolCallFormat,

    #[serde(default)]
    pub recovery: RecoveryPolicy,
}

impl InterceptorConfig {
    pub fn new(format: ToolCallFormat) -> Self {
        Self {
            format,
            ..Default::default()
        }
    }

    pub fn with_recovery(mut self, recovery: RecoveryPolicy) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from a `.yaml`/`.yml` or `.toml` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let config = match extension.as_str() {
            "yaml" | "yml" => Self::from_yaml_str(&content)?,
            "toml" => Self::from_toml_str(&content)?,
            other => return Err(ConfigError::UnsupportedExtension(other.to_string())),
        };
        tracing::debug!("Loaded interceptor config from {}: {:?}", path.display(), config);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = InterceptorConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config.format, ToolCallFormat::Codeblock);
        assert_eq!(config.recovery, RecoveryPolicy::ReplayBuffer);
    }

    #[test]
    fn test_yaml_and_toml_agree() {
        let yaml = InterceptorConfig::from_yaml_str("format: xml\nrecovery: passthrough\n").unwrap();
        let toml = InterceptorConfig::from_toml_str("format = \"xml\"\nrecovery = \"passthrough\"\n")
            .unwrap();
        assert_eq!(yaml, toml);
        assert_eq!(
            yaml,
            InterceptorConfig::new(ToolCallFormat::Xml).with_recovery(RecoveryPolicy::Passthrough)
        );
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        assert!(InterceptorConfig::from_yaml_str("format: json\n").is_err());
    }

    #[test]
    fn test_from_file_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "format = \"xml\"").unwrap();
        let config = InterceptorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.format, ToolCallFormat::Xml);

        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "recovery: passthrough").unwrap();
        let config = InterceptorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.recovery, RecoveryPolicy::Passthrough);

        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(matches!(
            InterceptorConfig::from_file(file.path()),
            Err(ConfigError::UnsupportedExtension(ext)) if ext == "ini"
        ));
    }
}
