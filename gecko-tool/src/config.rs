use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use gecko_core::config::TextOptions;
use log::LevelFilter;
use serde::{Deserialize, Serialize};

/// Output forms `convert` can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Gct,
    Plain,
    Annotated,
}

/// Tool settings, read from a TOML file.
///
/// ```toml
/// max_input_len = 1048576
/// default_format = "annotated"
/// log_level = "debug"
///
/// [text]
/// uppercase = false
/// line_ending = "crlf"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Inputs larger than this many bytes are refused.
    pub max_input_len: usize,
    /// Used by `convert` when `--to` is not given.
    pub default_format: OutputFormat,
    pub text: TextOptions,
    pub log_level: LevelFilter,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            max_input_len: 16 * 1024 * 1024,
            default_format: OutputFormat::Annotated,
            text: TextOptions::default(),
            log_level: LevelFilter::Warn,
        }
    }
}

impl ToolConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = toml::from_str(&config_str)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gecko_core::config::LineEnding;

    #[test]
    fn partial_file_keeps_defaults() -> Result<()> {
        let config: ToolConfig = toml::from_str(
            r#"
            default_format = "plain"
            log_level = "debug"

            [text]
            line_ending = "crlf"
            "#,
        )?;
        assert_eq!(config.default_format, OutputFormat::Plain);
        assert_eq!(config.log_level, LevelFilter::Debug);
        assert_eq!(config.text.line_ending, LineEnding::CrLf);
        assert!(config.text.uppercase);
        assert_eq!(config.max_input_len, ToolConfig::default().max_input_len);
        Ok(())
    }

    #[test]
    fn default_survives_toml() -> Result<()> {
        let text = toml::to_string_pretty(&ToolConfig::default())?;
        let config: ToolConfig = toml::from_str(&text)?;
        assert_eq!(config, ToolConfig::default());
        Ok(())
    }
}
