//! Depot configuration file.
//!
//! The file is a list of `key=value` lines:
//!
//! ```text
//! version=1
//! tool-prefix=tools/juju-
//! tool-suffix=.tgz
//! ```
//!
//! Blank lines and `#` comments are ignored, as are unknown keys.

use crate::error::{Error, Result};
use std::path::Path;

/// Default prefix for tool artifact names.
pub const DEFAULT_TOOL_PREFIX: &str = "tools/juju-";

/// Suffix of every tool artifact name.
pub const DEFAULT_TOOL_SUFFIX: &str = ".tgz";

const CONFIG_VERSION: &str = "1";

/// Repository settings read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub tool_prefix: String,
    pub tool_suffix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tool_prefix: DEFAULT_TOOL_PREFIX.to_string(),
            tool_suffix: DEFAULT_TOOL_SUFFIX.to_string(),
        }
    }
}

impl Config {
    /// Parse config file content. `path` is only used for error messages.
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let mut version = None;
        let mut config = Config::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                match key.trim() {
                    "version" => version = Some(value.trim()),
                    "tool-prefix" => config.tool_prefix = value.trim().to_string(),
                    "tool-suffix" => config.tool_suffix = value.trim().to_string(),
                    _ => {}
                }
            }
        }

        if version != Some(CONFIG_VERSION) {
            return Err(Error::invalid_config(
                path,
                format!("unsupported config version: {:?}", version),
            ));
        }
        if config.tool_suffix.is_empty() {
            return Err(Error::invalid_config(path, "tool-suffix cannot be empty"));
        }

        Ok(config)
    }

    /// Render as config file content.
    pub fn render(&self) -> String {
        format!(
            "version={}\ntool-prefix={}\ntool-suffix={}\n",
            CONFIG_VERSION, self.tool_prefix, self.tool_suffix
        )
    }

    /// Same config with a different tool prefix.
    pub fn with_tool_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.tool_prefix = prefix.into();
        self
    }
}
