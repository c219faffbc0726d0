//! Configuration file loading
//!
//! `~/.lsql/config.toml`, every section and key optional:
//!
//! ```toml
//! [shell]
//! prompt = "lsql> "
//! history_file = "~/.lsql_history"
//! history_size = 1000
//!
//! [output]
//! format = "table"        # table | json
//! max_field_length = 50
//! color = true
//!
//! [log]
//! level = "warn"          # any tracing EnvFilter directive
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    shell::render::{MAX_FIELD_LENGTH, OutputFormat, Renderer},
};

pub const DEFAULT_CONFIG_PATH: &str = "~/.lsql/config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub shell: ShellConfig,
    pub output: OutputConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShellConfig {
    pub prompt: String,
    /// Line history file; an empty string disables persistent history
    pub history_file: String,
    pub history_size: usize,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: "lsql> ".to_string(),
            history_file: "~/.lsql_history".to_string(),
            history_size: 1000,
        }
    }
}

impl ShellConfig {
    pub fn history_path(&self) -> Option<PathBuf> {
        if self.history_file.is_empty() {
            None
        } else {
            Some(expand_path(Path::new(&self.history_file)))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub max_field_length: usize,
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Table,
            max_field_length: MAX_FIELD_LENGTH,
            color: true,
        }
    }
}

impl OutputConfig {
    pub fn renderer(&self) -> Renderer {
        Renderer::new(self.format, self.max_field_length, self.color)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// Expands a leading `~/` to the home directory
pub fn expand_path(path: &Path) -> PathBuf {
    if let Some(rest) = path.to_str().and_then(|p| p.strip_prefix("~/")) {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

impl Config {
    /// Loads the file at `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let path = expand_path(path);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}
