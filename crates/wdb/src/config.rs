// WDB - Watch-display Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Configuration system for WDB
//!
//! User preferences live in `~/.wdb.toml`, which is created with defaults the
//! first time it is looked for.

use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, Level};
use wdb_common::DisplayFormat;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Defaults for new displays
    pub display: DisplayConfig,
    /// Command shell settings
    pub terminal: TerminalConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// Defaults applied to `display` commands without a format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Format of displays added without `/fmt`
    pub default_format: DisplayFormat,
    /// Item count of displays added without `/fmt`
    pub default_count: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { default_format: DisplayFormat::Natural, default_count: 1 }
    }
}

/// Command shell configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Prompt shown in interactive mode
    pub prompt: String,
    /// Maximum number of command history entries
    pub max_history: usize,
    /// Echo every command before its output
    pub echo_commands: bool,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self { prompt: "(wdb) ".to_string(), max_history: 100, echo_commands: false }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Also write logs to a file under the temp directory
    pub file_logging: bool,
    /// Console level used when RUST_LOG is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { file_logging: true, level: "warn".to_string() }
    }
}

impl LoggingConfig {
    /// The configured level
    pub fn level(&self) -> Result<Level> {
        Level::from_str(&self.level)
            .map_err(|e| eyre::eyre!("Invalid log level '{}': {e}", self.level))
    }
}

impl Config {
    /// Path of the user configuration file
    pub fn config_path() -> Result<PathBuf> {
        let home =
            dirs::home_dir().ok_or_else(|| eyre::eyre!("Unable to determine home directory"))?;
        Ok(home.join(".wdb.toml"))
    }

    /// Load the user configuration, creating it with defaults if missing
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            info!("Config file not found, creating default at {:?}", config_path);
            let default_config = Self::default();
            default_config.save_to(&config_path)?;
            return Ok(default_config);
        }

        Self::load_from_path(&config_path)
    }

    /// Load configuration from an explicit file
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path:?}"))?;

        let config: Self =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;
        config.logging.level()?;
        if config.display.default_count == 0 {
            eyre::bail!("display.default_count must be at least 1");
        }

        debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Write the configuration to the user configuration file
    pub fn save(&self) -> Result<()> {
        self.save_to(Self::config_path()?)
    }

    /// Write the configuration to `path`
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content =
            toml::to_string_pretty(self).with_context(|| "Failed to serialize config to TOML")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {path:?}"))?;

        debug!("Saved configuration to {:?}", path);
        Ok(())
    }
}
