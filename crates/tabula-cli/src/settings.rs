//! Settings file at `<config dir>/tabula/settings.toml`
//!
//! ```toml
//! connection_string = "postgres://me@localhost/app"
//! schema = "sales"
//! row_cap = 500
//!
//! [logging]
//! json_logs = true
//! filter = "info,tabula_services=debug"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tabula_core::connection_string_from_env;
use tabula_services::DEFAULT_ROW_CAP;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub connection_string: Option<String>,
    /// Schema used when the connection string names none
    pub schema: Option<String>,
    pub row_cap: usize,
    pub logging: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            connection_string: None,
            schema: None,
            row_cap: DEFAULT_ROW_CAP,
            logging: LogSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub json_logs: bool,
    pub filter: Option<String>,
    pub log_dir: Option<PathBuf>,
}

impl Settings {
    /// Load from `path`, or from the default location when `path` is `None`.
    ///
    /// A missing default file yields the defaults; a missing explicit file is
    /// an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (Self::settings_path()?, false),
        };
        if !explicit && !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings from {:?}", path))?;
        Self::from_toml(&content).with_context(|| format!("Failed to parse settings in {:?}", path))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn settings_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not find config directory")?;
        Ok(config_dir.join("tabula").join("settings.toml"))
    }

    /// Flag, then `DB_CONNECTION_STRING`, then this file, then the built-in default
    pub fn connection_string(&self, flag: Option<&str>) -> String {
        match flag.filter(|s| !s.trim().is_empty()) {
            Some(flag) => flag.to_string(),
            None => connection_string_from_env(self.connection_string.as_deref()),
        }
    }
}
