//! Session configuration
//!
//! TOML-loadable settings for a session:
//!
//! ```toml
//! # Shell command (optional; platform default when absent)
//! shell = "/bin/zsh"
//!
//! # Initial working directory (falls back to the platform default
//! # when absent or invalid)
//! working_dir = "/home/user/project"
//!
//! # Scrollback lines retained (0 disables scrollback)
//! scrollback_limit = 1000
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_SCROLLBACK: usize = 1000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shell command; platform default when `None`.
    pub shell: Option<String>,
    /// Initial working directory for the shell.
    pub working_dir: Option<PathBuf>,
    /// Maximum scrollback lines; oldest are evicted first.
    pub scrollback_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: None,
            working_dir: None,
            scrollback_limit: DEFAULT_SCROLLBACK,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}
