// ⚙️ Configuration - where the data comes from and how hard we try
//
// Optional TOML file; every key has a default. CLI flags override on top.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "people-filter.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding persons.json and filters.json
    pub data_dir: PathBuf,

    /// HTTP base URL; when set it is used instead of `data_dir`
    pub base_url: Option<String>,

    /// Retry a failed fetch once
    pub retry: bool,

    /// Fixed delay before the single retry
    pub retry_delay_secs: u64,

    /// Per-request timeout
    pub request_timeout_secs: u64,

    /// Server listen address
    pub bind: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("data"),
            base_url: None,
            retry: true,
            retry_delay_secs: 5,
            request_timeout_secs: 10,
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Config {
    /// Parse a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config TOML")
    }

    /// Load from an explicit path; the file must exist
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Config::from_toml(&content)
    }

    /// Load `explicit` if given, else the default file if present, else defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Config::from_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Config::from_file(default_path)
                } else {
                    Ok(Config::default())
                }
            }
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
