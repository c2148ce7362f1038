//! JSON dotfile holding the database path and the currently logged-in user.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

const CONFIG_FILE: &str = ".heron.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub db_path: String,
    pub current_user_name: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: "heron.db".to_string(),
            current_user_name: None,
        }
    }
}

impl Config {
    /// Resolve the config file location: `$HERON_CONFIG` if set, otherwise
    /// `$HOME/.heron.json`.
    pub fn path() -> Result<PathBuf> {
        if let Ok(path) = env::var("HERON_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        let home = env::var("HOME").context("HOME is not set; set HERON_CONFIG instead")?;
        Ok(PathBuf::from(home).join(CONFIG_FILE))
    }

    /// Read the config file, creating it with defaults if missing.
    pub fn read() -> Result<Self> {
        let path = Self::path()?;
        if !path.exists() {
            let config = Config::default();
            config.write()?;
            return Ok(config);
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&contents)
            .with_context(|| format!("malformed config file {}", path.display()))?;
        Ok(config)
    }

    pub fn write(&self) -> Result<()> {
        let path = Self::path()?;
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(&path, contents)
            .with_context(|| format!("failed to write config file {}", path.display()))?;
        Ok(())
    }

    pub fn set_user(&mut self, name: &str) -> Result<()> {
        self.current_user_name = Some(name.to_string());
        self.write()
    }
}
