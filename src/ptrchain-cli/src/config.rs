//! Configuration management for the ptrchain CLI

use anyhow::{bail, Context, Result};
use ptrchain::{DEFAULT_MAX_HOPS, DEFAULT_MAX_OFFSET};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_WORD_SIZE: usize = 8;

/// Search defaults used when a flag is not given on the command line
#[derive(Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    pub max_hops: Option<u32>,
    pub max_offset: Option<u32>,
    pub word_size: Option<usize>,
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("ptrchain");

        Ok(config_dir.join("config.toml"))
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, or defaults if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&contents).context("Failed to parse config file")
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory at {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;

        Ok(())
    }

    pub fn max_hops(&self) -> u32 {
        self.max_hops.unwrap_or(DEFAULT_MAX_HOPS)
    }

    pub fn max_offset(&self) -> u32 {
        self.max_offset.unwrap_or(DEFAULT_MAX_OFFSET)
    }

    pub fn word_size(&self) -> usize {
        self.word_size.unwrap_or(DEFAULT_WORD_SIZE)
    }

    pub fn set_word_size(&mut self, word_size: usize) -> Result<()> {
        if word_size != 4 && word_size != 8 {
            bail!("Word size must be 4 or 8, got {}", word_size);
        }
        self.word_size = Some(word_size);
        Ok(())
    }
}
