//! Configuration command handlers
//!
//! Handles the `configure` subcommand for persisting search defaults.

use crate::config::Config;
use anyhow::Result;

/// Handle the configure command
///
/// # Arguments
/// * `max_hops` - New default for `--max-hops`
/// * `max_offset` - New default for `--max-offset`
/// * `word_size` - New default pointer size
/// * `show` - If true, show current configuration
pub fn handle(
    max_hops: Option<u32>,
    max_offset: Option<u32>,
    word_size: Option<usize>,
    show: bool,
) -> Result<()> {
    let mut config = Config::load()?;

    if show {
        show_config(&config);
        return Ok(());
    }

    if apply(&mut config, max_hops, max_offset, word_size)? {
        config.save()?;
        println!("Configuration updated:");
        show_config(&config);
    } else {
        show_usage();
    }

    Ok(())
}

/// Apply the given settings, returning whether anything changed
fn apply(
    config: &mut Config,
    max_hops: Option<u32>,
    max_offset: Option<u32>,
    word_size: Option<usize>,
) -> Result<bool> {
    if max_hops == Some(0) {
        anyhow::bail!("Maximum hops must be at least 1");
    }
    if max_offset == Some(0) {
        anyhow::bail!("Maximum offset must be at least 1");
    }
    if let Some(word_size) = word_size {
        config.set_word_size(word_size)?;
    }

    if max_hops.is_some() {
        config.max_hops = max_hops;
    }
    if max_offset.is_some() {
        config.max_offset = max_offset;
    }

    Ok(max_hops.is_some() || max_offset.is_some() || word_size.is_some())
}

fn show_config(config: &Config) {
    println!("Max hops:   {}", config.max_hops());
    println!("Max offset: {:#x}", config.max_offset());
    println!("Word size:  {}", config.word_size());

    if let Ok(path) = Config::config_path() {
        println!("Config file: {}", path.display());
    }
}

fn show_usage() {
    println!("Usage: ptrchain configure [--max-hops N] [--max-offset N] [--word-size 4|8]");
    println!("   or: ptrchain configure --show");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_nothing() {
        let mut config = Config::default();
        assert!(!apply(&mut config, None, None, None).unwrap());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_apply_updates_only_given_fields() {
        let mut config = Config {
            max_hops: Some(3),
            max_offset: None,
            word_size: Some(4),
        };

        assert!(apply(&mut config, None, Some(0x40), None).unwrap());
        assert_eq!(config.max_hops, Some(3));
        assert_eq!(config.max_offset, Some(0x40));
        assert_eq!(config.word_size, Some(4));
    }

    #[test]
    fn test_apply_rejects_invalid_values() {
        let mut config = Config::default();
        assert!(apply(&mut config, Some(0), None, None).is_err());
        assert!(apply(&mut config, None, Some(0), None).is_err());
        assert!(apply(&mut config, None, None, Some(2)).is_err());
        assert_eq!(config, Config::default());
    }
}
