//! Search command handler

use crate::cli::TargetArgs;
use crate::config::Config;
use crate::source::open_target;

use anyhow::{Context, Result};
use ptrchain::{
    search_with, AddressRange, ChainPath, MemorySource, SearchConfig, SearchOutcome, Snapshot,
};
use serde::Serialize;

/// Options for one search, after config defaults are applied
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub start: String,
    pub goal: String,
    pub max_hops: Option<u32>,
    pub max_offset: Option<u32>,
    pub word_size: Option<usize>,
    pub json: bool,
}

#[derive(Serialize)]
struct SearchReport<'a> {
    start: AddressRange,
    goal: AddressRange,
    max_hops: u32,
    max_offset: u32,
    word_size: usize,
    rounds_completed: u32,
    converged: bool,
    paths: &'a [ChainPath],
}

/// Handle the search command
pub fn handle(target: &TargetArgs, options: SearchOptions) -> Result<()> {
    let config = Config::load()?;
    let opened = open_target(target)?;
    tracing::info!("Searching {}", opened.description);

    let stream = !options.json;
    let (search_config, word_size, outcome) =
        run(opened.source.as_ref(), &config, &options, |path| {
            if stream {
                println!("\nGoal reached:\n{}", path);
            }
        })?;

    if options.json {
        let report = SearchReport {
            start: search_config.start,
            goal: search_config.goal,
            max_hops: search_config.max_hops,
            max_offset: search_config.max_offset,
            word_size,
            rounds_completed: outcome.rounds_completed,
            converged: outcome.converged,
            paths: &outcome.paths,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if outcome.is_empty() {
        println!("No pointer chains found");
    } else {
        println!();
        println!(
            "Found {} chain(s) in {} round(s)",
            outcome.paths.len(),
            outcome.rounds_completed
        );
    }

    Ok(())
}

/// Capture `source` and run the search, calling `on_path` for each chain
fn run<F>(
    source: &dyn MemorySource,
    config: &Config,
    options: &SearchOptions,
    on_path: F,
) -> Result<(SearchConfig, usize, SearchOutcome)>
where
    F: FnMut(&ChainPath),
{
    let word_size = options.word_size.unwrap_or_else(|| config.word_size());

    let start = AddressRange::parse(&options.start, word_size).context("Invalid start range")?;
    let goal = AddressRange::parse(&options.goal, word_size).context("Invalid goal range")?;
    let search_config = SearchConfig::new(start, goal)
        .with_hops(options.max_hops.unwrap_or_else(|| config.max_hops()))
        .with_offset(options.max_offset.unwrap_or_else(|| config.max_offset()));
    search_config.validate()?;

    let snapshot = Snapshot::capture(source, word_size)?;
    let outcome = search_with(&snapshot, &search_config, on_path)?;

    Ok((search_config, word_size, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptrchain::{ChainError, MockMemorySource, RangeKind};

    fn options(start: &str, goal: &str) -> SearchOptions {
        SearchOptions {
            start: start.to_string(),
            goal: goal.to_string(),
            max_hops: None,
            max_offset: None,
            word_size: None,
            json: false,
        }
    }

    fn chain_source() -> MockMemorySource {
        MockMemorySource::new()
            .with_words(0x1000, &[0x2004])
            .with_words(0x2000, &[0x3000, 0x4141414141414141])
            .with_words(0x3000, &[0xdead])
    }

    #[test]
    fn test_run_uses_config_defaults() {
        let config = Config {
            max_hops: Some(3),
            max_offset: Some(0x10),
            word_size: None,
        };

        let mut streamed = Vec::new();
        let (search_config, word_size, outcome) = run(
            &chain_source(),
            &config,
            &options("0x1000", "0x3000"),
            |path| streamed.push(path.to_string()),
        )
        .unwrap();

        assert_eq!(search_config.max_hops, 3);
        assert_eq!(search_config.max_offset, 0x10);
        assert_eq!(word_size, 8);
        assert_eq!(outcome.paths.len(), 1);
        assert_eq!(streamed, vec![outcome.paths[0].to_string()]);
    }

    #[test]
    fn test_flags_override_config() {
        let config = Config {
            max_hops: Some(1),
            max_offset: Some(0x10),
            word_size: None,
        };
        let mut opts = options("0x1000-0x1008", "0x3000-0x3008");

        let (_, _, outcome) = run(&chain_source(), &config, &opts, |_| {}).unwrap();
        assert!(outcome.is_empty());

        opts.max_hops = Some(2);
        let (_, _, outcome) = run(&chain_source(), &config, &opts, |_| {}).unwrap();
        assert_eq!(outcome.paths.len(), 1);
        assert_eq!(outcome.paths[0].hops(), 2);
    }

    #[test]
    fn test_unmapped_goal_is_reported() {
        let err = run(
            &chain_source(),
            &Config::default(),
            &options("0x1000", "0x9000"),
            |_| {},
        )
        .unwrap_err();

        let chain_error = err.downcast_ref::<ChainError>().unwrap();
        assert!(matches!(
            chain_error,
            ChainError::RangeNotMapped {
                kind: RangeKind::Goal,
                ..
            }
        ));
    }

    #[test]
    fn test_bad_range_is_rejected() {
        let result = run(
            &chain_source(),
            &Config::default(),
            &options("0x2000-0x1000", "0x3000"),
            |_| {},
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_report_serializes_paths() {
        let (search_config, word_size, outcome) = run(
            &chain_source(),
            &Config::default(),
            &options("0x1000", "0x3000"),
            |_| {},
        )
        .unwrap();

        let report = SearchReport {
            start: search_config.start,
            goal: search_config.goal,
            max_hops: search_config.max_hops,
            max_offset: search_config.max_offset,
            word_size,
            rounds_completed: outcome.rounds_completed,
            converged: outcome.converged,
            paths: &outcome.paths,
        };
        let json: serde_json::Value = serde_json::to_value(&report).unwrap();

        assert_eq!(json["start"]["min"], 0x1000);
        assert_eq!(json["paths"].as_array().unwrap().len(), 1);
        assert_eq!(json["paths"][0]["steps"][1]["base_address"], 0x2000);
    }
}
