//! Regions command handler
//!
//! Lists what a search would capture and, with `--analyze`, captures it.

use crate::cli::TargetArgs;
use crate::config::Config;
use crate::source::open_target;

use anyhow::Result;
use ptrchain::{MemoryRegion, MemorySource, Snapshot};

pub fn handle(target: &TargetArgs, analyze: bool, word_size: Option<usize>) -> Result<()> {
    let opened = open_target(target)?;
    let source = opened.source.as_ref();

    let regions = source.readable_regions();
    println!("Readable regions of {}:", opened.description);
    for region in &regions {
        println!("  {}", format_region(region));
    }

    let total: u64 = regions.iter().map(|r| r.size()).sum();
    println!(
        "{} regions, {:.1} MB total",
        regions.len(),
        total as f64 / 1_000_000.0
    );

    if analyze {
        let word_size = match word_size {
            Some(word_size) => word_size,
            None => Config::load()?.word_size(),
        };
        println!("{}", analyze_source(source, word_size)?);
    }

    Ok(())
}

fn format_region(region: &MemoryRegion) -> String {
    format!(
        "{:#014x}-{:#014x} {} {:>10} {}",
        region.start,
        region.end,
        region.perms,
        region.size(),
        region.path.as_deref().unwrap_or("")
    )
    .trim_end()
    .to_string()
}

/// Capture the source and summarize it in one line
fn analyze_source(source: &dyn MemorySource, word_size: usize) -> Result<String> {
    let snapshot = Snapshot::capture(source, word_size)?;
    Ok(format!(
        "Scanned {} memory locations, found {} pointers",
        snapshot.word_count(),
        snapshot.pointer_count()
    ))
}
