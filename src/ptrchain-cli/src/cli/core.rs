//! Core CLI definitions

use clap::{Parser, Subcommand};

use super::target::TargetArgs;

#[derive(Parser)]
#[command(name = "ptrchain")]
#[command(about = "Find pointer chains between address ranges of a process", long_about = None)]
pub struct Cli {
    /// Show per-round progress (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search for pointer chains from a start range to a goal range
    #[command(visible_alias = "s")]
    Search {
        #[command(flatten)]
        target: TargetArgs,

        /// Start address or range (hex, "START-END" or "ADDRESS")
        start: String,

        /// Goal address or range (hex, "START-END" or "ADDRESS")
        goal: String,

        /// Maximum pointer dereferences per chain (uses configured default if not provided)
        #[arg(long)]
        max_hops: Option<u32>,

        /// Maximum offset per hop in bytes, decimal or 0x hex (uses configured default if not provided)
        #[arg(long, value_parser = parse_number)]
        max_offset: Option<u32>,

        /// Pointer size of the target in bytes (4 or 8)
        #[arg(long)]
        word_size: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the readable regions of a process or dump
    #[command(visible_alias = "r")]
    Regions {
        #[command(flatten)]
        target: TargetArgs,

        /// Capture the regions and count words and pointers
        #[arg(short, long)]
        analyze: bool,

        /// Pointer size used when analyzing (4 or 8)
        #[arg(long)]
        word_size: Option<usize>,
    },

    /// Configure default settings
    #[command(visible_alias = "c")]
    Configure {
        /// Set default maximum hops
        #[arg(long)]
        max_hops: Option<u32>,

        /// Set default maximum offset in bytes, decimal or 0x hex
        #[arg(long, value_parser = parse_number)]
        max_offset: Option<u32>,

        /// Set default word size (4 or 8)
        #[arg(long)]
        word_size: Option<usize>,

        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

/// Parse a decimal or `0x`-prefixed hex number
pub fn parse_number(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse::<u32>(),
    };
    parsed.map_err(|e| format!("invalid number '{}': {}", s, e))
}
