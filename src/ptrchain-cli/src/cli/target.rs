//! Target selection shared by every command that reads memory

use clap::{ArgGroup, Args};
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
#[command(group(
    ArgGroup::new("target")
        .required(true)
        .multiple(false)
        .args(["pid", "name", "dump"]),
))]
pub struct TargetArgs {
    /// Process ID to read
    #[arg(short, long)]
    pub pid: Option<u32>,

    /// Process name to search for (largest matching process wins)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Memory dump file (minidump, or raw with a region list)
    #[arg(short, long)]
    pub dump: Option<PathBuf>,

    /// Region list for a raw dump (default: <dump>.maps)
    #[arg(long, requires = "dump")]
    pub maps: Option<PathBuf>,
}
