//! Memory sources for the CLI
//!
//! Live processes are read through `process-memory`, dumps through `memmap2`.
//! Both implement [`ptrchain::MemorySource`].

mod dump;
mod maps;
mod process;

pub use dump::DumpFile;
pub use process::ProcessSource;

use crate::cli::TargetArgs;
use anyhow::{bail, Result};
use ptrchain::MemorySource;

/// An opened memory source plus a human-readable name for it
pub struct Target {
    pub source: Box<dyn MemorySource>,
    pub description: String,
}

/// Open whichever target the command line selected
pub fn open_target(target: &TargetArgs) -> Result<Target> {
    if let Some(path) = &target.dump {
        let dump = match &target.maps {
            Some(maps) => DumpFile::open_with_maps(path.as_path(), maps.as_path())?,
            None => DumpFile::open(path)?,
        };
        return Ok(Target {
            description: format!("dump {}", dump.path.display()),
            source: Box::new(dump),
        });
    }

    let process = match (target.pid, &target.name) {
        (Some(pid), _) => ProcessSource::attach(pid)?,
        (None, Some(name)) => ProcessSource::attach_by_name(name)?,
        (None, None) => bail!("No target given. Use --pid, --name or --dump."),
    };

    Ok(Target {
        description: format!("process {}", process.pid),
        source: Box::new(process),
    })
}
