//! Live Process Memory Source
//!
//! Reads a running process through `process-memory`, with the region list
//! taken from /proc/<pid>/maps.

use super::maps::{is_copyable, parse_maps};
use ptrchain::{MemoryRegion, MemorySource};

use anyhow::{bail, Context, Result};
use process_memory::{CopyAddress, ProcessHandle, TryIntoProcessHandle};
use sysinfo::System;

/// An attached target process
pub struct ProcessSource {
    pub pid: u32,
    handle: ProcessHandle,
    maps: Vec<MemoryRegion>,
}

impl ProcessSource {
    /// Attach to a process by PID and read its memory map
    pub fn attach(pid: u32) -> Result<Self> {
        let handle = (pid as process_memory::Pid)
            .try_into_process_handle()
            .with_context(|| {
                format!(
                    "Failed to attach to process {}. Try running with sudo.",
                    pid
                )
            })?;

        let maps = read_maps(pid)?;
        tracing::debug!("Process {} has {} mapped regions", pid, maps.len());

        Ok(ProcessSource { pid, handle, maps })
    }

    /// Attach to the largest process whose name contains `name`
    pub fn attach_by_name(name: &str) -> Result<Self> {
        let pid = find_process(name)?;
        Self::attach(pid)
    }
}

impl MemorySource for ProcessSource {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; size];
        self.handle
            .copy_address(address as usize, &mut buffer)
            .with_context(|| format!("Failed to read {} bytes at {:#x}", size, address))?;
        Ok(buffer)
    }

    fn regions(&self) -> &[MemoryRegion] {
        &self.maps
    }

    fn readable_regions(&self) -> Vec<&MemoryRegion> {
        self.maps
            .iter()
            .filter(|r| is_copyable(r) && r.size() > 0)
            .collect()
    }
}

/// Find a running process by (partial) name.
///
/// When several match, the one using the most memory wins.
pub fn find_process(name: &str) -> Result<u32> {
    let mut system = System::new_all();
    system.refresh_all();

    let needle = name.to_lowercase();
    let mut candidates: Vec<(u32, u64)> = system
        .processes()
        .values()
        .filter(|p| p.name().to_string_lossy().to_lowercase().contains(&needle))
        .map(|p| (p.pid().as_u32(), p.memory()))
        .collect();

    candidates.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    match candidates.first() {
        Some((pid, memory)) => {
            tracing::info!(
                "Found process '{}': PID {} (memory: {} MB)",
                name,
                pid,
                memory / 1_000_000
            );
            Ok(*pid)
        }
        None => bail!("No running process matches '{}'", name),
    }
}

fn read_maps(pid: u32) -> Result<Vec<MemoryRegion>> {
    let maps_path = format!("/proc/{}/maps", pid);
    let text = std::fs::read_to_string(&maps_path)
        .with_context(|| format!("Failed to read {}. Do you have permission?", maps_path))?;
    Ok(parse_maps(&text))
}
