//! Memory Source Trait
//!
//! Core abstraction for reading memory from various sources.

use super::MemoryRegion;
use anyhow::Result;

/// Trait for reading memory from a live process, a dump file, or a mock.
pub trait MemorySource {
    /// Read bytes from a virtual address
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>>;

    /// Get the list of memory regions
    fn regions(&self) -> &[MemoryRegion];

    /// Regions worth capturing: readable and non-empty
    fn readable_regions(&self) -> Vec<&MemoryRegion> {
        self.regions()
            .iter()
            .filter(|r| r.is_readable() && r.size() > 0)
            .collect()
    }

    /// Find a region containing the given address
    fn find_region(&self, address: u64) -> Option<&MemoryRegion> {
        self.regions().iter().find(|r| r.contains(address))
    }
}
