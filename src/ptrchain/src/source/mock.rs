//! Mock Memory Source
//!
//! A synthetic address space for tests and offline experiments.

use super::{MemoryRegion, MemorySource};
use anyhow::{bail, Result};

/// A mock memory source made of independent regions
#[derive(Debug, Default, Clone)]
pub struct MockMemorySource {
    /// Region descriptors, in insertion order
    pub regions: Vec<MemoryRegion>,
    /// Backing bytes for each entry in `regions`
    pub data: Vec<Vec<u8>>,
    /// Region start addresses whose reads should fail
    pub failing: Vec<u64>,
}

impl MockMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an anonymous read-write region backed by `data`
    pub fn with_bytes(self, base_address: u64, data: Vec<u8>) -> Self {
        let end = base_address + data.len() as u64;
        self.with_region(MemoryRegion::anonymous(base_address, end), data)
    }

    /// Add a region of little-endian 64-bit words
    pub fn with_words(self, base_address: u64, words: &[u64]) -> Self {
        let data = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        self.with_bytes(base_address, data)
    }

    /// Add a region with explicit metadata
    pub fn with_region(mut self, region: MemoryRegion, data: Vec<u8>) -> Self {
        self.regions.push(region);
        self.data.push(data);
        self
    }

    /// Make every read from the region starting at `base_address` fail
    pub fn failing_at(mut self, base_address: u64) -> Self {
        self.failing.push(base_address);
        self
    }
}

impl MemorySource for MockMemorySource {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let Some(index) = self.regions.iter().position(|r| r.contains(address)) else {
            bail!("Address {:#x} is not mapped", address);
        };

        let region = &self.regions[index];
        if self.failing.contains(&region.start) {
            bail!("Simulated read failure at {:#x}", address);
        }

        let offset = (address - region.start) as usize;
        let data = &self.data[index];
        if offset + size > data.len() {
            bail!(
                "Read of {} bytes at {:#x} exceeds region data size {}",
                size,
                address,
                data.len()
            );
        }

        Ok(data[offset..offset + size].to_vec())
    }

    fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }
}
