//! Search configuration: seed ranges and bounds.

use crate::error::{ChainError, Result};
use serde::Serialize;
use std::fmt;

/// Default maximum number of pointer dereferences in a chain
pub const DEFAULT_MAX_HOPS: u32 = 5;

/// Default maximum offset per hop in bytes
pub const DEFAULT_MAX_OFFSET: u32 = 0x1000;

/// Half-open address interval `[min, max)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AddressRange {
    pub min: u64,
    pub max: u64,
}

impl AddressRange {
    pub fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    /// Range covering exactly one word starting at `address`
    pub fn single(address: u64, word_size: usize) -> Self {
        Self {
            min: address,
            max: address.saturating_add(word_size as u64),
        }
    }

    /// Parse `"START-END"` or a single `"ADDRESS"` (hex, `0x` optional).
    ///
    /// A single address becomes a one-word range.
    pub fn parse(input: &str, word_size: usize) -> Result<Self> {
        let invalid = |reason: &str| ChainError::InvalidRange {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let range = match input.split_once('-') {
            Some((min, max)) => {
                let min = parse_hex(min).ok_or_else(|| invalid("bad start address"))?;
                let max = parse_hex(max).ok_or_else(|| invalid("bad end address"))?;
                Self::new(min, max)
            }
            None => {
                let address = parse_hex(input).ok_or_else(|| invalid("bad address"))?;
                let max = address
                    .checked_add(word_size as u64)
                    .ok_or_else(|| invalid("address overflows"))?;
                Self::new(address, max)
            }
        };

        if range.is_empty() {
            return Err(invalid("range is empty"));
        }
        Ok(range)
    }

    pub fn contains(&self, address: u64) -> bool {
        address >= self.min && address < self.max
    }

    pub fn is_empty(&self) -> bool {
        self.min >= self.max
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}-{:#x}", self.min, self.max)
    }
}

fn parse_hex(s: &str) -> Option<u64> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

/// Parameters for one pointer chain search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Where chains start (hop 0)
    pub start: AddressRange,
    /// Where chains must end
    pub goal: AddressRange,
    /// Maximum pointer dereferences per chain; also the number of rounds
    pub max_hops: u32,
    /// Maximum offset accumulated within a single hop, in bytes
    pub max_offset: u32,
}

impl SearchConfig {
    pub fn new(start: AddressRange, goal: AddressRange) -> Self {
        Self {
            start,
            goal,
            max_hops: DEFAULT_MAX_HOPS,
            max_offset: DEFAULT_MAX_OFFSET,
        }
    }

    pub fn with_hops(mut self, max_hops: u32) -> Self {
        self.max_hops = max_hops;
        self
    }

    pub fn with_offset(mut self, max_offset: u32) -> Self {
        self.max_offset = max_offset;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_hops == 0 {
            return Err(ChainError::InvalidConfig(
                "max_hops must be at least 1".to_string(),
            ));
        }
        if self.max_offset == 0 {
            return Err(ChainError::InvalidConfig(
                "max_offset must be at least 1".to_string(),
            ));
        }
        for (name, range) in [("start", &self.start), ("goal", &self.goal)] {
            if range.is_empty() {
                return Err(ChainError::InvalidConfig(format!(
                    "{} range {} is empty",
                    name, range
                )));
            }
        }
        Ok(())
    }
}
