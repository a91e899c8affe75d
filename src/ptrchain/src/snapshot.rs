//! Address space snapshot
//!
//! An immutable copy of every readable region of a target, decoded into
//! pointer-sized words. Each word's candidate pointer edge is resolved once
//! here; the search only ever reads this structure.

use crate::error::{ChainError, Result};
use crate::index::{RegionIndex, WordRef};
use crate::source::MemorySource;
use byteorder::{ByteOrder, LE};
use tracing::{debug, info};

/// One pointer-sized slot captured from the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    /// Absolute address of the slot at capture time
    pub address: u64,
    /// Little-endian value read from the slot
    pub value: u64,
    /// Word the value points into, when it lands inside a captured region
    pub pointer_target: Option<WordRef>,
}

/// A contiguous captured region
#[derive(Debug, Clone)]
pub struct Region {
    pub id: usize,
    pub base_address: u64,
    pub size: u64,
    pub words: Vec<Word>,
}

impl Region {
    pub fn end_address(&self) -> u64 {
        self.base_address + self.size
    }
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    regions: Vec<Region>,
    index: RegionIndex,
    word_size: usize,
    pointer_count: usize,
}

impl Snapshot {
    /// Capture every readable region of `source`.
    ///
    /// Any failed or short read aborts the capture: a partial picture would
    /// silently produce wrong reachability results.
    pub fn capture(source: &dyn MemorySource, word_size: usize) -> Result<Self> {
        check_word_size(word_size)?;

        let readable = source.readable_regions();
        if readable.is_empty() {
            return Err(ChainError::acquisition("no readable regions"));
        }

        let mut raw = Vec::with_capacity(readable.len());
        for region in readable {
            let size = usize::try_from(region.size()).map_err(|_| {
                ChainError::acquisition(format!(
                    "region {:#x}-{:#x} is too large to capture",
                    region.start, region.end
                ))
            })?;

            let bytes = source.read_bytes(region.start, size).map_err(|e| {
                ChainError::acquisition(format!(
                    "failed to read {:#x}-{:#x}: {:#}",
                    region.start, region.end, e
                ))
            })?;

            if bytes.len() != size {
                return Err(ChainError::acquisition(format!(
                    "short read at {:#x}: got {} of {} bytes",
                    region.start,
                    bytes.len(),
                    size
                )));
            }

            raw.push((region.start, bytes));
        }

        let snapshot = Self::from_regions(raw, word_size)?;
        info!(
            "Captured {} regions, {} words, {} pointers",
            snapshot.regions.len(),
            snapshot.word_count(),
            snapshot.pointer_count
        );
        Ok(snapshot)
    }

    /// Build a snapshot from `(base_address, bytes)` pairs in any order.
    pub fn from_regions(mut raw: Vec<(u64, Vec<u8>)>, word_size: usize) -> Result<Self> {
        check_word_size(word_size)?;

        if raw.is_empty() {
            return Err(ChainError::acquisition("no readable regions"));
        }

        raw.sort_by_key(|(base, _)| *base);

        for pair in raw.windows(2) {
            let (base, bytes) = &pair[0];
            let end = base + bytes.len() as u64;
            if end > pair[1].0 {
                return Err(ChainError::acquisition(format!(
                    "regions {:#x}-{:#x} and {:#x} overlap",
                    base, end, pair[1].0
                )));
            }
        }

        let index = RegionIndex::new(
            raw.iter().map(|(base, bytes)| (*base, bytes.len() as u64)),
            word_size,
        );

        let regions: Vec<Region> = raw
            .iter()
            .enumerate()
            .map(|(id, (base, bytes))| {
                let words: Vec<Word> = bytes
                    .chunks_exact(word_size)
                    .enumerate()
                    .map(|(i, chunk)| {
                        let value = decode_word(chunk);
                        Word {
                            address: base + (i * word_size) as u64,
                            value,
                            pointer_target: index.find_word(value),
                        }
                    })
                    .collect();

                Region {
                    id,
                    base_address: *base,
                    size: bytes.len() as u64,
                    words,
                }
            })
            .collect();

        let pointer_count = regions
            .iter()
            .flat_map(|r| &r.words)
            .filter(|w| w.pointer_target.is_some())
            .count();

        debug!(
            "Snapshot spans {:#x}-{:#x} across {} regions",
            index.min_address(),
            index.max_address(),
            regions.len()
        );

        Ok(Self {
            regions,
            index,
            word_size,
            pointer_count,
        })
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region(&self, id: usize) -> &Region {
        &self.regions[id]
    }

    pub fn word(&self, word: WordRef) -> &Word {
        &self.regions[word.region].words[word.index]
    }

    pub fn index(&self) -> &RegionIndex {
        &self.index
    }

    pub fn word_size(&self) -> usize {
        self.word_size
    }

    pub fn min_address(&self) -> u64 {
        self.index.min_address()
    }

    /// One past the highest captured address
    pub fn max_address(&self) -> u64 {
        self.index.max_address()
    }

    /// Total number of captured words
    pub fn word_count(&self) -> usize {
        self.regions.iter().map(|r| r.words.len()).sum()
    }

    /// Number of words whose value lands inside a captured region
    pub fn pointer_count(&self) -> usize {
        self.pointer_count
    }

    pub fn find_word(&self, address: u64) -> Option<WordRef> {
        self.index.find_word(address)
    }

    /// Value of the word starting exactly at `address`
    pub fn read_word(&self, address: u64) -> Option<u64> {
        let word = self.word(self.find_word(address)?);
        (word.address == address).then_some(word.value)
    }
}

fn check_word_size(word_size: usize) -> Result<()> {
    match word_size {
        4 | 8 => Ok(()),
        other => Err(ChainError::InvalidConfig(format!(
            "word size must be 4 or 8 bytes, got {}",
            other
        ))),
    }
}

fn decode_word(chunk: &[u8]) -> u64 {
    match chunk.len() {
        4 => LE::read_u32(chunk) as u64,
        _ => LE::read_u64(chunk),
    }
}
