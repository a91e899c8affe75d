//! Address lookup over the sorted snapshot regions.

use serde::Serialize;

/// Stable handle to one word of the snapshot: region id plus word index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WordRef {
    pub region: usize,
    pub index: usize,
}

impl WordRef {
    pub fn new(region: usize, index: usize) -> Self {
        Self { region, index }
    }
}

#[derive(Debug, Clone, Copy)]
struct Span {
    base: u64,
    end: u64,
    words: usize,
}

/// Binary-search index over region spans.
///
/// Spans must be sorted by base address and must not overlap; the snapshot
/// builder guarantees both before constructing the index.
#[derive(Debug, Clone)]
pub struct RegionIndex {
    spans: Vec<Span>,
    word_size: usize,
    min_address: u64,
    max_address: u64,
}

impl RegionIndex {
    /// Build from `(base, size)` pairs already sorted by base.
    pub fn new(spans: impl IntoIterator<Item = (u64, u64)>, word_size: usize) -> Self {
        let spans: Vec<Span> = spans
            .into_iter()
            .map(|(base, size)| Span {
                base,
                end: base + size,
                words: (size / word_size as u64) as usize,
            })
            .collect();

        let min_address = spans.first().map(|s| s.base).unwrap_or(0);
        let max_address = spans.last().map(|s| s.end).unwrap_or(0);

        Self {
            spans,
            word_size,
            min_address,
            max_address,
        }
    }

    /// Lowest captured address
    pub fn min_address(&self) -> u64 {
        self.min_address
    }

    /// One past the highest captured address
    pub fn max_address(&self) -> u64 {
        self.max_address
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Id of the region containing `address`, if any.
    pub fn find_region(&self, address: u64) -> Option<usize> {
        if address < self.min_address || address >= self.max_address {
            return None;
        }

        let candidate = self.spans.partition_point(|s| s.base <= address);
        let id = candidate.checked_sub(1)?;
        (address < self.spans[id].end).then_some(id)
    }

    /// The word containing `address`.
    ///
    /// Unaligned addresses resolve to the word they fall inside. Bytes past
    /// the last whole word of a region resolve to nothing.
    pub fn find_word(&self, address: u64) -> Option<WordRef> {
        let region = self.find_region(address)?;
        let span = &self.spans[region];
        let index = ((address - span.base) / self.word_size as u64) as usize;
        (index < span.words).then_some(WordRef::new(region, index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> RegionIndex {
        RegionIndex::new([(0x1000, 0x10), (0x2000, 0x14), (0x4000, 0x8)], 8)
    }

    #[test]
    fn test_bounds() {
        let index = index();
        assert_eq!(index.min_address(), 0x1000);
        assert_eq!(index.max_address(), 0x4008);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_find_region_hits_each_region() {
        let index = index();
        assert_eq!(index.find_region(0x1000), Some(0));
        assert_eq!(index.find_region(0x100f), Some(0));
        assert_eq!(index.find_region(0x2013), Some(1));
        assert_eq!(index.find_region(0x4007), Some(2));
    }

    #[test]
    fn test_find_region_misses_gaps_and_outside() {
        let index = index();
        assert_eq!(index.find_region(0xfff), None);
        assert_eq!(index.find_region(0x1010), None);
        assert_eq!(index.find_region(0x3000), None);
        assert_eq!(index.find_region(0x4008), None);
        assert_eq!(index.find_region(u64::MAX), None);
    }

    #[test]
    fn test_find_word_rounds_down_unaligned() {
        let index = index();
        assert_eq!(index.find_word(0x2000), Some(WordRef::new(1, 0)));
        assert_eq!(index.find_word(0x2004), Some(WordRef::new(1, 0)));
        assert_eq!(index.find_word(0x2008), Some(WordRef::new(1, 1)));
    }

    #[test]
    fn test_find_word_ignores_trailing_partial_word() {
        // 0x14 bytes hold two whole words; 0x2010..0x2014 is a partial tail
        let index = index();
        assert_eq!(index.find_region(0x2010), Some(1));
        assert_eq!(index.find_word(0x2010), None);
    }

    #[test]
    fn test_empty_index() {
        let index = RegionIndex::new(Vec::new(), 8);
        assert!(index.is_empty());
        assert_eq!(index.find_region(0), None);
    }
}
