//! Per-word search state laid over a snapshot.
//!
//! The snapshot stays immutable; everything the search learns lives here,
//! one [`WordLabel`] per captured word, grouped by region so each region's
//! labels can be handed to a separate worker.

use crate::config::AddressRange;
use crate::index::WordRef;
use crate::snapshot::Snapshot;

/// Reachability state of a single word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Label {
    #[default]
    Unvisited,
    /// Reachable from the start range with `hops` dereferences plus `offset`
    /// bytes past the last dereferenced pointer
    Reachable { hops: u32, offset: u32 },
    /// Part of the goal range, not reached yet
    GoalPending,
    /// Goal word whose path has been reported. Frozen.
    GoalReported { hops: u32, offset: u32 },
}

impl Label {
    /// Position in the relaxation order. Lower is better; `None` is frozen.
    fn rank(&self) -> Option<u64> {
        match *self {
            Label::Reachable { hops, .. } => Some(hops as u64),
            Label::GoalPending => Some(u32::MAX as u64 + 1),
            Label::Unvisited => Some(u32::MAX as u64 + 2),
            Label::GoalReported { .. } => None,
        }
    }

    /// True if a label with `hops` would strictly improve on this one.
    pub fn improves_with(&self, hops: u32) -> bool {
        self.rank().is_some_and(|rank| rank > hops as u64)
    }

    /// `(hops, offset)` if this word may act as a relaxation source
    pub fn as_source(&self) -> Option<(u32, u32)> {
        match *self {
            Label::Reachable { hops, offset } => Some((hops, offset)),
            _ => None,
        }
    }

    pub fn hops(&self) -> Option<u32> {
        match *self {
            Label::Reachable { hops, .. } | Label::GoalReported { hops, .. } => Some(hops),
            _ => None,
        }
    }

    pub fn offset(&self) -> Option<u32> {
        match *self {
            Label::Reachable { offset, .. } | Label::GoalReported { offset, .. } => Some(offset),
            _ => None,
        }
    }

    pub fn is_goal_pending(&self) -> bool {
        matches!(self, Label::GoalPending)
    }

    /// Label a word takes when reached with `hops`/`offset`.
    ///
    /// A pending goal turns into a reported goal; anything else becomes
    /// plainly reachable.
    pub fn reached(&self, hops: u32, offset: u32) -> Label {
        if self.is_goal_pending() {
            Label::GoalReported { hops, offset }
        } else {
            Label::Reachable { hops, offset }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WordLabel {
    pub label: Label,
    /// Word whose pointer produced the current hop count
    pub reverse_ref: Option<WordRef>,
}

#[derive(Debug, Clone)]
pub struct LabelStore {
    regions: Vec<Vec<WordLabel>>,
}

impl LabelStore {
    /// Fresh store with every word unvisited
    pub fn new(snapshot: &Snapshot) -> Self {
        Self {
            regions: snapshot
                .regions()
                .iter()
                .map(|r| vec![WordLabel::default(); r.words.len()])
                .collect(),
        }
    }

    pub fn get(&self, word: WordRef) -> &WordLabel {
        &self.regions[word.region][word.index]
    }

    pub fn get_mut(&mut self, word: WordRef) -> &mut WordLabel {
        &mut self.regions[word.region][word.index]
    }

    pub fn region(&self, id: usize) -> &[WordLabel] {
        &self.regions[id]
    }

    pub(crate) fn regions_mut(&mut self) -> &mut [Vec<WordLabel>] {
        &mut self.regions
    }

    /// Set `label` on every word whose address lies in `[range.min, range.max)`.
    ///
    /// A word that starts before `range.min` is left alone even if it
    /// overlaps the range. Returns the number of words touched.
    pub fn mark_range(&mut self, snapshot: &Snapshot, range: AddressRange, label: Label) -> usize {
        let word_size = snapshot.word_size() as u64;
        let mut touched = 0;

        for region in snapshot.regions() {
            if region.base_address >= range.max || region.end_address() <= range.min {
                continue;
            }

            let start = range.min.max(region.base_address) - region.base_address;
            let end = range.max.min(region.end_address()) - region.base_address;
            let first = start.div_ceil(word_size);
            let last = end.div_ceil(word_size).min(region.words.len() as u64);
            if first >= last {
                continue;
            }

            for slot in &mut self.regions[region.id][first as usize..last as usize] {
                slot.label = label;
                touched += 1;
            }
        }

        touched
    }

    /// Words currently in the reported-goal state
    pub fn reported_goals(&self) -> usize {
        self.regions
            .iter()
            .flatten()
            .filter(|w| matches!(w.label, Label::GoalReported { .. }))
            .count()
    }
}
