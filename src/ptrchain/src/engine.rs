//! Round-based reachability propagation.
//!
//! Every round runs two relaxation passes over the label store:
//!
//! 1. **Offsets**: inside each region, a reachable word lends its hop count
//!    to its right-hand neighbour at one extra word of offset, up to the
//!    configured `max_offset`. Regions are independent here, so the pass runs
//!    on the rayon pool with one task per region.
//! 2. **Pointers**: every reachable word holding a captured pointer lends
//!    `hops + 1` (offset reset to 0) to the word the pointer lands in, and
//!    records itself as that word's back-reference. Sources are taken from
//!    the labels left by the offset pass, so each round adds exactly one hop.
//!    This pass writes across regions and runs sequentially in address order.
//!
//! Relaxation only ever happens on a strict improvement, so the first
//! relaxation in scan order wins ties. A pending goal word that gets
//! relaxed is frozen as reported and its chain is emitted immediately
//! (pointer pass) or right after the pass completes (offset pass).

use crate::config::SearchConfig;
use crate::error::{ChainError, RangeKind, Result};
use crate::index::WordRef;
use crate::labels::{Label, LabelStore, WordLabel};
use crate::path::{reconstruct, ChainPath};
use crate::snapshot::Snapshot;
use rayon::prelude::*;
use tracing::{debug, info, warn};

/// Result of a completed search.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    /// Paths in the order they were discovered
    pub paths: Vec<ChainPath>,
    /// Rounds actually executed
    pub rounds_completed: u32,
    /// True if the labels stopped changing before the round bound
    pub converged: bool,
}

impl SearchOutcome {
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Counters for a single round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundStats {
    pub round: u32,
    pub offset_relaxations: usize,
    pub pointer_relaxations: usize,
    pub paths_found: usize,
}

impl RoundStats {
    pub fn is_quiet(&self) -> bool {
        self.offset_relaxations == 0 && self.pointer_relaxations == 0
    }
}

pub struct PropagationEngine<'a> {
    snapshot: &'a Snapshot,
    labels: LabelStore,
    max_hops: u32,
    max_offset: u32,
    rounds: u32,
}

impl<'a> PropagationEngine<'a> {
    /// Seed the label store from `config`.
    ///
    /// Fails if either range misses every captured word.
    pub fn new(snapshot: &'a Snapshot, config: &SearchConfig) -> Result<Self> {
        config.validate()?;

        let mut labels = LabelStore::new(snapshot);

        let start_words = labels.mark_range(
            snapshot,
            config.start,
            Label::Reachable { hops: 0, offset: 0 },
        );
        if start_words == 0 {
            return Err(ChainError::RangeNotMapped {
                kind: RangeKind::Start,
                range: config.start,
            });
        }

        let goal_words = labels.mark_range(snapshot, config.goal, Label::GoalPending);
        if goal_words == 0 {
            return Err(ChainError::RangeNotMapped {
                kind: RangeKind::Goal,
                range: config.goal,
            });
        }

        info!(
            "Seeded {} start words in {} and {} goal words in {}",
            start_words, config.start, goal_words, config.goal
        );

        Ok(Self {
            snapshot,
            labels,
            max_hops: config.max_hops,
            max_offset: config.max_offset,
            rounds: 0,
        })
    }

    pub fn labels(&self) -> &LabelStore {
        &self.labels
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Run rounds until the hop bound is reached or nothing changes.
    ///
    /// Round *k* relaxes exactly the words that are *k* pointer hops from the
    /// start. When the bound is hit first, one more offset pass runs so goals
    /// that sit at an offset from a last-round word are still reported.
    ///
    /// Returns whether the labels converged early.
    pub fn run(&mut self, on_path: &mut dyn FnMut(ChainPath)) -> bool {
        while self.rounds < self.max_hops {
            let stats = self.run_round(on_path);
            if stats.is_quiet() {
                debug!("Labels converged after round {}", stats.round);
                return true;
            }
        }

        self.settle_offsets(on_path);
        false
    }

    /// Run one offset pass followed by one pointer pass.
    pub fn run_round(&mut self, on_path: &mut dyn FnMut(ChainPath)) -> RoundStats {
        self.rounds += 1;
        let mut stats = RoundStats {
            round: self.rounds,
            ..RoundStats::default()
        };

        let (offset_relaxations, goals) = self.propagate_offsets();
        stats.offset_relaxations = offset_relaxations;
        for goal in goals {
            if self.report(goal, on_path) {
                stats.paths_found += 1;
            }
        }

        let (pointer_relaxations, found) = self.propagate_pointers(on_path);
        stats.pointer_relaxations = pointer_relaxations;
        stats.paths_found += found;

        debug!(
            "Hop {}: {} offset relaxations, {} pointer relaxations, {} paths",
            stats.round, stats.offset_relaxations, stats.pointer_relaxations, stats.paths_found
        );
        stats
    }

    /// Offset pass over all regions in parallel.
    ///
    /// Returns the relaxation count and the goal words reached, in address
    /// order. Goals are reported only after every region has finished.
    fn propagate_offsets(&mut self) -> (usize, Vec<WordRef>) {
        let word_size = self.snapshot.word_size() as u32;
        let max_offset = self.max_offset;

        let per_region: Vec<(usize, Vec<usize>)> = self
            .labels
            .regions_mut()
            .par_iter_mut()
            .map(|labels| propagate_region_offsets(labels, word_size, max_offset))
            .collect();

        let mut relaxed = 0;
        let mut goals = Vec::new();
        for (region, (count, indices)) in per_region.into_iter().enumerate() {
            relaxed += count;
            goals.extend(indices.into_iter().map(|i| WordRef::new(region, i)));
        }
        (relaxed, goals)
    }

    /// Pointer pass in region/word order. Reports goals as they are reached.
    ///
    /// Sources are read as they stood after the offset pass, so a word
    /// relaxed here does not act as a source until the next round.
    fn propagate_pointers(&mut self, on_path: &mut dyn FnMut(ChainPath)) -> (usize, usize) {
        let mut relaxed = 0;
        let mut found = 0;

        for (source, target, hops) in self.pointer_edges() {
            let slot = self.labels.get_mut(target);
            if !slot.label.improves_with(hops) {
                continue;
            }

            let goal = slot.label.is_goal_pending();
            slot.label = slot.label.reached(hops, 0);
            slot.reverse_ref = Some(source);
            relaxed += 1;

            if goal && self.report(target, on_path) {
                found += 1;
            }
        }

        (relaxed, found)
    }

    /// `(source, target, hops)` for every pointer leaving a reachable word,
    /// in scan order.
    fn pointer_edges(&self) -> Vec<(WordRef, WordRef, u32)> {
        let mut edges = Vec::new();

        for region in self.snapshot.regions() {
            for (index, word) in region.words.iter().enumerate() {
                let Some(target) = word.pointer_target else {
                    continue;
                };
                let source = WordRef::new(region.id, index);
                let Some((hops, _)) = self.labels.get(source).label.as_source() else {
                    continue;
                };
                if hops < self.max_hops {
                    edges.push((source, target, hops + 1));
                }
            }
        }

        edges
    }

    /// Offset pass run once the round bound is hit, so words reached by the
    /// last pointer pass still lend their hop count to the fields after them.
    fn settle_offsets(&mut self, on_path: &mut dyn FnMut(ChainPath)) -> usize {
        let (relaxed, goals) = self.propagate_offsets();
        let mut found = 0;
        for goal in goals {
            if self.report(goal, on_path) {
                found += 1;
            }
        }

        debug!("Closing offset pass: {} relaxations, {} paths", relaxed, found);
        found
    }

    fn report(&self, goal: WordRef, on_path: &mut dyn FnMut(ChainPath)) -> bool {
        let max_steps = self.max_hops as usize + 1;
        match reconstruct(self.snapshot, &self.labels, goal, max_steps) {
            Some(path) => {
                info!(
                    "Goal reached at {:#x} after {} hops",
                    self.snapshot.word(goal).address,
                    path.hops()
                );
                on_path(path);
                true
            }
            None => {
                warn!(
                    "Dropping goal {:#x}: chain could not be reconstructed",
                    self.snapshot.word(goal).address
                );
                false
            }
        }
    }
}

/// Left-to-right offset relaxation within one region.
///
/// Returns the relaxation count and the indices of goal words reached.
fn propagate_region_offsets(
    labels: &mut [WordLabel],
    word_size: u32,
    max_offset: u32,
) -> (usize, Vec<usize>) {
    let mut relaxed = 0;
    let mut goals = Vec::new();

    for j in 1..labels.len() {
        let Some((hops, offset)) = labels[j - 1].label.as_source() else {
            continue;
        };
        let Some(next_offset) = offset.checked_add(word_size) else {
            continue;
        };
        if next_offset > max_offset {
            continue;
        }

        let next = &mut labels[j];
        if !next.label.improves_with(hops) {
            continue;
        }
        if next.label.is_goal_pending() {
            goals.push(j);
        }
        next.label = next.label.reached(hops, next_offset);
        relaxed += 1;
    }

    (relaxed, goals)
}

/// Run a full search and collect every path found.
pub fn search(snapshot: &Snapshot, config: &SearchConfig) -> Result<SearchOutcome> {
    search_with(snapshot, config, |_| {})
}

/// Run a full search, handing each path to `observer` as it is found.
pub fn search_with<F>(
    snapshot: &Snapshot,
    config: &SearchConfig,
    mut observer: F,
) -> Result<SearchOutcome>
where
    F: FnMut(&ChainPath),
{
    let mut engine = PropagationEngine::new(snapshot, config)?;
    let mut paths = Vec::new();

    let converged = engine.run(&mut |path: ChainPath| {
        observer(&path);
        paths.push(path);
    });

    info!(
        "Search finished after {} rounds with {} paths",
        engine.rounds(),
        paths.len()
    );

    Ok(SearchOutcome {
        paths,
        rounds_completed: engine.rounds(),
        converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AddressRange;

    fn words(values: &[u64]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn snapshot(regions: Vec<(u64, Vec<u64>)>) -> Snapshot {
        Snapshot::from_regions(
            regions
                .into_iter()
                .map(|(base, values)| (base, words(&values)))
                .collect(),
            8,
        )
        .unwrap()
    }

    fn config(start: u64, goal: u64) -> SearchConfig {
        SearchConfig::new(AddressRange::single(start, 8), AddressRange::single(goal, 8))
    }

    #[test]
    fn test_region_offsets_stop_at_max_offset() {
        let mut labels = vec![WordLabel::default(); 4];
        labels[0].label = Label::Reachable { hops: 1, offset: 0 };

        let (relaxed, goals) = propagate_region_offsets(&mut labels, 8, 16);
        assert_eq!(relaxed, 2);
        assert!(goals.is_empty());
        assert_eq!(labels[2].label, Label::Reachable { hops: 1, offset: 16 });
        assert_eq!(labels[3].label, Label::Unvisited);
    }

    #[test]
    fn test_region_offsets_keep_equal_or_better_labels() {
        let mut labels = vec![WordLabel::default(); 3];
        labels[0].label = Label::Reachable { hops: 2, offset: 0 };
        labels[1].label = Label::Reachable { hops: 2, offset: 0 };
        labels[2].label = Label::Reachable { hops: 1, offset: 0 };

        let (relaxed, _) = propagate_region_offsets(&mut labels, 8, 64);
        assert_eq!(relaxed, 0);
        assert_eq!(labels[1].label, Label::Reachable { hops: 2, offset: 0 });
    }

    #[test]
    fn test_region_offsets_report_and_freeze_goals() {
        let mut labels = vec![WordLabel::default(); 3];
        labels[0].label = Label::Reachable { hops: 0, offset: 0 };
        labels[1].label = Label::GoalPending;

        let (relaxed, goals) = propagate_region_offsets(&mut labels, 8, 64);
        assert_eq!(relaxed, 1);
        assert_eq!(goals, vec![1]);
        assert_eq!(labels[1].label, Label::GoalReported { hops: 0, offset: 8 });
        // a reported goal is not a source
        assert_eq!(labels[2].label, Label::Unvisited);
    }

    #[test]
    fn test_unmapped_ranges_are_fatal() {
        let snap = snapshot(vec![(0x1000, vec![0x2000]), (0x2000, vec![0])]);

        assert!(matches!(
            PropagationEngine::new(&snap, &config(0x9000, 0x2000)),
            Err(ChainError::RangeNotMapped {
                kind: RangeKind::Start,
                ..
            })
        ));
        assert!(matches!(
            PropagationEngine::new(&snap, &config(0x1000, 0x9000)),
            Err(ChainError::RangeNotMapped {
                kind: RangeKind::Goal,
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let snap = snapshot(vec![(0x1000, vec![0])]);
        assert!(matches!(
            search(&snap, &config(0x1000, 0x1000).with_hops(0)),
            Err(ChainError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_single_hop_chain() {
        let snap = snapshot(vec![(0x1000, vec![0x2000]), (0x2000, vec![0])]);
        let outcome = search(&snap, &config(0x1000, 0x2000)).unwrap();

        assert_eq!(outcome.paths.len(), 1);
        assert_eq!(outcome.paths[0].hops(), 1);
        assert_eq!(
            outcome.paths[0].to_string(),
            "0x1000 + 0x0 = 0x1000 -> 0x2000\n0x2000 + 0x0 = 0x2000 (goal address)"
        );
    }

    #[test]
    fn test_pointer_through_struct_field() {
        // start -> object at 0x2000; its field at +0x10 points at the goal
        let snap = snapshot(vec![
            (0x1000, vec![0x2000]),
            (0x2000, vec![0, 0, 0x3000]),
            (0x3000, vec![0]),
        ]);
        let outcome = search(&snap, &config(0x1000, 0x3000).with_offset(0x10)).unwrap();

        assert_eq!(outcome.paths.len(), 1);
        let path = &outcome.paths[0];
        assert_eq!(path.steps[1].base_address, 0x2000);
        assert_eq!(path.steps[1].offset, 0x10);
        assert_eq!(path.steps[1].address, 0x2010);
        assert_eq!(path.replay(&snap), Some(0x3000));
    }

    #[test]
    fn test_field_beyond_max_offset_is_unreachable() {
        let snap = snapshot(vec![
            (0x1000, vec![0x2000]),
            (0x2000, vec![0, 0, 0x3000]),
            (0x3000, vec![0]),
        ]);
        let outcome = search(&snap, &config(0x1000, 0x3000).with_offset(8)).unwrap();
        assert!(outcome.is_empty());
    }

    #[test]
    fn test_hop_bound_limits_chain_length() {
        // 0x1000 -> 0x2000 -> 0x3000 -> 0x4000 (goal): three hops
        let snap = snapshot(vec![
            (0x1000, vec![0x2000]),
            (0x2000, vec![0x3000]),
            (0x3000, vec![0x4000]),
            (0x4000, vec![0]),
        ]);

        let short = search(&snap, &config(0x1000, 0x4000).with_hops(2)).unwrap();
        assert!(short.is_empty());

        let long = search(&snap, &config(0x1000, 0x4000).with_hops(3)).unwrap();
        assert_eq!(long.paths.len(), 1);
        assert_eq!(long.paths[0].hops(), 3);
    }

    #[test]
    fn test_goal_reported_once() {
        // two start words both point at the goal
        let snap = snapshot(vec![(0x1000, vec![0x3000, 0x3000]), (0x3000, vec![0])]);
        let config = SearchConfig::new(
            AddressRange::new(0x1000, 0x1010),
            AddressRange::single(0x3000, 8),
        )
        .with_hops(4);

        let outcome = search(&snap, &config).unwrap();
        assert_eq!(outcome.paths.len(), 1);
        assert_eq!(outcome.paths[0].start_address(), Some(0x1000));
    }

    #[test]
    fn test_each_round_adds_one_hop() {
        // 0x1000 -> 0x2000 -> 0x3000 -> 0x4000, all in ascending scan order
        let snap = snapshot(vec![
            (0x1000, vec![0x2000]),
            (0x2000, vec![0x3000]),
            (0x3000, vec![0x4000]),
            (0x4000, vec![0]),
        ]);
        let mut engine = PropagationEngine::new(&snap, &config(0x1000, 0x4000)).unwrap();
        let mut paths = Vec::new();
        fn hops(engine: &PropagationEngine<'_>, region: usize) -> Option<u32> {
            engine.labels().region(region)[0].label.hops()
        }

        engine.run_round(&mut |p: ChainPath| paths.push(p));
        assert_eq!(hops(&engine, 1), Some(1));
        assert_eq!(hops(&engine, 2), None);

        engine.run_round(&mut |p: ChainPath| paths.push(p));
        assert_eq!(hops(&engine, 2), Some(2));
        assert!(paths.is_empty());

        engine.run_round(&mut |p: ChainPath| paths.push(p));
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].hops(), 3);
    }

    #[test]
    fn test_closing_offset_pass_reaches_last_round_fields() {
        // one hop to 0x2000, goal is the field at 0x2008
        let snap = snapshot(vec![(0x1000, vec![0x2000]), (0x2000, vec![0, 0])]);
        let outcome = search(&snap, &config(0x1000, 0x2008).with_hops(1)).unwrap();

        assert!(!outcome.converged);
        assert_eq!(outcome.rounds_completed, 1);
        assert_eq!(outcome.paths.len(), 1);
        assert_eq!(
            outcome.paths[0].to_string(),
            "0x1000 + 0x0 = 0x1000 -> 0x2000\n0x2000 + 0x8 = 0x2008 (goal address)"
        );
    }

    #[test]
    fn test_converges_before_round_bound() {
        let snap = snapshot(vec![(0x1000, vec![0x2000]), (0x2000, vec![0])]);
        let outcome = search(&snap, &config(0x1000, 0x2000).with_hops(10)).unwrap();

        assert!(outcome.converged);
        assert!(outcome.rounds_completed < 10);
    }

    #[test]
    fn test_observer_sees_each_path() {
        let snap = snapshot(vec![(0x1000, vec![0x2000]), (0x2000, vec![0])]);
        let mut seen = Vec::new();
        let outcome = search_with(&snap, &config(0x1000, 0x2000), |path| {
            seen.push(path.goal_address())
        })
        .unwrap();

        assert_eq!(seen, vec![Some(0x2000)]);
        assert_eq!(outcome.paths.len(), 1);
    }

    #[test]
    fn test_run_round_reports_stats() {
        let snap = snapshot(vec![(0x1000, vec![0x2000, 0]), (0x2000, vec![0])]);
        let mut engine = PropagationEngine::new(&snap, &config(0x1000, 0x2000)).unwrap();

        let mut paths = Vec::new();
        let stats = engine.run_round(&mut |p: ChainPath| paths.push(p));
        assert_eq!(stats.round, 1);
        assert_eq!(stats.offset_relaxations, 1);
        assert_eq!(stats.pointer_relaxations, 1);
        assert_eq!(stats.paths_found, 1);
        assert_eq!(engine.labels().reported_goals(), 1);
    }
}
