//! Chain reconstruction from back-references.

use crate::index::WordRef;
use crate::labels::LabelStore;
use crate::snapshot::Snapshot;
use serde::Serialize;
use std::fmt;
use tracing::warn;

/// One `base + offset = address -> dereferenced` line of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChainStep {
    /// Word reached by the previous dereference (or a start word)
    pub base_address: u64,
    /// Bytes added to `base_address` without dereferencing
    pub offset: u32,
    /// `base_address + offset`
    pub address: u64,
    /// Word that the pointer stored at `address` leads to; `None` on the goal
    pub dereferenced: Option<u64>,
}

/// A pointer chain from the start range to a goal word, start first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainPath {
    pub steps: Vec<ChainStep>,
}

impl ChainPath {
    /// Number of pointer dereferences
    pub fn hops(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    pub fn start_address(&self) -> Option<u64> {
        self.steps.first().map(|s| s.base_address)
    }

    pub fn goal_address(&self) -> Option<u64> {
        self.steps.last().map(|s| s.address)
    }

    /// Largest offset used by any step
    pub fn max_offset(&self) -> u32 {
        self.steps.iter().map(|s| s.offset).max().unwrap_or(0)
    }

    /// Follow the chain through `snapshot`'s captured values.
    ///
    /// Returns the final address if every step is consistent with memory:
    /// each `base + offset` matches the recorded address and each
    /// dereference lands on the next step's base word.
    pub fn replay(&self, snapshot: &Snapshot) -> Option<u64> {
        let mut expected_base = self.start_address()?;

        for (i, step) in self.steps.iter().enumerate() {
            if step.base_address != expected_base {
                return None;
            }
            let address = step.base_address.checked_add(step.offset as u64)?;
            if address != step.address {
                return None;
            }

            let is_last = i + 1 == self.steps.len();
            match (is_last, step.dereferenced) {
                (true, None) => return Some(address),
                (false, Some(recorded)) => {
                    let value = snapshot.read_word(address)?;
                    let landed = snapshot.word(snapshot.find_word(value)?).address;
                    if landed != recorded {
                        return None;
                    }
                    expected_base = landed;
                }
                _ => return None,
            }
        }

        None
    }
}

impl fmt::Display for ChainPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "{:#x} + {:#x} = {:#x}",
                step.base_address, step.offset, step.address
            )?;
            match step.dereferenced {
                Some(target) => write!(f, " -> {:#x}", target)?,
                None => write!(f, " (goal address)")?,
            }
        }
        Ok(())
    }
}

/// Walk back from a freshly reported goal word to the start range.
///
/// At each word, step back to the start of its offset run (the word the
/// last dereference landed on), record the step, then follow that word's
/// back-reference. Stops at a hop-0 word. Gives up after `max_steps` steps
/// or on a broken link, which a consistent label store never produces.
pub fn reconstruct(
    snapshot: &Snapshot,
    labels: &LabelStore,
    goal: WordRef,
    max_steps: usize,
) -> Option<ChainPath> {
    let word_size = snapshot.word_size() as u32;
    let mut steps = Vec::new();
    let mut current = goal;

    while steps.len() < max_steps {
        let offset = labels.get(current).label.offset()?;
        let origin = WordRef::new(
            current.region,
            current.index.checked_sub((offset / word_size) as usize)?,
        );

        let dereferenced = if current == goal {
            None
        } else {
            let target = snapshot.word(current).pointer_target?;
            Some(snapshot.word(target).address)
        };

        steps.push(ChainStep {
            base_address: snapshot.word(origin).address,
            offset,
            address: snapshot.word(current).address,
            dereferenced,
        });

        let origin_label = labels.get(origin);
        if origin_label.label.hops() == Some(0) {
            steps.reverse();
            return Some(ChainPath { steps });
        }

        current = origin_label.reverse_ref?;
    }

    warn!(
        "Chain to {:#x} did not reach the start within {} steps",
        snapshot.word(goal).address,
        max_steps
    );
    None
}
