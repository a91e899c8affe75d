//! # ptrchain
//!
//! Pointer chain discovery over a snapshot of a process's address space.
//!
//! Given a start range and a goal range, the search finds chains of the form
//! `[start] + off -> [p1] + off -> ... -> goal`, where every hop is one
//! pointer dereference and each offset stays within a configured bound.
//! Edges are inferred from raw memory: any captured word whose value lands
//! inside a captured region is treated as a candidate pointer.
//!
//! ## Example
//!
//! ```
//! use ptrchain::{search, AddressRange, MockMemorySource, SearchConfig, Snapshot};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = MockMemorySource::new()
//!     .with_words(0x1000, &[0x2004])
//!     .with_words(0x2000, &[0x3000, 0x1234])
//!     .with_words(0x3000, &[0xdead]);
//!
//! let snapshot = Snapshot::capture(&source, 8)?;
//! let config = SearchConfig::new(
//!     AddressRange::parse("0x1000-0x1008", 8)?,
//!     AddressRange::parse("0x3000", 8)?,
//! )
//! .with_hops(3)
//! .with_offset(16);
//!
//! let outcome = search(&snapshot, &config)?;
//! assert_eq!(outcome.paths.len(), 1);
//! assert_eq!(outcome.paths[0].hops(), 2);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod labels;
pub mod path;
pub mod snapshot;
pub mod source;

#[doc(inline)]
pub use config::{AddressRange, SearchConfig, DEFAULT_MAX_HOPS, DEFAULT_MAX_OFFSET};
#[doc(inline)]
pub use engine::{search, search_with, PropagationEngine, RoundStats, SearchOutcome};
#[doc(inline)]
pub use error::{ChainError, RangeKind};
#[doc(inline)]
pub use index::{RegionIndex, WordRef};
#[doc(inline)]
pub use labels::{Label, LabelStore, WordLabel};
#[doc(inline)]
pub use path::{ChainPath, ChainStep};
#[doc(inline)]
pub use snapshot::{Region, Snapshot, Word};
#[doc(inline)]
pub use source::{MemoryRegion, MemorySource, MockMemorySource};
