//! Memory Source Abstraction
//!
//! The snapshot is captured from anything implementing [`MemorySource`]:
//! - Live processes and dump files (provided by the CLI crate)
//! - [`MockMemorySource`] for tests and synthetic address spaces

mod mock;
mod region;
mod traits;

pub use mock::MockMemorySource;
pub use region::MemoryRegion;
pub use traits::MemorySource;
