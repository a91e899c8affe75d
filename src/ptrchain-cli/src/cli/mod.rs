//! CLI argument definitions

mod core;
mod target;

pub use self::core::*;
pub use self::target::*;
