//! Command handlers for the ptrchain CLI
//!
//! Each subcommand has its own module with handler functions.

pub mod configure;
pub mod regions;
pub mod search;
