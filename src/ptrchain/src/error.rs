//! Error types for snapshot capture and search setup.

use crate::config::AddressRange;
use std::fmt;
use thiserror::Error;

/// Which seed range a [`ChainError::RangeNotMapped`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    Start,
    Goal,
}

impl fmt::Display for RangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeKind::Start => write!(f, "start"),
            RangeKind::Goal => write!(f, "goal"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Snapshot acquisition failed: {reason}")]
    Acquisition { reason: String },

    #[error("The {kind} range {range} is not in readable memory")]
    RangeNotMapped { kind: RangeKind, range: AddressRange },

    #[error("Invalid address range '{input}': {reason}")]
    InvalidRange { input: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ChainError {
    pub(crate) fn acquisition(reason: impl Into<String>) -> Self {
        ChainError::Acquisition {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChainError>;
