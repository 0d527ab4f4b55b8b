//! Error types for the SoC model.

use thiserror::Error;

use crate::memmap::RegionId;

/// Errors produced while composing the SoC model.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SocError {
    /// The requested core count is outside what the platform supports.
    #[error("unsupported core count {requested}: this platform boots 1 or 2 cores")]
    UnsupportedCoreCount { requested: u32 },

    /// Two address map regions claim overlapping physical ranges.
    #[error("address map regions {first} and {second} overlap")]
    OverlappingRegions { first: RegionId, second: RegionId },
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, SocError>;
