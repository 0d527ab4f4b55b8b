//! Subcommand implementations.

pub mod boot;
pub mod inspect;
pub mod regions;
