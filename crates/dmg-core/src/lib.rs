//! Core types for the DMG access point scheduler
//!
//! This crate provides fundamental types and utilities shared by the scheduler crates:
//! - Station association identifiers and their sentinels
//! - Allocation records as announced in the extended schedule element
//! - Traffic specifications carried by ADDTS requests
//! - SimTime for the virtual clock driving the beacon interval
//! - Logging setup and common macros

pub mod aid;
pub mod allocation;
pub mod debug;
pub mod sim_time;
pub mod tspec;

// Re-export commonly used items
pub use aid::*;
pub use allocation::*;
pub use sim_time::SimTime;
pub use tspec::*;

use const_format::concatcp;

const GIT_VERSION: &str = git_version::git_version!(args = ["--always", "--dirty=-modified"], fallback = "unknown");

/// Version string reported by binaries, `<crate version>-<git describe>`
pub const STACK_VERSION: &str = concatcp!(env!("CARGO_PKG_VERSION"), "-", GIT_VERSION);

/// Offset in microseconds, relative to the start of the Data Transfer Interval
pub type DtiOffset = u32;
