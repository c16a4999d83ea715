//! DMG scheduler configuration management
//!
//! This crate provides configuration loading and parsing for the DMG access point scheduler:
//! - TOML configuration file parsing
//! - Beacon interval timing and scheduler policy settings
//! - Simulation scenario description

pub mod sched_config;
pub mod sched_config_scenario;
pub mod toml_config;

pub use sched_config::*;
pub use sched_config_scenario::*;
pub use toml_config::*;
