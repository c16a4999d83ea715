#![allow(dead_code, unused_imports)]

pub mod component_test;
pub mod sink;

pub use component_test::{ComponentTest, default_test_config, sp_request};
pub use sink::{Record, Sink};
