//! Beacon interval scheduling for a DMG PCP/AP
//!
//! The CycleScheduler walks each beacon interval through its access periods and decides on
//! queued ADDTS requests at the end of the DTI, using the configured admission policy.
//! The CycleDriver runs it against a virtual clock and passes results to ScheduleSinks.

pub mod cycle;
pub mod driver;
pub mod policy;
pub mod registry;
pub mod request_queue;
pub mod sched_ctx;
pub mod sink_trait;
pub mod slots;

// Re-export commonly used items
pub use cycle::{AdmissionResponse, CycleScheduler, DeletionOutcome, DeletionResponse, NextPhase, Phase, PhaseEvent};
pub use driver::CycleDriver;
pub use policy::{AdmissionOutcome, AdmissionPolicy, Policy, RejectReason};
pub use registry::AllocationRegistry;
pub use sink_trait::ScheduleSink;
pub use slots::{AvailableSlot, FreeSlots};
