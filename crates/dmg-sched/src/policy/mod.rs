//! Admission policies deciding on ADDTS requests at the end of a beacon interval.
//!
//! A policy gets the registry and free slots through a `SchedCtx` for a single
//! decision. Rejections leave both untouched.

pub mod basic;
pub mod cbap_only;
pub mod periodic;

pub use basic::BasicPolicy;
pub use cbap_only::CbapOnlyPolicy;
pub use periodic::PeriodicPolicy;

use dmg_config::PolicyKind;
use dmg_core::{Aid, Allocation, AllocationKey, DtiOffset, TrafficSpec, TspecErr};

use crate::sched_ctx::SchedCtx;
use crate::slots::{FreeSlots, SlotErr};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    InvalidTspec(TspecErr),
    /// No free slot is long enough
    InsufficientSpace,
    /// Blocks this close together would leave less than the minimum broadcast CBAP in between
    CbapFloor { sp_interval: u32, duration: u32 },
    /// A periodic allocation needs at least two blocks
    TooFewBlocks { found: usize },
    PeriodicNotSupported,
    DurationIncrease { current: u32, requested: u32 },
    CbapOnly,
    NotFound,
    Slots(SlotErr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionOutcome {
    Accepted { start: DtiOffset, duration: u32, blocks: u8 },
    Rejected(RejectReason),
}

impl AdmissionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, AdmissionOutcome::Accepted { .. })
    }

    fn accepted(allocation: &Allocation) -> Self {
        AdmissionOutcome::Accepted {
            start: allocation.start,
            duration: allocation.block_duration,
            blocks: allocation.num_blocks,
        }
    }
}

/// Key an ADDTS request refers to
pub fn request_key(source: Aid, tspec: &TrafficSpec) -> AllocationKey {
    AllocationKey { id: tspec.info.id, source, dest: tspec.info.dest }
}

pub trait AdmissionPolicy {
    fn kind(&self) -> PolicyKind;

    /// Places a request that has no allocation yet
    fn add_new_allocation(&mut self, ctx: &mut SchedCtx, source: Aid, tspec: &TrafficSpec) -> AdmissionOutcome;

    /// Changes the block duration of an existing allocation. Only decreases are granted,
    /// the freed tail of every block goes back to the free slots.
    fn modify_existing_allocation(&mut self, ctx: &mut SchedCtx, source: Aid, tspec: &TrafficSpec) -> AdmissionOutcome {
        let key = request_key(source, tspec);
        let guard = ctx.params.guard_time;
        let requested = tspec.desired_duration();

        let Some(current) = ctx.registry.find(&key) else {
            return AdmissionOutcome::Rejected(RejectReason::NotFound);
        };
        let current_duration = current.block_duration;
        if requested > current_duration {
            dmg_core::unimplemented_log!("{}: block duration increase {} -> {}", key, current_duration, requested);
            return AdmissionOutcome::Rejected(RejectReason::DurationIncrease { current: current_duration, requested });
        }
        if requested == current_duration {
            return AdmissionOutcome::accepted(current);
        }

        let mut updated = current.clone();
        updated.block_duration = requested;

        let mut staged = ctx.slots.clone();
        let old_spans = current.occupied_intervals(guard);
        let new_spans = updated.occupied_intervals(guard);
        for ((start, old_end), (_, new_end)) in old_spans.into_iter().zip(new_spans) {
            if let Err(e) = self.update_available_slots_shrink(&mut staged, start, new_end, old_end - new_end) {
                tracing::warn!("{}: cannot return tail of block at {}: {:?}", key, start, e);
                return AdmissionOutcome::Rejected(RejectReason::Slots(e));
            }
        }
        *ctx.slots = staged;

        let outcome = AdmissionOutcome::accepted(&updated);
        if let Some(existing) = ctx.registry.find_mut(&key) {
            *existing = updated;
        }
        tracing::debug!("{}: shrunk {} -> {}", key, current_duration, requested);
        outcome
    }

    /// Takes `[start, end)` out of the free slots
    fn update_available_slots(&self, slots: &mut FreeSlots, start: DtiOffset, end: DtiOffset) -> Result<(), SlotErr> {
        slots.claim(start, end)
    }

    /// Gives back `shrink_by` microseconds after `end`, the new occupied end of the block starting at `start`
    fn update_available_slots_shrink(
        &self,
        slots: &mut FreeSlots,
        start: DtiOffset,
        end: DtiOffset,
        shrink_by: u32,
    ) -> Result<(), SlotErr> {
        tracing::trace!("block at {} shrinks by {}, reopen from {}", start, shrink_by, end);
        slots.reopen_tail(end, shrink_by)
    }

    /// First-fit placement of one block, shared by all admitting policies
    fn allocate_single_block(&self, ctx: &mut SchedCtx, source: Aid, tspec: &TrafficSpec, duration: u32) -> AdmissionOutcome {
        let guard = ctx.params.guard_time;
        let Some(start) = ctx.slots.first_fit(duration + guard) else {
            tracing::debug!("no slot longer than {} + {} guard", duration, guard);
            return AdmissionOutcome::Rejected(RejectReason::InsufficientSpace);
        };
        if let Err(e) = self.update_available_slots(ctx.slots, start, start + duration + guard) {
            return AdmissionOutcome::Rejected(RejectReason::Slots(e));
        }

        let allocation = Allocation::single(request_key(source, tspec), tspec.info.kind, tspec.info.is_static, start, duration);
        let outcome = AdmissionOutcome::accepted(&allocation);
        ctx.registry.insert(allocation);
        outcome
    }
}

/// The configured policy
pub enum Policy {
    Basic(BasicPolicy),
    Periodic(PeriodicPolicy),
    CbapOnly(CbapOnlyPolicy),
}

impl Policy {
    pub fn from_kind(kind: PolicyKind) -> Self {
        match kind {
            PolicyKind::Basic => Policy::Basic(BasicPolicy),
            PolicyKind::Periodic => Policy::Periodic(PeriodicPolicy),
            PolicyKind::CbapOnly => Policy::CbapOnly(CbapOnlyPolicy),
        }
    }
}

impl AdmissionPolicy for Policy {
    fn kind(&self) -> PolicyKind {
        match self {
            Policy::Basic(p) => p.kind(),
            Policy::Periodic(p) => p.kind(),
            Policy::CbapOnly(p) => p.kind(),
        }
    }

    fn add_new_allocation(&mut self, ctx: &mut SchedCtx, source: Aid, tspec: &TrafficSpec) -> AdmissionOutcome {
        match self {
            Policy::Basic(p) => p.add_new_allocation(ctx, source, tspec),
            Policy::Periodic(p) => p.add_new_allocation(ctx, source, tspec),
            Policy::CbapOnly(p) => p.add_new_allocation(ctx, source, tspec),
        }
    }

    fn modify_existing_allocation(&mut self, ctx: &mut SchedCtx, source: Aid, tspec: &TrafficSpec) -> AdmissionOutcome {
        match self {
            Policy::Basic(p) => p.modify_existing_allocation(ctx, source, tspec),
            Policy::Periodic(p) => p.modify_existing_allocation(ctx, source, tspec),
            Policy::CbapOnly(p) => p.modify_existing_allocation(ctx, source, tspec),
        }
    }
}
