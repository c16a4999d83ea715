use dmg_config::PolicyKind;
use dmg_core::{Aid, Allocation, DtiOffset, TrafficSpec};

use super::{AdmissionOutcome, AdmissionPolicy, RejectReason, request_key};
use crate::sched_ctx::SchedCtx;
use crate::slots::FreeSlots;

/// Single blocks go first-fit. Periodic requests get equally spaced blocks,
/// `bi / period` apart, as many as fit without breaking the spacing.
pub struct PeriodicPolicy;

impl PeriodicPolicy {
    /// Walks the free slots looking for block starts `sp_interval` apart, each with room for
    /// `duration + guard`. The first block goes to the first slot it fits in. Stops at the first
    /// occurrence that lands in occupied time or past the DTI, or after `max_blocks` starts.
    pub fn get_available_blocks(
        slots: &FreeSlots,
        duration: u32,
        sp_interval: u32,
        guard: u32,
        max_blocks: u8,
    ) -> Vec<DtiOffset> {
        let list = slots.as_slice();
        let mut offsets = Vec::new();
        let Some(first) = list.first() else {
            return offsets;
        };
        if sp_interval == 0 {
            return offsets;
        }

        let needed = duration + guard;
        let mut idx = 0;
        let mut t = first.start;
        while offsets.len() < max_blocks as usize {
            let slot = list[idx];
            if t + needed <= slot.end {
                offsets.push(t);
                t += sp_interval;
            } else if offsets.is_empty() {
                // Nothing placed yet, retry at the start of the next slot
                idx += 1;
                match list.get(idx) {
                    Some(next) => t = next.start,
                    None => break,
                }
                continue;
            } else {
                break;
            }

            if t >= slot.end {
                match slots.slot_containing(t) {
                    Some(i) => idx = i,
                    None => break,
                }
            }
        }
        tracing::trace!("{} blocks of {} every {}: {:?}", offsets.len(), duration, sp_interval, offsets);
        offsets
    }

    fn allocate_periodic(&self, ctx: &mut SchedCtx, source: Aid, tspec: &TrafficSpec, duration: u32) -> AdmissionOutcome {
        let params = ctx.params;
        let sp_interval = ctx.bi_duration / tspec.allocation_period as u32;

        // Consecutive blocks must not overlap and must leave room for the broadcast CBAP
        if sp_interval < duration + params.guard_time || sp_interval - duration < params.min_broadcast_cbap {
            tracing::debug!(
                "interval {} leaves less than {} between blocks of {}",
                sp_interval, params.min_broadcast_cbap, duration
            );
            return AdmissionOutcome::Rejected(RejectReason::CbapFloor { sp_interval, duration });
        }

        let offsets = Self::get_available_blocks(ctx.slots, duration, sp_interval, params.guard_time, params.max_blocks);
        if offsets.len() < 2 {
            tracing::debug!("only {} block(s) of {} fit every {}", offsets.len(), duration, sp_interval);
            return AdmissionOutcome::Rejected(RejectReason::TooFewBlocks { found: offsets.len() });
        }

        let mut staged = ctx.slots.clone();
        for &start in &offsets {
            if let Err(e) = self.update_available_slots(&mut staged, start, start + duration + params.guard_time) {
                tracing::warn!("block at {} found free but cannot be claimed: {:?}", start, e);
                return AdmissionOutcome::Rejected(RejectReason::Slots(e));
            }
        }
        *ctx.slots = staged;

        let mut allocation = Allocation::single(request_key(source, tspec), tspec.info.kind, tspec.info.is_static, offsets[0], duration);
        allocation.num_blocks = offsets.len() as u8;
        allocation.block_period = sp_interval;
        let outcome = AdmissionOutcome::Accepted { start: offsets[0], duration, blocks: allocation.num_blocks };
        ctx.registry.insert(allocation);
        outcome
    }
}

impl AdmissionPolicy for PeriodicPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Periodic
    }

    fn add_new_allocation(&mut self, ctx: &mut SchedCtx, source: Aid, tspec: &TrafficSpec) -> AdmissionOutcome {
        let duration = tspec.desired_duration();
        if tspec.is_periodic() {
            self.allocate_periodic(ctx, source, tspec, duration)
        } else {
            self.allocate_single_block(ctx, source, tspec, duration)
        }
    }
}
