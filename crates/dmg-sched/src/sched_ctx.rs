use dmg_core::{Aid, Allocation, AllocationKey, AllocationKind, BF_SP_PROTECTION_PERIOD, BfControl, DtiOffset};

use crate::registry::AllocationRegistry;
use crate::slots::{FreeSlots, SlotErr};

/// Scheduler settings a policy works with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyParams {
    pub guard_time: u32,
    pub min_broadcast_cbap: u32,
    pub max_blocks: u8,
}

/// Mutable view on the scheduler state, lent to a policy for one decision
pub struct SchedCtx<'a> {
    pub registry: &'a mut AllocationRegistry,
    pub slots: &'a mut FreeSlots,
    pub bi_duration: u32,
    pub params: PolicyParams,
}

impl<'a> SchedCtx<'a> {
    pub fn dti_duration(&self) -> u32 {
        self.slots.dti()
    }

    /// Claims every occupied interval of `allocation` and registers it.
    /// Either all intervals are claimed or the state is left untouched.
    pub fn reserve(&mut self, allocation: Allocation) -> Result<DtiOffset, SlotErr> {
        let mut staged = self.slots.clone();
        for (start, end) in allocation.occupied_intervals(self.params.guard_time) {
            staged.claim(start, end)?;
        }
        *self.slots = staged;
        Ok(self.registry.insert(allocation))
    }

    /// Returns the airtime of a removed allocation to the free slots
    pub fn release(&mut self, allocation: &Allocation) -> Result<(), SlotErr> {
        let dti = self.slots.dti();
        for (start, end) in allocation.occupied_intervals(self.params.guard_time) {
            // Clipped, the DTI may have shrunk since the allocation was made
            let end = end.min(dti);
            if start < end {
                self.slots.release(start, end)?;
            }
        }
        Ok(())
    }

    pub fn allocate_single_contiguous_block(
        &mut self,
        key: AllocationKey,
        kind: AllocationKind,
        is_static: bool,
        start: DtiOffset,
        duration: u32,
    ) -> Result<DtiOffset, SlotErr> {
        self.reserve(Allocation::single(key, kind, is_static, start, duration))
    }

    /// Back-to-back blocks starting at `start`. Returns `start + duration * blocks`.
    pub fn allocate_multiple_contiguous_blocks(
        &mut self,
        key: AllocationKey,
        kind: AllocationKind,
        is_static: bool,
        start: DtiOffset,
        duration: u32,
        blocks: u8,
    ) -> Result<DtiOffset, SlotErr> {
        let mut allocation = Allocation::single(key, kind, is_static, start, duration);
        allocation.num_blocks = blocks;
        self.reserve(allocation)
    }

    /// CBAP open to all stations
    pub fn allocate_cbap_period(&mut self, is_static: bool, start: DtiOffset, duration: u32) -> Result<DtiOffset, SlotErr> {
        let mut cbap = Allocation::broadcast_cbap(start, duration);
        cbap.is_static = is_static;
        self.reserve(cbap)
    }

    /// Gives the whole DTI to one static SP, split into `max_blocks` back-to-back blocks.
    /// Only possible while the DTI is entirely free.
    pub fn allocate_dti_as_service_period(&mut self, id: u8, source: Aid, dest: Aid) -> Result<DtiOffset, SlotErr> {
        let dti = self.dti_duration();
        let blocks = self.params.max_blocks;
        let sp_duration = dti.saturating_sub(self.params.guard_time) / blocks as u32;
        if sp_duration == 0 {
            return Err(SlotErr::EmptyInterval { start: 0, end: dti });
        }
        let key = AllocationKey { id, source, dest };
        self.allocate_multiple_contiguous_blocks(key, AllocationKind::ServicePeriod, true, 0, sp_duration, blocks)
    }

    /// Non-static SP for beamforming training between two stations, placed first-fit.
    /// Returns the SP start.
    pub fn allocate_beamforming_service_period(
        &mut self,
        source: Aid,
        dest: Aid,
        duration: u32,
        initiator_txss: bool,
        responder_txss: bool,
    ) -> Result<DtiOffset, SlotErr> {
        let needed = duration + BF_SP_PROTECTION_PERIOD + self.params.guard_time;
        let Some(start) = self.slots.first_fit(needed) else {
            return Err(SlotErr::NotFree { start: 0, end: needed });
        };

        let key = AllocationKey { id: 0, source, dest };
        let mut sp = Allocation::single(key, AllocationKind::ServicePeriod, false, start, duration);
        sp.bf_control = Some(BfControl { initiator_txss, responder_txss });
        self.reserve(sp)?;
        tracing::debug!("beamforming SP {}->{} at {} for {}", source, dest, start, duration);
        Ok(start)
    }
}
