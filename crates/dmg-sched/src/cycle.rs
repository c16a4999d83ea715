use dmg_config::{PolicyKind, SharedConfig};
use dmg_core::{
    Aid, AidFmt, Allocation, AllocationId, AllocationKey, DEFAULT_BF_SP_DURATION, MAX_CBAP_BLOCK_DURATION, SimTime, TrafficSpec,
    assert_warn,
};

use crate::policy::{AdmissionOutcome, AdmissionPolicy, Policy, RejectReason, request_key};
use crate::registry::AllocationRegistry;
use crate::request_queue::{AdmissionRequest, RequestQueue};
use crate::sched_ctx::{PolicyParams, SchedCtx};
use crate::slots::FreeSlots;

/// Access period the beacon interval is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// BTI and A-BFT
    BeaconHeader,
    /// ATI
    Announcement,
    /// DTI
    DataTransfer,
}

/// Transition the scheduler asks to be woken up for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    AnnouncementStart,
    DataTransferStart,
    BeaconIntervalEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextPhase {
    pub at: SimTime,
    pub event: PhaseEvent,
}

/// Durations (microseconds) and start times of the current beacon interval
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleTiming {
    pub bi_duration: u32,
    pub bhi_duration: u32,
    pub ati_duration: u32,
    pub dti_duration: u32,
    pub bi_start: SimTime,
    pub ati_start: Option<SimTime>,
    pub dti_start: Option<SimTime>,
}

/// ADDTS response, one per processed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionResponse {
    pub key: AllocationKey,
    pub tspec: TrafficSpec,
    pub outcome: AdmissionOutcome,
    pub decided: SimTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOutcome {
    Found,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionResponse {
    pub key: AllocationKey,
    pub outcome: DeletionOutcome,
    pub at: SimTime,
}

/// Beacon interval state machine of the PCP/AP. Owns the allocation registry and the
/// free slots of the DTI. ADDTS requests are queued and decided on at the end of the
/// interval, DELTS requests take effect right away.
pub struct CycleScheduler {
    config: SharedConfig,
    coordinator: Aid,
    phase: Phase,
    timing: CycleTiming,
    /// Transition handed out last. None between the end of an interval and the next start.
    expected: Option<NextPhase>,

    policy: Policy,
    params: PolicyParams,
    registry: AllocationRegistry,
    slots: FreeSlots,
    queue: RequestQueue,

    /// Schedule carried by the next beacon, sorted by start
    published: Vec<Allocation>,
    responses: Vec<AdmissionResponse>,
    remaining_dti_time: u32,
}

impl CycleScheduler {
    pub fn new(config: SharedConfig) -> Self {
        let cfg = config.config();
        let params = PolicyParams {
            guard_time: cfg.scheduler.guard_time,
            min_broadcast_cbap: cfg.scheduler.min_broadcast_cbap,
            max_blocks: cfg.scheduler.max_blocks,
        };
        let dti = cfg.beacon.dti_duration();

        let mut sched = Self {
            config: config.clone(),
            coordinator: cfg.beacon.coordinator_aid,
            phase: Phase::BeaconHeader,
            expected: None,
            timing: CycleTiming {
                bi_duration: cfg.beacon.bi_duration,
                bhi_duration: cfg.beacon.bhi_duration(),
                ati_duration: cfg.beacon.ati_duration,
                dti_duration: dti,
                ..CycleTiming::default()
            },
            policy: Policy::from_kind(cfg.scheduler.policy),
            params,
            registry: AllocationRegistry::new(),
            slots: FreeSlots::new(dti),
            queue: RequestQueue::new(),
            published: vec![],
            responses: vec![],
            remaining_dti_time: dti,
        };

        for sa in &cfg.static_allocations {
            let key = AllocationKey { id: sa.id, source: sa.source, dest: sa.dest };
            let res = sched.sched_ctx().allocate_multiple_contiguous_blocks(key, sa.kind, true, sa.start, sa.block_duration, sa.blocks);
            if let Err(e) = res {
                tracing::error!("static allocation {} at {} not registered: {:?}", key, sa.start, e);
            }
        }

        sched.update_start_and_remaining_time();
        sched.finalize_schedule();
        tracing::info!(
            "scheduler up, policy {:?}, dti {} us, {} static allocation(s)",
            sched.policy.kind(), dti, sched.registry.len()
        );
        sched
    }

    /// Lends the registry and free slots, for decisions taken outside the end-of-interval processing
    pub fn sched_ctx(&mut self) -> SchedCtx<'_> {
        SchedCtx {
            registry: &mut self.registry,
            slots: &mut self.slots,
            bi_duration: self.timing.bi_duration,
            params: self.params,
        }
    }

    ///////// PHASE TRANSITIONS /////////

    /// Start of a beacon interval. Records its timing and returns the next transition:
    /// ATI start at the end of the header if an ATI is present, else DTI start.
    pub fn beacon_interval_started(&mut self, now: SimTime, coordinator: Aid, bi_duration: u32, bhi_duration: u32, ati_duration: u32) -> NextPhase {
        if let Some(pending) = self.expected {
            tracing::warn!(ts = %now, "BI start while {:?} at {} is pending in {:?}", pending.event, pending.at, self.phase);
        }
        if bhi_duration >= bi_duration {
            tracing::warn!(ts = %now, "header {} not shorter than interval {}, no DTI", bhi_duration, bi_duration);
        }
        let dti_duration = bi_duration.saturating_sub(bhi_duration);

        self.coordinator = coordinator;
        self.phase = Phase::BeaconHeader;
        self.timing = CycleTiming {
            bi_duration,
            bhi_duration,
            ati_duration,
            dti_duration,
            bi_start: now,
            ati_start: None,
            dti_start: None,
        };
        tracing::info!(ts = %now, "-> BI start, bi {} bhi {} ati {} dti {}", bi_duration, bhi_duration, ati_duration, dti_duration);

        if dti_duration != self.slots.dti() {
            self.adjust_to_dti(now, dti_duration);
        }

        let next = if ati_duration > 0 {
            NextPhase {
                at: now.add_us(bhi_duration.saturating_sub(ati_duration)),
                event: PhaseEvent::AnnouncementStart,
            }
        } else {
            NextPhase { at: now.add_us(bhi_duration), event: PhaseEvent::DataTransferStart }
        };
        self.expected = Some(next);
        next
    }

    fn announcement_started(&mut self, now: SimTime) -> NextPhase {
        tracing::debug!(ts = %now, "-> ATI start");
        self.phase = Phase::Announcement;
        self.timing.ati_start = Some(now);
        NextPhase { at: now.add_us(self.timing.ati_duration), event: PhaseEvent::DataTransferStart }
    }

    fn data_transfer_started(&mut self, now: SimTime) -> NextPhase {
        tracing::debug!(ts = %now, "-> DTI start, {} allocation(s) published", self.published.len());
        self.phase = Phase::DataTransfer;
        self.timing.dti_start = Some(now);
        NextPhase { at: now.add_us(self.timing.dti_duration), event: PhaseEvent::BeaconIntervalEnd }
    }

    /// End of the DTI. Expired allocations are dropped, then queued requests are decided in
    /// arrival order. The free time left over becomes broadcast CBAP in the next schedule.
    fn beacon_interval_ended(&mut self, now: SimTime) {
        tracing::debug!(ts = %now, "-> BI end, {} request(s) queued", self.queue.len());

        self.cleanup_allocations(now);

        let mut accepted = 0;
        let mut rejected = 0;
        let requests: Vec<AdmissionRequest> = self.queue.drain().collect();
        for request in requests {
            let response = self.process_request(now, request);
            if response.outcome.is_accepted() {
                accepted += 1;
            } else {
                rejected += 1;
            }
            self.responses.push(response);
        }

        self.update_start_and_remaining_time();
        self.finalize_schedule();
        self.queue.clear();
        self.phase = Phase::BeaconHeader;

        let occupied = self.registry.occupied_intervals(self.params.guard_time);
        let partition = self.slots.check_partition(&occupied);
        assert_warn!(partition.is_ok(), "free slots inconsistent with allocations: {:?}", partition);

        let mut state = self.config.state_write();
        state.cycles += 1;
        state.accepted += accepted;
        state.rejected += rejected;
    }

    /// Dispatches the transition this scheduler returned last. Returns the next one, or None
    /// at the end of the beacon interval. Any other event, or one fired early, is ignored with
    /// a warning and the pending transition is returned unchanged.
    pub fn handle_phase_event(&mut self, now: SimTime, event: PhaseEvent) -> Option<NextPhase> {
        let Some(expected) = self.expected else {
            tracing::warn!(ts = %now, "{:?} ignored, no transition pending in {:?}", event, self.phase);
            return None;
        };
        if event != expected.event || now < expected.at || !Self::legal_from(self.phase, event) {
            tracing::warn!(
                ts = %now,
                "{:?} ignored in {:?}, expecting {:?} at {}",
                event, self.phase, expected.event, expected.at
            );
            return Some(expected);
        }

        let next = match event {
            PhaseEvent::AnnouncementStart => Some(self.announcement_started(now)),
            PhaseEvent::DataTransferStart => Some(self.data_transfer_started(now)),
            PhaseEvent::BeaconIntervalEnd => {
                self.beacon_interval_ended(now);
                None
            }
        };
        self.expected = next;
        next
    }

    fn legal_from(phase: Phase, event: PhaseEvent) -> bool {
        matches!(
            (phase, event),
            (Phase::BeaconHeader, PhaseEvent::AnnouncementStart)
                | (Phase::BeaconHeader, PhaseEvent::DataTransferStart)
                | (Phase::Announcement, PhaseEvent::DataTransferStart)
                | (Phase::DataTransfer, PhaseEvent::BeaconIntervalEnd)
        )
    }

    /// Transition the scheduler is waiting for
    pub fn pending_transition(&self) -> Option<NextPhase> {
        self.expected
    }

    ///////// REQUESTS /////////

    /// Queues an ADDTS request until the end of the beacon interval
    pub fn receive_addts_request(&mut self, now: SimTime, source: Aid, tspec: TrafficSpec) {
        tracing::debug!(ts = %now, "<- ADDTS {} in {:?}", request_key(source, &tspec), self.phase);
        self.queue.push(AdmissionRequest { source, tspec, received: now });
    }

    /// Tears down an allocation and returns its airtime immediately
    pub fn receive_delts_request(&mut self, now: SimTime, source: Aid, id: AllocationId, dest: Aid) -> DeletionResponse {
        let key = AllocationKey { id, source, dest };
        let outcome = match self.registry.remove(&key) {
            Some(allocation) => {
                if let Err(e) = self.sched_ctx().release(&allocation) {
                    tracing::warn!(ts = %now, "{}: returning airtime failed: {:?}", key, e);
                }
                self.config.state_write().deleted += 1;
                tracing::debug!(ts = %now, "<- DELTS {}, released", key);
                DeletionOutcome::Found
            }
            None => {
                tracing::debug!(ts = %now, "<- DELTS {}, no such allocation", key);
                DeletionOutcome::NotFound
            }
        };
        DeletionResponse { key, outcome, at: now }
    }

    fn process_request(&mut self, now: SimTime, request: AdmissionRequest) -> AdmissionResponse {
        let AdmissionRequest { source, tspec, received } = request;
        let key = request_key(source, &tspec);

        let outcome = if let Err(e) = tspec.validate() {
            tracing::error!(ts = %now, "{}: invalid TSPEC received at {}: {:?}", key, received, e);
            AdmissionOutcome::Rejected(RejectReason::InvalidTspec(e))
        } else {
            let exists = self.registry.contains(&key);
            let mut ctx = SchedCtx {
                registry: &mut self.registry,
                slots: &mut self.slots,
                bi_duration: self.timing.bi_duration,
                params: self.params,
            };
            if exists {
                self.policy.modify_existing_allocation(&mut ctx, source, &tspec)
            } else {
                self.policy.add_new_allocation(&mut ctx, source, &tspec)
            }
        };

        match &outcome {
            AdmissionOutcome::Accepted { start, duration, blocks } => {
                tracing::info!(ts = %now, "-> ADDTS resp {} to {}: accepted at {} dur {} x{}", key, AidFmt(source), start, duration, blocks);
            }
            AdmissionOutcome::Rejected(reason) => {
                tracing::info!(ts = %now, "-> ADDTS resp {} to {}: rejected {:?}", key, AidFmt(source), reason);
            }
        }
        AdmissionResponse { key, tspec, outcome, decided: now }
    }

    ///////// SCHEDULE UPKEEP /////////

    /// Drops non-static allocations that have been announced and returns their airtime
    fn cleanup_allocations(&mut self, now: SimTime) {
        let purged = self.registry.purge_non_static_announced();
        for allocation in &purged {
            if let Err(e) = self.sched_ctx().release(allocation) {
                tracing::warn!(ts = %now, "{}: returning airtime failed: {:?}", allocation.key(), e);
            }
        }
        if !purged.is_empty() {
            tracing::debug!(ts = %now, "cleanup removed {} allocation(s)", purged.len());
        }
    }

    /// Refreshes the free DTI time. An empty registry resets the DTI to a single free slot.
    fn update_start_and_remaining_time(&mut self) {
        let dti = self.timing.dti_duration;
        if self.registry.is_empty() {
            self.slots = FreeSlots::new(dti);
            self.remaining_dti_time = dti;
        } else {
            self.remaining_dti_time = self.slots.total_free();
        }
    }

    /// Rebuilds the free slots when the DTI length changes between intervals.
    /// Allocations that no longer fit are dropped.
    fn adjust_to_dti(&mut self, now: SimTime, dti: u32) {
        let guard = self.params.guard_time;
        for dropped in self.registry.remove_beyond(dti, guard) {
            tracing::warn!(ts = %now, "{} does not fit a DTI of {}, dropped", dropped.key(), dti);
        }
        self.slots = FreeSlots::rebuild(dti, self.registry.occupied_intervals(guard));
        self.update_start_and_remaining_time();
        self.finalize_schedule();
    }

    /// Copies the registry into the published schedule and adds one broadcast CBAP per free slot
    fn add_broadcast_cbap_allocations(&mut self) {
        let mut schedule: Vec<Allocation> = self.registry.iter().cloned().collect();
        for slot in self.slots.as_slice() {
            if slot.len() > MAX_CBAP_BLOCK_DURATION {
                tracing::debug!("broadcast CBAP at {} spans {} us, above the {} us block limit", slot.start, slot.len(), MAX_CBAP_BLOCK_DURATION);
            }
            schedule.push(Allocation::broadcast_cbap(slot.start, slot.len()));
        }
        schedule.sort_by_key(|a| a.start);
        self.published = schedule;
    }

    fn finalize_schedule(&mut self) {
        self.add_broadcast_cbap_allocations();
        self.registry.mark_all_announced();
    }

    ///////// COORDINATOR ALLOCATIONS /////////

    /// Beamforming training SP between the coordinator and a station, effective from the next beacon
    pub fn allocate_beamforming_sp(&mut self, peer: Aid, duration: u32, initiator_txss: bool, responder_txss: bool) -> Option<u32> {
        let coordinator = self.coordinator;
        match self.sched_ctx().allocate_beamforming_service_period(coordinator, peer, duration, initiator_txss, responder_txss) {
            Ok(start) => Some(start),
            Err(e) => {
                tracing::debug!("no room for beamforming SP with {}: {:?}", AidFmt(peer), e);
                None
            }
        }
    }

    /// Beamforming SP of the default length
    pub fn allocate_default_beamforming_sp(&mut self, peer: Aid, initiator_txss: bool, responder_txss: bool) -> Option<u32> {
        self.allocate_beamforming_sp(peer, DEFAULT_BF_SP_DURATION, initiator_txss, responder_txss)
    }

    ///////// ACCESSORS /////////

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn timing(&self) -> &CycleTiming {
        &self.timing
    }

    pub fn policy_kind(&self) -> PolicyKind {
        self.policy.kind()
    }

    pub fn registry(&self) -> &AllocationRegistry {
        &self.registry
    }

    pub fn slots(&self) -> &FreeSlots {
        &self.slots
    }

    pub fn published(&self) -> &[Allocation] {
        &self.published
    }

    pub fn remaining_dti_time(&self) -> u32 {
        self.remaining_dti_time
    }

    pub fn queued_requests(&self) -> usize {
        self.queue.len()
    }

    /// Responses decided at the last boundary, not yet delivered
    pub fn take_responses(&mut self) -> Vec<AdmissionResponse> {
        std::mem::take(&mut self.responses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmg_config::SchedConfig;
    use dmg_core::{AID_AP, AllocationFormat, AllocationInfo, AllocationKind};

    fn config(policy: PolicyKind) -> SharedConfig {
        let mut cfg = SchedConfig::new(policy);
        cfg.beacon.bi_duration = 100000;
        cfg.beacon.bti_duration = 50000;
        SharedConfig::from_config(cfg)
    }

    /// Runs the interval starting at `start` to its end, decisions land at `start + 100000`
    fn run_interval(s: &mut CycleScheduler, start: u64) {
        let mut next = s.beacon_interval_started(SimTime::from_us(start), AID_AP, 100000, 50000, 0);
        while let Some(n) = s.handle_phase_event(next.at, next.event) {
            next = n;
        }
    }

    fn tspec(id: u8, dur: u32, period: u16, is_static: bool) -> TrafficSpec {
        TrafficSpec {
            info: AllocationInfo {
                id,
                kind: AllocationKind::ServicePeriod,
                is_static,
                dest: AID_AP,
                format: AllocationFormat::Isochronous,
            },
            min_allocation: dur,
            max_allocation: dur,
            allocation_period: period,
            period_is_multiple_of_bi: false,
        }
    }

    #[test]
    fn test_transitions_without_ati() {
        let mut s = CycleScheduler::new(config(PolicyKind::Basic));
        assert_eq!(s.phase(), Phase::BeaconHeader);

        let t0 = SimTime::from_us(1000);
        let next = s.beacon_interval_started(t0, AID_AP, 100000, 50000, 0);
        assert_eq!(next, NextPhase { at: t0.add_us(50000), event: PhaseEvent::DataTransferStart });

        let next = s.handle_phase_event(next.at, next.event).unwrap();
        assert_eq!(s.phase(), Phase::DataTransfer);
        assert_eq!(next, NextPhase { at: t0.add_us(100000), event: PhaseEvent::BeaconIntervalEnd });
        assert_eq!(s.timing().dti_start, Some(t0.add_us(50000)));

        assert!(s.handle_phase_event(next.at, next.event).is_none());
        assert_eq!(s.phase(), Phase::BeaconHeader);
    }

    #[test]
    fn test_transitions_with_ati() {
        let mut s = CycleScheduler::new(config(PolicyKind::Basic));
        let next = s.beacon_interval_started(SimTime::ZERO, AID_AP, 100000, 50000, 5000);
        assert_eq!(next, NextPhase { at: SimTime::from_us(45000), event: PhaseEvent::AnnouncementStart });
        let next = s.handle_phase_event(next.at, next.event).unwrap();
        assert_eq!(s.phase(), Phase::Announcement);
        assert_eq!(next, NextPhase { at: SimTime::from_us(50000), event: PhaseEvent::DataTransferStart });
    }

    #[test]
    fn test_requests_wait_for_boundary() {
        let mut s = CycleScheduler::new(config(PolicyKind::Basic));
        let next = s.beacon_interval_started(SimTime::ZERO, AID_AP, 100000, 50000, 0);
        let end = s.handle_phase_event(next.at, next.event).unwrap();
        s.receive_addts_request(SimTime::from_us(60000), 1, tspec(1, 2000, 0, true));
        assert_eq!(s.queued_requests(), 1);
        assert!(s.registry().is_empty());

        assert!(s.handle_phase_event(end.at, end.event).is_none());
        assert_eq!(s.queued_requests(), 0);
        assert_eq!(s.registry().len(), 1);
        let responses = s.take_responses();
        assert_eq!(responses.len(), 1);
        assert!(responses[0].outcome.is_accepted());
        assert!(s.take_responses().is_empty());
    }

    #[test]
    fn test_invalid_tspec_rejected() {
        let mut s = CycleScheduler::new(config(PolicyKind::Periodic));
        let mut bad = tspec(1, 2000, 0, true);
        bad.min_allocation = 3000;
        s.receive_addts_request(SimTime::ZERO, 1, bad);
        run_interval(&mut s, 0);
        let responses = s.take_responses();
        assert!(matches!(responses[0].outcome, AdmissionOutcome::Rejected(RejectReason::InvalidTspec(_))));
        assert!(s.registry().is_empty());
    }

    #[test]
    fn test_delts_found_and_not_found() {
        let shared = config(PolicyKind::Basic);
        let mut s = CycleScheduler::new(shared.clone());
        s.receive_addts_request(SimTime::ZERO, 1, tspec(4, 2000, 0, true));
        run_interval(&mut s, 0);

        let resp = s.receive_delts_request(SimTime::from_us(150000), 1, 4, AID_AP);
        assert_eq!(resp.outcome, DeletionOutcome::Found);
        assert_eq!(s.slots().len(), 1);
        assert_eq!(s.slots().total_free(), 50000);

        let resp = s.receive_delts_request(SimTime::from_us(150001), 1, 4, AID_AP);
        assert_eq!(resp.outcome, DeletionOutcome::NotFound);
        assert_eq!(shared.state_read().deleted, 1);
    }

    #[test]
    fn test_dti_change_rebuilds_slots() {
        let mut s = CycleScheduler::new(config(PolicyKind::Basic));
        s.receive_addts_request(SimTime::ZERO, 1, tspec(1, 2000, 0, true));
        s.receive_addts_request(SimTime::ZERO, 2, tspec(1, 30000, 0, true));
        run_interval(&mut s, 0);
        assert_eq!(s.registry().len(), 2);

        // DTI shrinks from 50000 to 20000, the second allocation no longer fits
        s.beacon_interval_started(SimTime::from_us(100000), AID_AP, 100000, 80000, 0);
        assert_eq!(s.registry().len(), 1);
        assert_eq!(s.slots().dti(), 20000);
        assert_eq!(s.slots().total_free(), 20000 - 2010);
        assert_eq!(s.published().len(), 2);
    }

    #[test]
    fn test_beamforming_sp() {
        let mut s = CycleScheduler::new(config(PolicyKind::Basic));
        let start = s.allocate_beamforming_sp(3, 2000, true, false);
        assert_eq!(start, Some(0));
        let a = &s.registry().as_slice()[0];
        assert!(a.bf_control.is_some());
        assert!(!a.is_static);
        assert_eq!(s.slots().as_slice()[0].start, 3010);
    }

    #[test]
    fn test_default_beamforming_sp() {
        let mut s = CycleScheduler::new(config(PolicyKind::Basic));
        assert_eq!(s.allocate_default_beamforming_sp(5, false, true), Some(0));
        let a = &s.registry().as_slice()[0];
        assert_eq!(a.block_duration, DEFAULT_BF_SP_DURATION);
        assert_eq!(a.dest, 5);
        assert_eq!(s.slots().as_slice()[0].start, DEFAULT_BF_SP_DURATION + 1000 + 10);
    }

    #[test]
    fn test_gap_cbap_above_block_limit_published_whole() {
        let mut cfg = SchedConfig::new(PolicyKind::Basic);
        cfg.beacon.bi_duration = 102400;
        cfg.beacon.bti_duration = 1000;
        let s = CycleScheduler::new(SharedConfig::from_config(cfg));
        assert_eq!(s.published().len(), 1);
        assert_eq!(s.published()[0].start, 0);
        assert_eq!(s.published()[0].block_duration, 101400);
        assert!(s.published()[0].block_duration > MAX_CBAP_BLOCK_DURATION);
    }

    #[test]
    fn test_out_of_order_events_ignored() {
        let shared = config(PolicyKind::Basic);
        let mut s = CycleScheduler::new(shared.clone());
        s.receive_addts_request(SimTime::ZERO, 1, tspec(1, 2000, 0, true));

        // Nothing pending before the first interval starts
        assert_eq!(s.handle_phase_event(SimTime::from_us(100000), PhaseEvent::BeaconIntervalEnd), None);
        assert_eq!(s.phase(), Phase::BeaconHeader);
        assert_eq!(s.queued_requests(), 1);
        assert_eq!(shared.state_read().cycles, 0);

        // Boundary fired while the DTI start is pending
        let dti = s.beacon_interval_started(SimTime::ZERO, AID_AP, 100000, 50000, 0);
        let ret = s.handle_phase_event(SimTime::from_us(100000), PhaseEvent::BeaconIntervalEnd);
        assert_eq!(ret, Some(dti));
        assert_eq!(s.phase(), Phase::BeaconHeader);
        assert_eq!(s.queued_requests(), 1);
        assert!(s.registry().is_empty());
        assert_eq!(shared.state_read().cycles, 0);

        // Right event, too early
        assert_eq!(s.handle_phase_event(SimTime::from_us(49999), PhaseEvent::DataTransferStart), Some(dti));
        assert_eq!(s.phase(), Phase::BeaconHeader);
        assert_eq!(s.timing().dti_start, None);

        // ATI start not announced for this interval
        assert_eq!(s.handle_phase_event(dti.at, PhaseEvent::AnnouncementStart), Some(dti));
        assert_eq!(s.phase(), Phase::BeaconHeader);

        let end = s.handle_phase_event(dti.at, dti.event).unwrap();
        assert_eq!(s.pending_transition(), Some(end));
        assert_eq!(s.handle_phase_event(end.at, PhaseEvent::DataTransferStart), Some(end));
        assert_eq!(s.phase(), Phase::DataTransfer);

        assert_eq!(s.handle_phase_event(end.at, end.event), None);
        assert_eq!(s.registry().len(), 1);
        assert_eq!(shared.state_read().cycles, 1);
        assert_eq!(s.pending_transition(), None);

        // Repeated boundary after the interval is over
        assert_eq!(s.handle_phase_event(end.at, PhaseEvent::BeaconIntervalEnd), None);
        assert_eq!(s.handle_phase_event(end.at, PhaseEvent::DataTransferStart), None);
        assert_eq!(s.phase(), Phase::BeaconHeader);
        assert_eq!(shared.state_read().cycles, 1);
        assert_eq!(s.take_responses().len(), 1);
    }
}
