use dmg_config::PolicyKind;
use dmg_core::{Aid, TrafficSpec};

use super::{AdmissionOutcome, AdmissionPolicy, RejectReason};
use crate::sched_ctx::SchedCtx;

/// First-fit, one block per request
pub struct BasicPolicy;

impl AdmissionPolicy for BasicPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Basic
    }

    fn add_new_allocation(&mut self, ctx: &mut SchedCtx, source: Aid, tspec: &TrafficSpec) -> AdmissionOutcome {
        if tspec.is_periodic() {
            tracing::debug!("periodic request (period {}) from {} not supported", tspec.allocation_period, source);
            return AdmissionOutcome::Rejected(RejectReason::PeriodicNotSupported);
        }
        let duration = tspec.desired_duration();
        self.allocate_single_block(ctx, source, tspec, duration)
    }
}
