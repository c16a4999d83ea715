use dmg_config::PolicyKind;
use dmg_core::{Aid, TrafficSpec};

use super::{AdmissionOutcome, AdmissionPolicy, RejectReason};
use crate::sched_ctx::SchedCtx;

/// Grants nothing, the whole DTI stays one broadcast CBAP
pub struct CbapOnlyPolicy;

impl AdmissionPolicy for CbapOnlyPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::CbapOnly
    }

    fn add_new_allocation(&mut self, _ctx: &mut SchedCtx, source: Aid, tspec: &TrafficSpec) -> AdmissionOutcome {
        tracing::debug!("cbap only, refusing #{} from {}", tspec.info.id, source);
        AdmissionOutcome::Rejected(RejectReason::CbapOnly)
    }

    fn modify_existing_allocation(&mut self, _ctx: &mut SchedCtx, _source: Aid, _tspec: &TrafficSpec) -> AdmissionOutcome {
        AdmissionOutcome::Rejected(RejectReason::CbapOnly)
    }
}
