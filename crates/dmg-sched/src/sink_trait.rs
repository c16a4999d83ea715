use as_any::AsAny;
use dmg_core::{Allocation, SimTime};

use crate::cycle::{AdmissionResponse, DeletionResponse};

/// Consumer of what the scheduler hands to the outside world: the schedule carried by each
/// beacon, ADDTS responses and DELTS results.
/// Registered with the CycleDriver, which calls it in registration order.
pub trait ScheduleSink: AsAny {
    /// Called at the start of each beacon interval with the schedule it announces
    fn on_schedule_published(&mut self, ts: SimTime, schedule: &[Allocation]);

    /// Called for every ADDTS request decided at the end of a beacon interval
    fn on_admission_response(&mut self, _ts: SimTime, _response: &AdmissionResponse) {}

    fn on_deletion(&mut self, _ts: SimTime, _response: &DeletionResponse) {}
}
