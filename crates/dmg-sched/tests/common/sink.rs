use dmg_core::{Allocation, SimTime};
use dmg_sched::{AdmissionResponse, DeletionResponse, ScheduleSink};

#[derive(Debug, Clone)]
pub enum Record {
    Schedule { ts: SimTime, schedule: Vec<Allocation> },
    Admission { ts: SimTime, response: AdmissionResponse },
    Deletion { ts: SimTime, response: DeletionResponse },
}

/// Schedule sink for testing purposes
/// Collects everything the driver hands out for later inspection
pub struct Sink {
    records: Vec<Record>,
}

impl Sink {
    pub fn new() -> Self {
        Self { records: vec![] }
    }

    pub fn take_records(&mut self) -> Vec<Record> {
        std::mem::take(&mut self.records)
    }
}

impl ScheduleSink for Sink {
    fn on_schedule_published(&mut self, ts: SimTime, schedule: &[Allocation]) {
        tracing::debug!(ts = %ts, "schedule: {} allocation(s)", schedule.len());
        self.records.push(Record::Schedule { ts, schedule: schedule.to_vec() });
    }

    fn on_admission_response(&mut self, ts: SimTime, response: &AdmissionResponse) {
        tracing::debug!(ts = %ts, "admission: {:?}", response);
        self.records.push(Record::Admission { ts, response: response.clone() });
    }

    fn on_deletion(&mut self, ts: SimTime, response: &DeletionResponse) {
        tracing::debug!(ts = %ts, "deletion: {:?}", response);
        self.records.push(Record::Deletion { ts, response: response.clone() });
    }
}
