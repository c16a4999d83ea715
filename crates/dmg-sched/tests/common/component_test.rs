use dmg_config::{PolicyKind, SchedConfig, SchedState, SharedConfig};
use dmg_core::{AID_AP, Allocation, AllocationFormat, AllocationId, AllocationInfo, AllocationKind, SimTime, TrafficSpec};
use dmg_sched::{AdmissionResponse, CycleDriver, DeletionResponse};

use super::sink::{Record, Sink};

/// Creates a default config for testing: 100 ms beacon interval with a 50 ms header,
/// leaving a 50 ms DTI. It can still be modified as needed before passing it to the
/// ComponentTest constructor
pub fn default_test_config(policy: PolicyKind) -> SchedConfig {
    let mut cfg = SchedConfig::new(policy);
    cfg.beacon.bi_duration = 100000;
    cfg.beacon.bti_duration = 50000;
    cfg.beacon.abft_duration = 0;
    cfg.beacon.ati_duration = 0;
    cfg
}

/// SP request towards the AP
pub fn sp_request(id: AllocationId, min: u32, max: u32, period: u16, is_static: bool) -> TrafficSpec {
    TrafficSpec {
        info: AllocationInfo {
            id,
            kind: AllocationKind::ServicePeriod,
            is_static,
            dest: AID_AP,
            format: if period > 0 { AllocationFormat::Isochronous } else { AllocationFormat::Asynchronous },
        },
        min_allocation: min,
        max_allocation: max,
        allocation_period: period,
        period_is_multiple_of_bi: false,
    }
}

/// Infrastructure for testing the scheduler end to end
/// Wraps a CycleDriver with a collecting sink registered
pub struct ComponentTest {
    pub config: SharedConfig,
    pub driver: CycleDriver,
    sinks: Vec<usize>,
}

impl ComponentTest {
    pub fn new(config: SchedConfig) -> Self {
        let shared_config = SharedConfig::from_parts(config, SchedState::default());
        let mut driver = CycleDriver::new(shared_config.clone());
        let sink = driver.register_sink(Box::new(Sink::new()));

        Self {
            config: shared_config,
            driver,
            sinks: vec![sink],
        }
    }

    /// Submits an ADDTS request `offset` microseconds into the DTI of beacon interval `bi`
    pub fn submit_addts_in_dti(&mut self, bi: u64, offset: u32, source: u8, tspec: TrafficSpec) {
        let (dti_start, _) = self.driver.dti_window(bi);
        self.driver.submit_addts_at(dti_start.add_us(offset), source, tspec);
    }

    pub fn submit_delts_in_dti(&mut self, bi: u64, offset: u32, source: u8, id: AllocationId, dest: u8) {
        let (dti_start, _) = self.driver.dti_window(bi);
        self.driver.submit_delts_at(dti_start.add_us(offset), source, id, dest);
    }

    pub fn run_cycles(&mut self, num_cycles: Option<usize>) -> usize {
        self.driver.run_cycles(num_cycles, None)
    }

    pub fn dump_sinks(&mut self) -> Vec<Record> {
        let mut records = vec![];
        for idx in self.sinks.iter() {
            if let Some(component) = self.driver.get_sink(*idx) {
                if let Some(sink) = component.as_any_mut().downcast_mut::<Sink>() {
                    let mut sink_records = sink.take_records();
                    records.append(&mut sink_records);
                }
            }
        }
        records
    }

    /// Dumps the sinks and splits the records by kind
    pub fn dump_split(&mut self) -> (Vec<(SimTime, Vec<Allocation>)>, Vec<AdmissionResponse>, Vec<DeletionResponse>) {
        let mut schedules = vec![];
        let mut admissions = vec![];
        let mut deletions = vec![];
        for record in self.dump_sinks() {
            match record {
                Record::Schedule { ts, schedule } => schedules.push((ts, schedule)),
                Record::Admission { response, .. } => admissions.push(response),
                Record::Deletion { response, .. } => deletions.push(response),
            }
        }
        (schedules, admissions, deletions)
    }
}
