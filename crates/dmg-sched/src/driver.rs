use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dmg_config::SharedConfig;
use dmg_core::{Aid, AllocationId, SimTime, TrafficSpec};

use crate::cycle::{CycleScheduler, NextPhase};
use crate::sink_trait::ScheduleSink;

/// Station frame waiting for its arrival time
#[derive(Debug, Clone)]
pub enum Arrival {
    Addts { source: Aid, tspec: TrafficSpec },
    Delts { source: Aid, id: AllocationId, dest: Aid },
}

#[derive(Debug)]
struct PendingArrival {
    at: SimTime,
    seq: u64,
    arrival: Arrival,
}

/// Drives a CycleScheduler through consecutive beacon intervals of the configured timing.
/// Station frames submitted ahead of time are handed to the scheduler at their arrival
/// time, and everything the scheduler produces is passed on to the registered sinks.
pub struct CycleDriver {
    config: SharedConfig,
    scheduler: CycleScheduler,
    sinks: Vec<Box<dyn ScheduleSink>>,

    /// Sorted by (at, seq)
    arrivals: VecDeque<PendingArrival>,
    next_seq: u64,

    now: SimTime,
    /// Index of the next beacon interval to run
    bi_index: u64,
}

impl CycleDriver {
    pub fn new(config: SharedConfig) -> Self {
        Self {
            scheduler: CycleScheduler::new(config.clone()),
            config,
            sinks: vec![],
            arrivals: VecDeque::new(),
            next_seq: 0,
            now: SimTime::ZERO,
            bi_index: 0,
        }
    }

    /// Returns the index of the sink, for later retrieval through `get_sink`
    pub fn register_sink(&mut self, sink: Box<dyn ScheduleSink>) -> usize {
        self.sinks.push(sink);
        tracing::debug!("register_sink #{}", self.sinks.len() - 1);
        self.sinks.len() - 1
    }

    pub fn get_sink(&mut self, idx: usize) -> Option<&mut dyn ScheduleSink> {
        self.sinks.get_mut(idx).map(|sink| sink.as_mut())
    }

    pub fn scheduler(&self) -> &CycleScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut CycleScheduler {
        &mut self.scheduler
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Number of beacon intervals completed so far
    pub fn cycles_run(&self) -> u64 {
        self.bi_index
    }

    /// Start time of beacon interval `k`
    pub fn bi_start_time(&self, k: u64) -> SimTime {
        SimTime::from_us(k * self.config.config().beacon.bi_duration as u64)
    }

    /// Start and end of the DTI of beacon interval `k`
    pub fn dti_window(&self, k: u64) -> (SimTime, SimTime) {
        let cfg = self.config.config();
        let beacon = &cfg.beacon;
        let bi_start = self.bi_start_time(k);
        (bi_start.add_us(beacon.bhi_duration()), bi_start.add_us(beacon.bi_duration))
    }

    pub fn submit_addts_at(&mut self, at: SimTime, source: Aid, tspec: TrafficSpec) {
        self.submit_at(at, Arrival::Addts { source, tspec });
    }

    pub fn submit_delts_at(&mut self, at: SimTime, source: Aid, id: AllocationId, dest: Aid) {
        self.submit_at(at, Arrival::Delts { source, id, dest });
    }

    pub fn pending_arrivals(&self) -> usize {
        self.arrivals.len()
    }

    fn submit_at(&mut self, at: SimTime, arrival: Arrival) {
        if at < self.now {
            tracing::warn!("arrival at {} lies before now {}, delivered late", at, self.now);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        let idx = self.arrivals.partition_point(|p| (p.at, p.seq) <= (at, seq));
        self.arrivals.insert(idx, PendingArrival { at, seq, arrival });
    }

    /// Hands every arrival strictly before `t` to the scheduler. A frame arriving exactly
    /// at a transition is handled after it.
    fn deliver_arrivals_until(&mut self, t: SimTime) {
        while self.arrivals.front().is_some_and(|p| p.at < t) {
            let Some(pending) = self.arrivals.pop_front() else {
                break;
            };
            let at = pending.at.max(self.now);
            match pending.arrival {
                Arrival::Addts { source, tspec } => {
                    self.scheduler.receive_addts_request(at, source, tspec);
                }
                Arrival::Delts { source, id, dest } => {
                    let response = self.scheduler.receive_delts_request(at, source, id, dest);
                    for sink in self.sinks.iter_mut() {
                        sink.on_deletion(at, &response);
                    }
                }
            }
        }
    }

    fn start_beacon_interval(&mut self, now: SimTime) -> NextPhase {
        let beacon = self.config.config().beacon.clone();
        let next = self.scheduler.beacon_interval_started(
            now,
            beacon.coordinator_aid,
            beacon.bi_duration,
            beacon.bhi_duration(),
            beacon.ati_duration,
        );
        let schedule = self.scheduler.published();
        for sink in self.sinks.iter_mut() {
            sink.on_schedule_published(now, schedule);
        }
        next
    }

    /// Runs one complete beacon interval, from its start to the processing at its end
    pub fn run_cycle(&mut self) {
        let start = self.bi_start_time(self.bi_index);
        self.deliver_arrivals_until(start);
        self.now = start;

        let mut next = self.start_beacon_interval(start);
        loop {
            self.deliver_arrivals_until(next.at);
            self.now = next.at;
            match self.scheduler.handle_phase_event(next.at, next.event) {
                Some(n) => next = n,
                None => break,
            }
        }

        let responses = self.scheduler.take_responses();
        for response in &responses {
            for sink in self.sinks.iter_mut() {
                sink.on_admission_response(self.now, response);
            }
        }
        self.bi_index += 1;
    }

    /// Runs beacon intervals until `num_cycles` have completed, or forever if None.
    /// Clearing `running` stops after the interval in progress. Returns the number of intervals run.
    pub fn run_cycles(&mut self, num_cycles: Option<usize>, running: Option<Arc<AtomicBool>>) -> usize {
        let mut cycles: usize = 0;

        loop {
            if let Some(running) = &running {
                if !running.load(Ordering::SeqCst) {
                    tracing::info!("stop requested after {} beacon interval(s)", cycles);
                    break;
                }
            }

            self.run_cycle();

            cycles += 1;
            if let Some(num_cycles) = num_cycles {
                if cycles >= num_cycles {
                    break;
                }
            }
        }
        cycles
    }
}
