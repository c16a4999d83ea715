use std::collections::VecDeque;

use dmg_core::{Aid, SimTime, TrafficSpec};

/// ADDTS request waiting for the end of the beacon interval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionRequest {
    pub source: Aid,
    pub tspec: TrafficSpec,
    /// Arrival time, for logging only
    pub received: SimTime,
}

/// Admission requests collected during one DTI, handled in arrival order at its end
#[derive(Debug, Default)]
pub struct RequestQueue {
    requests: VecDeque<AdmissionRequest>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: AdmissionRequest) {
        self.requests.push_back(request);
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Takes all queued requests, oldest first, leaving the queue empty
    pub fn drain(&mut self) -> impl Iterator<Item = AdmissionRequest> + '_ {
        self.requests.drain(..)
    }

    pub fn clear(&mut self) {
        self.requests.clear();
    }
}
