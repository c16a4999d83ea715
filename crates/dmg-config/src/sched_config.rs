use serde::Deserialize;
use std::sync::{Arc, RwLock};

use dmg_core::{AID_AP, Aid, AllocationId, AllocationKind, MAX_NUM_BLOCKS};

use crate::sched_config_scenario::CfgScenario;

/// Admission policy run at the end of each beacon interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PolicyKind {
    /// Reject everything, the whole DTI is a broadcast CBAP
    CbapOnly,
    /// First-fit, single block allocations only
    Basic,
    /// First-fit for single blocks, equally spaced blocks for periodic requests
    Periodic,
}

/// Beacon interval timing. All durations in microseconds.
#[derive(Debug, Clone)]
pub struct CfgBeacon {
    /// AID the coordinator uses when it addresses itself
    pub coordinator_aid: Aid,
    pub bi_duration: u32,
    pub bti_duration: u32,
    pub abft_duration: u32,
    /// 0 disables the announcement transmission interval
    pub ati_duration: u32,
}

impl Default for CfgBeacon {
    fn default() -> Self {
        Self {
            coordinator_aid: AID_AP,
            bi_duration: default_bi_duration(),
            bti_duration: 1000,
            abft_duration: 0,
            ati_duration: 0,
        }
    }
}

impl CfgBeacon {
    /// Beacon header interval, BTI + A-BFT + ATI
    pub fn bhi_duration(&self) -> u32 {
        self.bti_duration + self.abft_duration + self.ati_duration
    }

    pub fn dti_duration(&self) -> u32 {
        self.bi_duration.saturating_sub(self.bhi_duration())
    }
}

#[inline]
fn default_bi_duration() -> u32 {
    102400
}

#[derive(Debug, Clone)]
pub struct CfgScheduler {
    pub policy: PolicyKind,
    /// Idle time kept after every allocation block
    pub guard_time: u32,
    /// Free airtime every periodic request must leave between its blocks
    pub min_broadcast_cbap: u32,
    /// Upper bound on blocks of a single periodic allocation
    pub max_blocks: u8,
}

impl Default for CfgScheduler {
    fn default() -> Self {
        Self {
            policy: PolicyKind::Periodic,
            guard_time: 10,
            min_broadcast_cbap: 4096,
            max_blocks: MAX_NUM_BLOCKS,
        }
    }
}

/// Allocation registered by the coordinator at activation, outside of ADDTS
#[derive(Debug, Clone)]
pub struct CfgStaticAllocation {
    pub id: AllocationId,
    pub kind: AllocationKind,
    pub source: Aid,
    pub dest: Aid,
    pub start: u32,
    pub block_duration: u32,
    /// Back-to-back blocks
    pub blocks: u8,
}

#[derive(Debug, Clone)]
pub struct SchedConfig {
    pub debug_log: Option<String>,
    pub beacon: CfgBeacon,
    pub scheduler: CfgScheduler,
    pub static_allocations: Vec<CfgStaticAllocation>,
    /// Only used by the simulator
    pub scenario: Option<CfgScenario>,
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self::new(PolicyKind::Periodic)
    }
}

impl SchedConfig {
    pub fn new(policy: PolicyKind) -> Self {
        SchedConfig {
            debug_log: None,
            beacon: CfgBeacon::default(),
            scheduler: CfgScheduler { policy, ..CfgScheduler::default() },
            static_allocations: vec![],
            scenario: None,
        }
    }

    /// Validate that all required configuration fields are properly set.
    pub fn validate(&self) -> Result<(), &str> {
        let b = &self.beacon;
        if b.bi_duration == 0 {
            return Err("beacon interval duration must be nonzero");
        }
        if b.bhi_duration() >= b.bi_duration {
            return Err("beacon header interval must be shorter than the beacon interval");
        }
        let dti = b.dti_duration();

        let s = &self.scheduler;
        if s.guard_time >= dti {
            return Err("guard time must be shorter than the data transfer interval");
        }
        if s.max_blocks == 0 {
            return Err("max_blocks must be at least 1");
        }

        // Static allocations must fit the DTI and must not overlap, guard time included
        let mut spans: Vec<(u32, u32)> = Vec::with_capacity(self.static_allocations.len());
        for a in &self.static_allocations {
            if a.blocks == 0 || a.block_duration == 0 {
                return Err("static allocation must have at least one nonempty block");
            }
            if a.block_duration > a.kind.max_block_duration() {
                return Err("static allocation block duration exceeds the field ceiling");
            }
            let end = a.start as u64 + a.block_duration as u64 * a.blocks as u64 + s.guard_time as u64;
            if end > dti as u64 {
                return Err("static allocation does not fit the data transfer interval");
            }
            spans.push((a.start, end as u32));
        }
        spans.sort_unstable();
        for pair in spans.windows(2) {
            if pair[1].0 < pair[0].1 {
                return Err("static allocations overlap");
            }
        }

        if let Some(ref scenario) = self.scenario {
            scenario.validate()?;
        }

        Ok(())
    }
}

/// Statistics kept while the scheduler runs (lock-protected).
#[derive(Debug, Clone, Default)]
pub struct SchedState {
    /// Completed beacon intervals
    pub cycles: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub deleted: u64,
}

/// Global shared configuration: immutable config + mutable state.
#[derive(Clone)]
pub struct SharedConfig {
    /// Read-only configuration (immutable after construction).
    cfg: Arc<SchedConfig>,
    /// Mutable state guarded with RwLock (write by the scheduler, read by others).
    state: Arc<RwLock<SchedState>>,
}

impl SharedConfig {
    pub fn new(policy: PolicyKind) -> Self {
        Self::from_config(SchedConfig::new(policy))
    }

    pub fn from_config(cfg: SchedConfig) -> Self {
        Self::from_parts(cfg, SchedState::default())
    }

    pub fn from_parts(cfg: SchedConfig, state: SchedState) -> Self {
        // Check config for validity before returning the SharedConfig object
        match cfg.validate() {
            Ok(_) => {}
            Err(e) => panic!("Invalid scheduler configuration: {}", e),
        }

        Self {
            cfg: Arc::new(cfg),
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Access immutable config.
    pub fn config(&self) -> Arc<SchedConfig> {
        Arc::clone(&self.cfg)
    }

    /// Read guard for mutable state.
    pub fn state_read(&self) -> std::sync::RwLockReadGuard<'_, SchedState> {
        self.state.read().expect("SchedState RwLock blocked")
    }

    /// Write guard for mutable state.
    pub fn state_write(&self) -> std::sync::RwLockWriteGuard<'_, SchedState> {
        self.state.write().expect("SchedState RwLock blocked")
    }
}
