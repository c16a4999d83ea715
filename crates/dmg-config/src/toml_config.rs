use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;
use toml::Value;

use dmg_core::{Aid, AllocationId, AllocationKind};

use super::sched_config::{CfgBeacon, CfgScheduler, CfgStaticAllocation, PolicyKind, SchedConfig, SchedState, SharedConfig};
use super::sched_config_scenario::{CfgScenarioDto, apply_scenario_patch};

/// Build `SharedConfig` from a TOML configuration file
pub fn from_toml_str(toml_str: &str) -> Result<SharedConfig, Box<dyn std::error::Error>> {
    let root: TomlConfigRoot = toml::from_str(toml_str)?;

    // Various sanity checks
    let expected_config_version = "0.1";
    if !root.config_version.eq(expected_config_version) {
        return Err(format!(
            "Unrecognized config_version: {}, expect {}",
            root.config_version, expected_config_version
        )
        .into());
    }
    if !root.extra.is_empty() {
        return Err(format!("Unrecognized top-level fields: {:?}", sorted_keys(&root.extra)).into());
    }
    if let Some(ref beacon) = root.beacon {
        if !beacon.extra.is_empty() {
            return Err(format!("Unrecognized fields in beacon: {:?}", sorted_keys(&beacon.extra)).into());
        }
    }
    if let Some(ref sched) = root.scheduler {
        if !sched.extra.is_empty() {
            return Err(format!("Unrecognized fields in scheduler: {:?}", sorted_keys(&sched.extra)).into());
        }
    }
    for (i, sa) in root.static_allocation.iter().enumerate() {
        if !sa.extra.is_empty() {
            return Err(format!("Unrecognized fields in static_allocation[{}]: {:?}", i, sorted_keys(&sa.extra)).into());
        }
    }
    if let Some(ref scenario) = root.scenario {
        if !scenario.extra.is_empty() {
            return Err(format!("Unrecognized fields in scenario: {:?}", sorted_keys(&scenario.extra)).into());
        }
    }

    // Build config from required and optional values
    let mut cfg = SchedConfig {
        debug_log: root.debug_log,
        beacon: CfgBeacon::default(),
        scheduler: CfgScheduler::default(),
        static_allocations: Vec::with_capacity(root.static_allocation.len()),
        scenario: None,
    };

    if let Some(beacon) = root.beacon {
        apply_beacon_patch(&mut cfg.beacon, beacon);
    }

    if let Some(sched) = root.scheduler {
        apply_scheduler_patch(&mut cfg.scheduler, sched);
    }

    for sa in root.static_allocation {
        cfg.static_allocations.push(CfgStaticAllocation {
            id: sa.id,
            kind: sa.kind,
            source: sa.source_aid,
            dest: sa.dest_aid,
            start: sa.start_us,
            block_duration: sa.block_duration_us,
            blocks: sa.blocks,
        });
    }

    if let Some(scenario) = root.scenario {
        cfg.scenario = Some(apply_scenario_patch(scenario)?);
    }

    // Report validation problems as an error here, SharedConfig::from_parts would panic
    if let Err(e) = cfg.validate() {
        return Err(format!("Invalid configuration: {}", e).into());
    }

    Ok(SharedConfig::from_parts(cfg, SchedState::default()))
}

/// Build `SharedConfig` from any reader.
pub fn from_reader<R: Read>(reader: R) -> Result<SharedConfig, Box<dyn std::error::Error>> {
    let mut contents = String::new();
    let mut reader = BufReader::new(reader);
    reader.read_to_string(&mut contents)?;
    from_toml_str(&contents)
}

/// Build `SharedConfig` from a file path.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<SharedConfig, Box<dyn std::error::Error>> {
    let f = File::open(path)?;
    let r = BufReader::new(f);
    let cfg = from_reader(r)?;
    Ok(cfg)
}

fn apply_beacon_patch(dst: &mut CfgBeacon, src: BeaconDto) {
    if let Some(v) = src.coordinator_aid {
        dst.coordinator_aid = v;
    }
    if let Some(v) = src.bi_duration_us {
        dst.bi_duration = v;
    }
    if let Some(v) = src.bti_duration_us {
        dst.bti_duration = v;
    }
    if let Some(v) = src.abft_duration_us {
        dst.abft_duration = v;
    }
    if let Some(v) = src.ati_duration_us {
        dst.ati_duration = v;
    }
}

fn apply_scheduler_patch(dst: &mut CfgScheduler, src: SchedulerDto) {
    dst.policy = src.policy;

    if let Some(v) = src.guard_time_us {
        dst.guard_time = v;
    }
    if let Some(v) = src.min_broadcast_cbap_us {
        dst.min_broadcast_cbap = v;
    }
    if let Some(v) = src.max_blocks {
        dst.max_blocks = v;
    }
}

fn sorted_keys(map: &HashMap<String, Value>) -> Vec<&str> {
    let mut v: Vec<&str> = map.keys().map(|s| s.as_str()).collect();
    v.sort_unstable();
    v
}

/// ----------------------- DTOs for input shape -----------------------

#[derive(Deserialize)]
struct TomlConfigRoot {
    config_version: String,
    debug_log: Option<String>,

    #[serde(default)]
    beacon: Option<BeaconDto>,

    #[serde(default)]
    scheduler: Option<SchedulerDto>,

    #[serde(default)]
    static_allocation: Vec<StaticAllocationDto>,

    #[serde(default)]
    scenario: Option<CfgScenarioDto>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Default, Deserialize)]
struct BeaconDto {
    pub coordinator_aid: Option<Aid>,
    pub bi_duration_us: Option<u32>,
    pub bti_duration_us: Option<u32>,
    pub abft_duration_us: Option<u32>,
    pub ati_duration_us: Option<u32>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct SchedulerDto {
    pub policy: PolicyKind,
    pub guard_time_us: Option<u32>,
    pub min_broadcast_cbap_us: Option<u32>,
    pub max_blocks: Option<u8>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct StaticAllocationDto {
    pub id: AllocationId,
    pub kind: AllocationKind,
    pub source_aid: Aid,
    pub dest_aid: Aid,
    pub start_us: u32,
    pub block_duration_us: u32,
    #[serde(default = "default_static_blocks")]
    pub blocks: u8,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

fn default_static_blocks() -> u8 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CONFIG: &str = r#"
config_version = "0.1"

[beacon]
coordinator_aid = 0
bi_duration_us = 100000
bti_duration_us = 40000
abft_duration_us = 5000
ati_duration_us = 5000

[scheduler]
policy = "Basic"
guard_time_us = 20
min_broadcast_cbap_us = 1000
max_blocks = 16

[[static_allocation]]
id = 1
kind = "ServicePeriod"
source_aid = 0
dest_aid = 3
start_us = 0
block_duration_us = 2000

[scenario]
seed = 7

[[scenario.request]]
source_aid = 1
dest_aid = 0
allocation_id = 2
min_us = 500
max_us = 500
period = 10
submit_in_bi = 1
delete_in_bi = 4
"#;

    #[test]
    fn test_full_config() {
        let shared = from_toml_str(FULL_CONFIG).unwrap();
        let cfg = shared.config();
        assert_eq!(cfg.beacon.bhi_duration(), 50000);
        assert_eq!(cfg.beacon.dti_duration(), 50000);
        assert_eq!(cfg.scheduler.policy, PolicyKind::Basic);
        assert_eq!(cfg.scheduler.guard_time, 20);
        assert_eq!(cfg.scheduler.max_blocks, 16);
        assert_eq!(cfg.static_allocations.len(), 1);
        assert_eq!(cfg.static_allocations[0].blocks, 1);

        let scenario = cfg.scenario.as_ref().unwrap();
        assert_eq!(scenario.seed, Some(7));
        assert_eq!(scenario.requests.len(), 1);
        let r = &scenario.requests[0];
        assert_eq!(r.period, 10);
        assert!(!r.is_static);
        assert_eq!(r.delete_in_bi, Some(4));
        assert_eq!(r.to_tspec().desired_duration(), 500);
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let shared = from_toml_str("config_version = \"0.1\"\n").unwrap();
        let cfg = shared.config();
        assert_eq!(cfg.scheduler.policy, PolicyKind::Periodic);
        assert_eq!(cfg.scheduler.min_broadcast_cbap, 4096);
        assert_eq!(cfg.beacon.bi_duration, 102400);
        assert!(cfg.scenario.is_none());
    }

    #[test]
    fn test_wrong_version() {
        let err = from_toml_str("config_version = \"0.5\"\n").err().unwrap();
        assert!(err.to_string().contains("Unrecognized config_version"));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let toml = "config_version = \"0.1\"\n[scheduler]\npolicy = \"Basic\"\nguard = 3\n";
        let err = from_toml_str(toml).err().unwrap();
        assert!(err.to_string().contains("scheduler"), "{}", err);

        let toml = "config_version = \"0.1\"\nfoo = 1\n";
        assert!(from_toml_str(toml).is_err());

        let toml = "config_version = \"0.1\"\n[[scenario.request]]\nsource_aid = 1\ndest_aid = 2\nallocation_id = 1\nmin_us = 1\nmax_us = 1\nbogus = true\n";
        let err = from_toml_str(toml).err().unwrap();
        assert!(err.to_string().contains("bogus"), "{}", err);
    }

    #[test]
    fn test_invalid_config_is_error_not_panic() {
        let toml = "config_version = \"0.1\"\n[beacon]\nbi_duration_us = 1000\nbti_duration_us = 2000\n";
        let err = from_toml_str(toml).err().unwrap();
        assert!(err.to_string().starts_with("Invalid configuration"));
    }
}
