use std::collections::HashMap;

use serde::Deserialize;
use toml::Value;

use dmg_core::{Aid, AllocationFormat, AllocationId, AllocationInfo, AllocationKind, TrafficSpec};

/// A station that sends an ADDTS request in a given beacon interval,
/// and optionally tears the allocation down later with a DELTS.
#[derive(Debug, Clone)]
pub struct CfgScenarioRequest {
    pub source: Aid,
    pub dest: Aid,
    pub allocation_id: AllocationId,
    pub kind: AllocationKind,
    pub min_duration: u32,
    pub max_duration: u32,
    pub period: u16,
    pub format: AllocationFormat,
    pub is_static: bool,
    /// Index of the beacon interval whose DTI carries the request
    pub submit_in_bi: u32,
    pub delete_in_bi: Option<u32>,
}

impl CfgScenarioRequest {
    pub fn to_tspec(&self) -> TrafficSpec {
        TrafficSpec {
            info: AllocationInfo {
                id: self.allocation_id,
                kind: self.kind,
                is_static: self.is_static,
                dest: self.dest,
                format: self.format,
            },
            min_allocation: self.min_duration,
            max_allocation: self.max_duration,
            allocation_period: self.period,
            period_is_multiple_of_bi: false,
        }
    }
}

/// Scripted traffic for the simulator
#[derive(Debug, Clone, Default)]
pub struct CfgScenario {
    /// Seed for placing arrivals inside the DTI. Random if absent.
    pub seed: Option<u64>,
    pub requests: Vec<CfgScenarioRequest>,
}

impl CfgScenario {
    pub fn validate(&self) -> Result<(), &'static str> {
        for r in &self.requests {
            if let Some(del) = r.delete_in_bi {
                if del < r.submit_in_bi {
                    return Err("scenario request deleted before it is submitted");
                }
            }
        }
        Ok(())
    }
}

#[derive(Default, Deserialize)]
pub struct CfgScenarioDto {
    pub seed: Option<u64>,

    #[serde(default)]
    pub request: Vec<ScenarioRequestDto>,

    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
pub struct ScenarioRequestDto {
    pub source_aid: Aid,
    pub dest_aid: Aid,
    pub allocation_id: AllocationId,
    #[serde(default = "default_request_kind")]
    pub kind: AllocationKind,
    pub min_us: u32,
    pub max_us: u32,
    #[serde(default)]
    pub period: u16,
    #[serde(default = "default_request_format")]
    pub format: AllocationFormat,
    #[serde(default)]
    pub r#static: bool,
    #[serde(default)]
    pub submit_in_bi: u32,
    pub delete_in_bi: Option<u32>,

    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

fn default_request_kind() -> AllocationKind {
    AllocationKind::ServicePeriod
}

fn default_request_format() -> AllocationFormat {
    AllocationFormat::Isochronous
}

/// Convert a CfgScenarioDto (from TOML) into a CfgScenario.
/// Fails on unrecognized fields in any of the requests.
pub fn apply_scenario_patch(src: CfgScenarioDto) -> Result<CfgScenario, String> {
    let mut requests = Vec::with_capacity(src.request.len());
    for (i, r) in src.request.into_iter().enumerate() {
        if !r.extra.is_empty() {
            let mut keys: Vec<&String> = r.extra.keys().collect();
            keys.sort_unstable();
            return Err(format!("Unrecognized fields in scenario.request[{}]: {:?}", i, keys));
        }
        requests.push(CfgScenarioRequest {
            source: r.source_aid,
            dest: r.dest_aid,
            allocation_id: r.allocation_id,
            kind: r.kind,
            min_duration: r.min_us,
            max_duration: r.max_us,
            period: r.period,
            format: r.format,
            is_static: r.r#static,
            submit_in_bi: r.submit_in_bi,
            delete_in_bi: r.delete_in_bi,
        });
    }
    Ok(CfgScenario { seed: src.seed, requests })
}
