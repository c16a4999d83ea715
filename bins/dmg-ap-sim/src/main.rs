use clap::Parser;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use dmg_config::{CfgScenario, SharedConfig, toml_config};
use dmg_core::{Allocation, AidFmt, SimTime, STACK_VERSION, debug};
use dmg_sched::{AdmissionResponse, CycleDriver, DeletionResponse, ScheduleSink};

/// Load configuration file
fn load_config_from_toml(cfg_path: &str) -> SharedConfig {
    match toml_config::from_file(cfg_path) {
        Ok(c) => c,
        Err(e) => {
            println!("Failed to load configuration from {}: {}", cfg_path, e);
            std::process::exit(1);
        }
    }
}

/// Logs every published schedule and every response
struct LogSink;

impl ScheduleSink for LogSink {
    fn on_schedule_published(&mut self, ts: SimTime, schedule: &[Allocation]) {
        tracing::info!(ts = %ts, "beacon schedule, {} allocation(s)", schedule.len());
        for a in schedule {
            tracing::info!(ts = %ts, "  {}", a);
        }
    }

    fn on_admission_response(&mut self, ts: SimTime, response: &AdmissionResponse) {
        tracing::info!(ts = %ts, "ADDTS {} -> {:?}", response.key, response.outcome);
    }

    fn on_deletion(&mut self, ts: SimTime, response: &DeletionResponse) {
        tracing::info!(ts = %ts, "DELTS {} -> {:?}", response.key, response.outcome);
    }
}

/// Queues the scenario's requests at random offsets inside the DTI of their beacon interval
fn inject_scenario(driver: &mut CycleDriver, scenario: &CfgScenario, seed_override: Option<u64>) {
    let seed = seed_override.or(scenario.seed).unwrap_or_else(rand::random);
    tracing::info!("scenario: {} request(s), seed {}", scenario.requests.len(), seed);
    let mut rng = StdRng::seed_from_u64(seed);

    for req in &scenario.requests {
        let bi = req.submit_in_bi as u64;
        let (dti_start, dti_end) = driver.dti_window(bi);
        let at = SimTime::from_us(rng.random_range(dti_start.as_us()..dti_end.as_us()));
        tracing::debug!("{} ADDTS #{} at {}", AidFmt(req.source), req.allocation_id, at);
        driver.submit_addts_at(at, req.source, req.to_tspec());

        if let Some(del_bi) = req.delete_in_bi {
            let (dti_start, dti_end) = driver.dti_window(del_bi as u64);
            let at = SimTime::from_us(rng.random_range(dti_start.as_us()..dti_end.as_us()));
            tracing::debug!("{} DELTS #{} at {}", AidFmt(req.source), req.allocation_id, at);
            driver.submit_delts_at(at, req.source, req.allocation_id, req.dest);
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "DMG PCP/AP scheduler simulator",
    long_about = "Runs the beacon interval scheduler against the scenario in the provided TOML configuration file"
)]
struct Args {
    /// Config file (required)
    #[arg(help = "TOML config with beacon timing, scheduler policy and scenario")]
    config: String,

    /// Number of beacon intervals to run, runs until Ctrl+C if absent
    #[arg(long)]
    cycles: Option<usize>,

    /// Overrides the scenario seed
    #[arg(long)]
    seed: Option<u64>,
}

fn main() {
    eprintln!("  DMG PCP/AP scheduler simulator");
    eprintln!("  version {}\n", STACK_VERSION);

    let args = Args::parse();
    let cfg = load_config_from_toml(&args.config);
    let _log_guard = debug::setup_logging_default(cfg.config().debug_log.clone());

    let mut driver = CycleDriver::new(cfg.clone());
    driver.register_sink(Box::new(LogSink));
    if let Some(scenario) = &cfg.config().scenario {
        inject_scenario(&mut driver, scenario, args.seed);
    } else {
        eprintln!(" -> no scenario configured, beacons only");
    }

    // Set up Ctrl+C handler for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("failed to set Ctrl+C handler");

    let cycles = driver.run_cycles(args.cycles, Some(running));

    let state = cfg.state_read();
    tracing::info!(
        "done after {} beacon interval(s): {} accepted, {} rejected, {} deleted, {} arrival(s) never delivered",
        cycles, state.accepted, state.rejected, state.deleted, driver.pending_arrivals()
    );
}
