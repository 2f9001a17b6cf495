//! `tg-cli live`: drive a fixture on a real clock.

use std::time::Duration;

use tokio::time::{interval, Instant};

use tg_core::Simulation;

use crate::{load_config, load_fixture};

const FRAME_MS: u64 = 100;

pub async fn cmd_live(page: &str, config: Option<&str>, seconds: u64, speed: f64) -> Result<(), String> {
    if !(speed.is_finite() && speed > 0.0) {
        return Err(format!("Speed must be positive, got {}", speed));
    }

    let fixture = load_fixture(page)?;
    let config = load_config(config)?;
    let mut sim = Simulation::from_fixture(&fixture, config).map_err(|e| e.to_string())?;

    let report = sim.start();
    log::info!("Started on {}: {:?}", fixture.location, report);

    let step_ms = ((FRAME_MS as f64) * speed).round().max(1.0) as u64;
    let deadline = Instant::now() + Duration::from_secs(seconds);
    let mut frames = interval(Duration::from_millis(FRAME_MS));
    let mut state = sim.engine().reminder_state();

    loop {
        tokio::select! {
            _ = frames.tick() => {
                sim.advance(step_ms);
                let current = sim.engine().reminder_state();
                if current != state {
                    log::info!("Reminder {:?} -> {:?} at {} ms", state, current, sim.now());
                    state = current;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Received Ctrl-C, stopping");
                break;
            }
        }

        if Instant::now() >= deadline {
            break;
        }
    }

    sim.engine_mut().shutdown();
    let stats = sim.engine().detector_stats();
    println!("Ran '{}' for {} ms of page time", page, sim.now());
    println!("  Passes:          {}", sim.engine().passes());
    println!("  Ticks:           {}", stats.ticks);
    println!("  Mutation batches: {}", stats.mutation_batches);
    println!("  Popup batches:   {}", stats.popup_batches);
    println!("  Reminder:        {:?}", sim.engine().reminder_state());
    Ok(())
}
