//! Tick loop thread: runs the scenario at 60 Hz until it is over or out of time.
//!
//! The engine is created inside the loop thread so that thread is the
//! authoritative thread for every deferred world mutation.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use tracing::info;

use seeker_core::config::EngineConfig;
use seeker_core::constants::TICK_RATE;

use crate::scenario::Scenario;

/// Nominal duration of one tick at 1x speed.
const TICK_DURATION: Duration = Duration::from_nanos(1_000_000_000 / TICK_RATE as u64);

#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    /// Hard stop (ticks).
    pub max_ticks: u64,
    /// Wall-clock speed-up. Zero runs as fast as possible.
    pub time_scale: f64,
}

/// What the loop saw before stopping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopSummary {
    pub ticks: u64,
    pub detonations: usize,
    pub projectiles_left: usize,
}

/// Run the loop on its own thread and wait for it.
pub fn run(config: EngineConfig, settings: LoopSettings) -> Result<LoopSummary> {
    let handle = thread::Builder::new()
        .name("seeker-tick-loop".into())
        .spawn(move || run_loop(config, settings))
        .context("spawning tick loop thread")?;
    handle
        .join()
        .map_err(|_| anyhow!("tick loop thread panicked"))?
}

fn run_loop(config: EngineConfig, settings: LoopSettings) -> Result<LoopSummary> {
    let mut scenario = Scenario::new(config)?;
    let tick_duration = if settings.time_scale > 0.001 {
        Some(TICK_DURATION.div_f64(settings.time_scale))
    } else {
        None
    };
    let mut next_tick_time = Instant::now();

    while scenario.engine.time().tick < settings.max_ticks && !scenario.is_over() {
        scenario.step();

        let Some(tick_duration) = tick_duration else {
            continue;
        };
        next_tick_time += tick_duration;
        let now = Instant::now();
        if next_tick_time > now {
            thread::sleep(next_tick_time - now);
        } else if now - next_tick_time > tick_duration * 2 {
            // Too far behind, reset to avoid a catch-up spiral
            next_tick_time = now;
        }
    }

    let summary = LoopSummary {
        ticks: scenario.engine.time().tick,
        detonations: scenario.detonations(),
        projectiles_left: scenario.engine.live_projectiles().len(),
    };
    info!(
        target_entity = %scenario.target_id(),
        ticks = summary.ticks,
        detonations = summary.detonations,
        left = summary.projectiles_left,
        "tick loop finished"
    );
    Ok(summary)
}
