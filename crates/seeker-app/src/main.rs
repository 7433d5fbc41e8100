//! Headless demo: one battery engaging a drifting target on the sandbox host.

mod game_loop;
mod scenario;

use std::env;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use seeker_core::config::EngineConfig;
use seeker_core::constants::TICK_RATE;

use crate::game_loop::LoopSettings;

fn main() -> Result<()> {
    let config = EngineConfig::from_env().context("reading engine configuration")?;
    init_tracing(&config.log_level);

    let settings = loop_settings()?;
    info!(
        workers = config.worker_threads,
        server = config.is_server,
        max_ticks = settings.max_ticks,
        time_scale = settings.time_scale,
        "starting seeker demo"
    );

    let summary = game_loop::run(config, settings)?;
    println!(
        "{} ticks, {} detonations, {} projectiles still in flight",
        summary.ticks, summary.detonations, summary.projectiles_left
    );
    Ok(())
}

/// `SEEKER_DEMO_SECS` (default 30) and `SEEKER_TIME_SCALE` (default 1, 0 = unpaced).
fn loop_settings() -> Result<LoopSettings> {
    let seconds: f64 = match env::var("SEEKER_DEMO_SECS") {
        Ok(raw) => raw.parse().with_context(|| format!("SEEKER_DEMO_SECS={raw:?}"))?,
        Err(_) => 30.0,
    };
    let time_scale: f64 = match env::var("SEEKER_TIME_SCALE") {
        Ok(raw) => raw.parse().with_context(|| format!("SEEKER_TIME_SCALE={raw:?}"))?,
        Err(_) => 1.0,
    };
    Ok(LoopSettings {
        max_ticks: (seconds.max(0.0) * TICK_RATE as f64) as u64,
        time_scale: time_scale.max(0.0),
    })
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}
