//! Flight engine for guided projectiles.
//!
//! Claims rounds fired by launchers, steers them through their flight stages
//! on a worker pool and applies every world mutation on one authoritative thread.

pub mod cluster;
pub mod context;
pub mod dispatch;
pub mod engine;
pub mod host;
pub mod launcher;
pub mod projectile;
pub mod registry;
pub mod relay;
pub mod sandbox;
pub mod target;
pub mod trajectory;
pub mod worker;

pub use engine::FlightEngine;
pub use seeker_core as core;
