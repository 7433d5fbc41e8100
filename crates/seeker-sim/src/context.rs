//! Shared state every projectile and launcher reaches through.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use seeker_core::constants::DT;
use seeker_core::events::FlightEvent;

use crate::dispatch::Dispatcher;
use crate::host::Host;
use crate::projectile::GuidedProjectile;
use crate::registry::Registry;

/// Simulation clock, advanced by the engine once per tick.
#[derive(Debug, Default)]
pub struct Clock {
    tick: AtomicU64,
}

impl Clock {
    pub fn tick(&self) -> u64 {
        self.tick.load(Ordering::Acquire)
    }

    /// Seconds since start.
    pub fn now(&self) -> f64 {
        self.tick() as f64 * DT
    }

    pub fn set(&self, tick: u64) {
        self.tick.store(tick, Ordering::Release);
    }
}

/// Events waiting to be drained by the caller.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<FlightEvent>>,
}

impl EventLog {
    pub fn push(&self, event: FlightEvent) {
        self.events.lock().push(event);
    }

    pub fn take(&self) -> Vec<FlightEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

/// Collaborators injected into every projectile and launcher.
pub struct FlightContext {
    pub host: Arc<dyn Host>,
    pub dispatcher: Dispatcher,
    pub registry: Registry<GuidedProjectile>,
    pub events: EventLog,
    pub clock: Clock,
    /// Authoritative server: detonation and teardown side effects run here only.
    pub is_server: bool,
}

impl FlightContext {
    pub fn new(host: Arc<dyn Host>, dispatcher: Dispatcher, is_server: bool) -> Self {
        Self {
            host,
            dispatcher,
            registry: Registry::new(),
            events: EventLog::default(),
            clock: Clock::default(),
            is_server,
        }
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }
}
