//! Flight engine: the scheduler facade over launchers and live projectiles.
//!
//! `FlightEngine` owns the worker pool and the authoritative-thread dispatch
//! queue. Each tick it runs the fast pass, the medium pass on every 10th tick
//! and the slow pass on every 100th, then drains deferred world mutations.
//! The thread that calls `tick` is the authoritative thread.

use std::sync::Arc;

use tracing::{debug, info, trace};

use seeker_core::ammo::AmmoCatalog;
use seeker_core::config::EngineConfig;
use seeker_core::constants::{MEDIUM_PASS_INTERVAL, SLOW_PASS_INTERVAL};
use seeker_core::enums::{EntityCategory, Pass};
use seeker_core::error::FlightError;
use seeker_core::events::FlightEvent;
use seeker_core::state::ProjectileRecord;
use seeker_core::types::{EntityId, OwnerId, SimTime};

use crate::context::FlightContext;
use crate::dispatch::{self, DispatchQueue};
use crate::host::{EntityRef, Host};
use crate::launcher::{Launcher, WeaponBlock};
use crate::projectile::GuidedProjectile;
use crate::worker::WorkerPool;

pub struct FlightEngine {
    config: EngineConfig,
    context: Arc<FlightContext>,
    queue: DispatchQueue,
    workers: WorkerPool,
    launchers: Vec<Arc<Launcher>>,
    catalog: Arc<AmmoCatalog>,
    time: SimTime,
}

impl FlightEngine {
    /// Create an engine driven from the calling thread.
    pub fn new(config: EngineConfig, host: Arc<dyn Host>, catalog: AmmoCatalog) -> Result<Self, FlightError> {
        let workers = WorkerPool::new(config.worker_threads)?;
        let (dispatcher, queue) = dispatch::channel();
        let context = Arc::new(FlightContext::new(host, dispatcher, config.is_server));
        info!(
            workers = workers.threads(),
            server = config.is_server,
            ammo_types = catalog.len(),
            "flight engine started"
        );
        Ok(Self {
            config,
            context,
            queue,
            workers,
            launchers: Vec::new(),
            catalog: Arc::new(catalog),
            time: SimTime::default(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<AmmoCatalog> {
        &self.catalog
    }

    pub fn time(&self) -> SimTime {
        self.time
    }

    // ---- Launchers ----

    pub fn add_launcher(&mut self, block: Arc<dyn WeaponBlock>) -> Arc<Launcher> {
        let launcher = Arc::new(Launcher::new(
            block,
            Arc::clone(&self.catalog),
            Arc::clone(&self.context),
        ));
        debug!(launcher = %launcher.id(), "launcher added");
        self.launchers.push(Arc::clone(&launcher));
        launcher
    }

    pub fn remove_launcher(&mut self, id: EntityId) -> bool {
        let before = self.launchers.len();
        self.launchers.retain(|l| l.id() != id);
        before != self.launchers.len()
    }

    pub fn launchers(&self) -> &[Arc<Launcher>] {
        &self.launchers
    }

    /// Offer a freshly spawned entity to the launchers. The first launcher to
    /// claim it owns it.
    pub fn on_entity_spawned(&mut self, entity: &EntityRef) -> bool {
        if entity.category() != EntityCategory::Missile {
            return false;
        }
        self.launchers.iter().any(|launcher| launcher.claim(entity))
    }

    // ---- Scheduling ----

    /// Advance one tick on the authoritative thread.
    pub fn tick(&mut self) {
        self.time.advance();
        let tick = self.time.tick;
        self.context.clock.set(tick);
        let now = self.context.now();

        for launcher in &self.launchers {
            launcher.update(tick, now);
        }

        self.update1();
        if tick % MEDIUM_PASS_INTERVAL == 0 {
            self.update10();
        }
        if tick % SLOW_PASS_INTERVAL == 0 {
            self.update100();
        }
        self.drain_deferred();
    }

    /// Fast pass over every live projectile.
    pub fn update1(&self) {
        self.sweep(Pass::Fast);
    }

    /// Medium pass over every live projectile.
    pub fn update10(&self) {
        self.sweep(Pass::Medium);
    }

    /// Slow pass over every live projectile.
    pub fn update100(&self) {
        self.sweep(Pass::Slow);
    }

    fn sweep(&self, pass: Pass) {
        let registry = &self.context.registry;
        registry.apply_pending();
        let live = registry.snapshot();
        if live.is_empty() {
            return;
        }
        trace!(pass = ?pass, live = live.len(), "sweep");
        self.workers.run_batch(live.into_iter().map(move |projectile| {
            move || match pass {
                Pass::Fast => projectile.update_fast(),
                Pass::Medium => projectile.update_medium(),
                Pass::Slow => projectile.update_slow(),
            }
        }));
    }

    /// Run queued world mutations. Returns how many ran.
    pub fn drain_deferred(&mut self) -> usize {
        self.queue.drain()
    }

    /// Make the calling thread the authoritative thread.
    pub fn adopt_current_thread(&mut self) {
        self.queue.adopt_current_thread();
    }

    // ---- Queries ----

    /// Owner of a guided projectile or cluster member.
    pub fn try_get_owner_id(&self, projectile: EntityId) -> Option<OwnerId> {
        self.context.registry.get(projectile).map(|p| p.owner())
    }

    /// Whether `id` is a live guided projectile or cluster member.
    pub fn is_guided_projectile(&self, id: EntityId) -> bool {
        self.context.registry.contains(id)
    }

    pub fn projectile(&self, id: EntityId) -> Option<Arc<GuidedProjectile>> {
        self.context.registry.get(id)
    }

    /// Projectiles the next sweep will visit.
    pub fn live_projectiles(&self) -> Vec<Arc<GuidedProjectile>> {
        self.context.registry.apply_pending();
        self.context.registry.snapshot()
    }

    pub fn records(&self) -> Vec<ProjectileRecord> {
        self.live_projectiles().iter().map(|p| p.record()).collect()
    }

    pub fn take_events(&self) -> Vec<FlightEvent> {
        self.context.events.take()
    }
}

impl Drop for FlightEngine {
    fn drop(&mut self) {
        // Projectiles hold the context that holds the registry.
        self.context.registry.clear();
    }
}
