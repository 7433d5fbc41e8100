//! Demo engagement on the sandbox host.
//!
//! A friendly battery of three launchers engages one drifting hostile
//! platform: a rail launcher with relay-fed seekers, a cluster pod and a
//! laser-designating turret.

use std::sync::Arc;

use anyhow::{Context, Result};
use glam::DVec3;
use tracing::{debug, info};

use seeker_core::ammo::AmmoCatalog;
use seeker_core::config::EngineConfig;
use seeker_core::enums::EntityCategory;
use seeker_core::events::FlightEvent;
use seeker_core::types::{EntityId, OwnerId};
use seeker_sim::host::{EntityRef, WorldEntity};
use seeker_sim::launcher::WeaponBlock;
use seeker_sim::sandbox::{BodySpec, SandboxHost, SandboxWeapon, ROUND_HALF_EXTENTS};
use seeker_sim::FlightEngine;

const AMMO_JSON: &str = include_str!("../ammo.json");

const BATTERY: OwnerId = OwnerId(1);
const HOSTILE: OwnerId = OwnerId(2);

/// Offset of the muzzle in front of a 2.5 m block (block half extent plus half a round).
const MUZZLE_Z: f64 = -2.25;

/// Scheduled shots, by tick.
const SEEKER_SALVO: [u64; 2] = [30, 150];
const SWARM_TICK: u64 = 60;
const DESIGNATOR_TICK: u64 = 90;

pub struct Scenario {
    pub host: Arc<SandboxHost>,
    pub engine: FlightEngine,
    target: EntityRef,
    rail: Arc<SandboxWeapon>,
    pod: Arc<SandboxWeapon>,
    turret: Arc<SandboxWeapon>,
    detonations: usize,
}

impl Scenario {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let catalog = AmmoCatalog::from_json(AMMO_JSON).context("loading demo ammunition")?;
        let host = SandboxHost::new();
        let mut engine = FlightEngine::new(config, host.clone(), catalog)?;

        let target = host.spawn(
            BodySpec::new(DVec3::new(-80.0, 40.0, -700.0), EntityCategory::LargeGrid)
                .moving(DVec3::new(25.0, 0.0, 0.0))
                .half_extents(DVec3::new(8.0, 4.0, 12.0))
                .owned_by(HOSTILE),
        );

        let rail = Self::weapon(&host, DVec3::ZERO, "SeekerMk1");
        let pod = Self::weapon(&host, DVec3::new(20.0, 0.0, 0.0), "SwarmPod");
        let turret = Self::weapon(&host, DVec3::new(-20.0, 0.0, 0.0), "Designator");
        for weapon in [&rail, &pod, &turret] {
            weapon.set_relay(Some(host.relay()));
            engine.add_launcher(weapon.clone());
        }
        turret.set_turret_aim(Some(target.transform().position - turret.entity().transform().position));

        info!(target = %target.id(), launchers = engine.launchers().len(), "scenario ready");
        Ok(Self {
            host,
            engine,
            target,
            rail,
            pod,
            turret,
            detonations: 0,
        })
    }

    fn weapon(host: &SandboxHost, position: DVec3, magazine: &str) -> Arc<SandboxWeapon> {
        let block = host.spawn(
            BodySpec::new(position, EntityCategory::LargeGrid)
                .half_extents(DVec3::splat(1.25))
                .owned_by(BATTERY),
        );
        let weapon = Arc::new(SandboxWeapon::new(block, BATTERY));
        weapon.load(magazine, 40.0);
        weapon
    }

    /// One simulation step: sensors, scheduled shots, engine tick, physics.
    pub fn step(&mut self) {
        let tick = self.engine.time().tick + 1;
        let now = tick as f64 * seeker_core::constants::DT;

        if !self.target.is_closed() {
            self.host.observe(self.target.id(), now);
            self.track_target();
        }

        if SEEKER_SALVO.contains(&tick) {
            let rail = Arc::clone(&self.rail);
            self.fire(&rail, &[0.0]);
        }
        if tick == SWARM_TICK {
            let pod = Arc::clone(&self.pod);
            self.fire(&pod, &[-0.6, 0.0, 0.6]);
        }
        if tick == DESIGNATOR_TICK {
            let turret = Arc::clone(&self.turret);
            self.fire(&turret, &[0.0]);
        }

        self.engine.tick();
        self.host.step();

        for event in self.engine.take_events() {
            if matches!(event, FlightEvent::Detonated { .. }) {
                self.detonations += 1;
            }
            match serde_json::to_string(&event) {
                Ok(json) => info!(tick, event = %json, "flight event"),
                Err(e) => debug!(tick, error = %e, "event not serialisable"),
            }
        }
    }

    fn track_target(&self) {
        let aim = self.target.transform().position - self.turret.entity().transform().position;
        self.turret.set_turret_aim(Some(aim));
    }

    /// Spawn rounds from `weapon`'s muzzle with lateral offsets and offer them to the engine.
    fn fire(&mut self, weapon: &SandboxWeapon, lateral: &[f64]) {
        let block = weapon.entity().transform();
        let forward = weapon.turret_aim().unwrap_or_else(|| block.forward());
        let speed = weapon
            .loaded_magazine()
            .and_then(|m| self.engine.catalog().get(&m))
            .map_or(100.0, |ammo| ammo.definition.initial_speed);
        weapon.set_shooting(true);
        let right = forward.cross(DVec3::Y).try_normalize().unwrap_or(DVec3::X);
        for dx in lateral {
            let muzzle = block.transform_point(DVec3::new(0.0, 0.0, MUZZLE_Z)) + right * *dx;
            let round = self.host.spawn(
                BodySpec::new(muzzle, EntityCategory::Missile)
                    .facing(forward)
                    .moving(forward * speed)
                    .half_extents(ROUND_HALF_EXTENTS)
                    .owned_by(BATTERY),
            );
            if !self.engine.on_entity_spawned(&round) {
                debug!(round = %round.id(), "round not claimed");
            }
        }
        weapon.set_shooting(false);
    }

    /// True once nothing is left to watch.
    pub fn is_over(&self) -> bool {
        self.engine.time().tick > DESIGNATOR_TICK.max(SEEKER_SALVO[1])
            && (self.target.is_closed() || self.engine.live_projectiles().is_empty())
    }

    pub fn target_id(&self) -> EntityId {
        self.target.id()
    }

    pub fn detonations(&self) -> usize {
        self.detonations
    }
}
