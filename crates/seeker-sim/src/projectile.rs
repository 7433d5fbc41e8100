//! Guided projectile: stage machine, steering, detonation and teardown.
//!
//! Passes run on worker threads. Anything that writes to the world is wrapped
//! in a closure and sent to the authoritative thread through the dispatcher;
//! the closure re-checks `is_stopped` before touching the entity.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use glam::DVec3;
use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use seeker_core::ammo::Ammo;
use seeker_core::constants::*;
use seeker_core::enums::{DetonationCause, EntityCategory, Stage, TargetTypes};
use seeker_core::events::FlightEvent;
use seeker_core::state::{ClusterRecord, ProjectileRecord};
use seeker_core::types::{EntityId, OwnerId, Transform};
use seeker_guidance::intercept::semi_active_lead;
use seeker_guidance::stages::{self, stage_after_rail, StageContext};
use seeker_guidance::steering::{self, SteeringInput};

use crate::cluster::Cluster;
use crate::context::FlightContext;
use crate::host::{EntityRef, RayHit};
use crate::launcher::Launcher;
use crate::registry::Handle;
use crate::relay::Sighting;
use crate::target::{Target, TargetLock};
use crate::trajectory::{GravityData, RailData};

/// Flight constants derived once from the ammunition.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightProfile {
    /// Total acceleration per tick, guidance package plus motor (m/s per tick).
    pub acceleration_per_tick: f64,
    /// Speed added per tick while locked on (m/s).
    pub speed_increment: f64,
    pub guidance_seconds: f64,
    pub detonate_range: f64,
    pub explosion_radius: f64,
    pub boost_distance: f64,
    pub rotation_per_tick: f64,
    pub desired_speed: f64,
    pub target_range: f64,
    pub max_trajectory: f64,
    pub cos_acquisition_angle: f64,
    pub radar_range: f64,
    pub has_relay: bool,
    pub has_radar: bool,
    pub semi_active: bool,
    pub is_cluster: bool,
    pub emp_strength: f64,
    pub emp_seconds: f64,
    pub cluster_spread_range: f64,
}

impl FlightProfile {
    pub fn from_ammo(ammo: &Ammo) -> Self {
        let desc = ammo.description.clone().unwrap_or_default();
        let def = &ammo.definition;
        let ticks = TICK_RATE as f64;
        Self {
            acceleration_per_tick: (desc.acceleration + def.missile_acceleration) / ticks,
            speed_increment: desc.acceleration / ticks,
            guidance_seconds: desc.guidance_seconds,
            detonate_range: desc.detonate_range,
            explosion_radius: def.explosion_radius,
            boost_distance: desc.boost_distance,
            rotation_per_tick: desc.rotation_per_tick,
            desired_speed: def.desired_speed,
            target_range: desc.target_range,
            max_trajectory: def.max_trajectory,
            cos_acquisition_angle: desc.cos_acquisition_angle(),
            radar_range: desc.radar.as_ref().map_or(0.0, |r| r.max_range),
            // A radar cannot report back without a radio.
            has_relay: desc.has_antenna || desc.radar.is_some(),
            has_radar: desc.radar.is_some(),
            semi_active: desc.semi_active_laser,
            is_cluster: ammo.is_cluster,
            emp_strength: desc.emp_strength,
            emp_seconds: desc.emp_seconds,
            cluster_spread_range: desc.cluster_spread_range,
        }
    }

    pub fn has_emp(&self) -> bool {
        self.emp_strength > 0.0 && self.emp_seconds > 0.0
    }
}

/// Everything a launcher hands over when it claims a round.
pub struct LaunchParams {
    /// The physical round (cluster master for cluster rounds).
    pub entity: EntityRef,
    pub ammo: Arc<Ammo>,
    pub launcher: Weak<Launcher>,
    /// The weapon block that fired, for rail geometry and designation.
    pub fired_by: EntityRef,
    pub owner: OwnerId,
    pub allowed_targets: TargetTypes,
    /// Entity the weapon was told to attack. Retargeting only ever looks for this one.
    pub designated: Option<EntityId>,
    /// Slewing mounts skip the rail stage.
    pub from_slewing_mount: bool,
    pub target: Target,
    pub cluster: Option<Cluster>,
}

struct FlightState {
    lock: TargetLock,
    cluster: Option<Cluster>,
    rail: Option<RailData>,
    gravity: Option<GravityData>,
    launch_position: DVec3,
    last_position: DVec3,
    guidance_expires_at: Option<f64>,
    /// Sightings rejected for being outside the acquisition cone.
    blacklist: HashSet<EntityId>,
    next_retarget_at: f64,
    debris: Option<EntityId>,
}

pub struct GuidedProjectile {
    id: EntityId,
    entity: EntityRef,
    ammo: Arc<Ammo>,
    profile: FlightProfile,
    launcher: Weak<Launcher>,
    fired_by: EntityRef,
    owner: OwnerId,
    allowed_targets: TargetTypes,
    designated: Option<EntityId>,
    context: Arc<FlightContext>,
    stage: AtomicU8,
    torn_down: AtomicBool,
    /// Registry handle and the ids indexed under it.
    registration: Mutex<Option<(Handle, Vec<EntityId>)>>,
    state: Mutex<FlightState>,
}

impl GuidedProjectile {
    /// Build, register and subscribe a projectile for a claimed round.
    pub fn launch(params: LaunchParams, context: Arc<FlightContext>) -> Arc<Self> {
        let LaunchParams {
            entity,
            ammo,
            launcher,
            fired_by,
            owner,
            allowed_targets,
            designated,
            from_slewing_mount,
            target,
            cluster,
        } = params;

        let now = context.now();
        let profile = FlightProfile::from_ammo(&ammo);
        let transform = entity.transform();

        let gravity = if profile.boost_distance > 0.0 {
            context.host.gravity_at(transform.position).map(|sample| {
                let at_target = target
                    .current_position(now)
                    .and_then(|p| context.host.gravity_at(p));
                GravityData::new(sample, at_target)
            })
        } else {
            None
        };

        let (stage, rail) = if from_slewing_mount {
            let stage = stage_after_rail(profile.semi_active, profile.boost_distance, gravity.is_some());
            (stage, None)
        } else {
            let rail = RailData::new(&fired_by.transform(), transform.position, now);
            (Stage::Rail, Some(rail))
        };
        let guidance_expires_at = stage
            .has_guidance_timer()
            .then(|| now + profile.guidance_seconds);

        let projectile = Arc::new(GuidedProjectile {
            id: entity.id(),
            entity,
            ammo,
            launcher,
            owner,
            allowed_targets,
            designated,
            stage: AtomicU8::new(stage as u8),
            torn_down: AtomicBool::new(false),
            registration: Mutex::new(None),
            state: Mutex::new(FlightState {
                lock: TargetLock::new(target),
                cluster,
                rail,
                gravity,
                launch_position: transform.position,
                last_position: transform.position,
                guidance_expires_at,
                blacklist: HashSet::new(),
                next_retarget_at: 0.0,
                debris: None,
            }),
            fired_by,
            profile,
            context,
        });

        let (ids, cluster_size) = {
            let mut state = projectile.state.lock();
            if state.lock.target.is_none() {
                projectile.retarget_from_network(&mut state, &transform, now);
            }
            let mut ids = vec![projectile.id];
            if let Some(cluster) = &state.cluster {
                ids.extend(cluster.slave_ids());
            }
            let size = state.cluster.as_ref().map_or(1, |c| c.slaves().len() + 1);
            (ids, size)
        };

        let handle = projectile
            .context
            .registry
            .register(&ids, Arc::clone(&projectile));
        *projectile.registration.lock() = Some((handle, ids));

        projectile.context.events.push(FlightEvent::Launched {
            projectile: projectile.id,
            launcher: projectile.fired_by.id(),
            owner,
            ammo: projectile.ammo.name.clone(),
            cluster_size,
        });
        info!(
            projectile = %projectile.id,
            launcher = %projectile.fired_by.id(),
            ammo = %projectile.ammo.name,
            stage = ?stage,
            cluster_size,
            "guided projectile launched"
        );
        if stage == Stage::Terminated {
            warn!(projectile = %projectile.id, "boost configured but no gravity at launch");
            projectile.context.events.push(FlightEvent::StageChanged {
                projectile: projectile.id,
                from: Stage::Rail,
                to: Stage::Terminated,
            });
        }

        projectile.subscribe();
        projectile
    }

    fn subscribe(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.entity.subscribe_close(Box::new(move |_| {
            if let Some(projectile) = weak.upgrade() {
                projectile.on_destroyed();
            }
        }));

        let slaves: Vec<EntityRef> = self
            .state
            .lock()
            .cluster
            .as_ref()
            .map(|c| c.slaves().to_vec())
            .unwrap_or_default();
        for slave in slaves {
            let weak = Arc::downgrade(self);
            slave.subscribe_close(Box::new(move |id| {
                if let Some(projectile) = weak.upgrade() {
                    projectile.on_slave_destroyed(id);
                }
            }));
        }
    }

    // ---- Accessors ----

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn launcher_id(&self) -> EntityId {
        self.fired_by.id()
    }

    pub fn ammo(&self) -> &Arc<Ammo> {
        &self.ammo
    }

    pub fn profile(&self) -> &FlightProfile {
        &self.profile
    }

    pub fn stage(&self) -> Stage {
        Stage::from_u8(self.stage.load(Ordering::Acquire))
    }

    /// Entity gone or guidance finished for good.
    pub fn is_stopped(&self) -> bool {
        self.entity.is_closed() || self.stage() >= Stage::Terminated
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    /// Acceleration the round is capable of (m/s²).
    pub fn acceleration(&self) -> f64 {
        self.profile.acceleration_per_tick * TICK_RATE as f64
    }

    pub fn target(&self) -> Target {
        self.state.lock().lock.target.clone()
    }

    pub fn set_target(&self, target: Target) {
        self.state.lock().lock.set(target);
    }

    pub fn firing_direction(&self) -> Option<DVec3> {
        self.state.lock().lock.firing_direction
    }

    pub fn guidance_expires_at(&self) -> Option<f64> {
        self.state.lock().guidance_expires_at
    }

    pub fn has_gravity(&self) -> bool {
        self.state.lock().gravity.is_some()
    }

    pub fn cluster(&self) -> Option<ClusterRecord> {
        self.state.lock().cluster.as_ref().map(Cluster::record)
    }

    pub fn is_cluster_slave(&self, id: EntityId) -> bool {
        self.state
            .lock()
            .cluster
            .as_ref()
            .is_some_and(|c| c.is_slave(id))
    }

    /// Export the persisted shape of this projectile.
    pub fn record(&self) -> ProjectileRecord {
        let now = self.context.now();
        let state = self.state.lock();
        ProjectileRecord {
            projectile: self.id,
            ammo: self.ammo.name.clone(),
            launcher: self.fired_by.id(),
            owner: self.owner,
            stage: self.stage(),
            guidance_remaining_secs: state.guidance_expires_at.map(|t| (t - now).max(0.0)),
            cluster: state.cluster.as_ref().map(Cluster::record),
        }
    }

    // ---- Stage bookkeeping ----

    /// Move forward to `to`. Never moves backward and never leaves a terminal stage.
    fn set_stage(&self, to: Stage) -> bool {
        let mut current = self.stage.load(Ordering::Acquire);
        loop {
            let from = Stage::from_u8(current);
            if from.is_terminal() || to <= from {
                return false;
            }
            match self
                .stage
                .compare_exchange(current, to as u8, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    debug!(projectile = %self.id, from = ?from, to = ?to, "stage changed");
                    self.context.events.push(FlightEvent::StageChanged {
                        projectile: self.id,
                        from,
                        to,
                    });
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
    }

    // ---- Fast pass ----

    /// Every tick: cluster formation, rail keeping, steering and detonation checks.
    pub fn update_fast(self: &Arc<Self>) {
        if self.is_stopped() {
            return;
        }
        let now = self.context.now();
        let transform = self.entity.transform();
        let velocity = self.entity.velocity();
        let stage = self.stage();

        let mut state = self.state.lock();
        state.last_position = transform.position;

        if state.cluster.is_some() && !self.update_cluster(&mut state, &transform, velocity, now) {
            return;
        }

        match stage {
            Stage::Rail => self.keep_on_rail(&state, &transform, velocity),
            s if s.steers() => self.steer(&mut state, s, &transform, velocity, now),
            _ => {}
        }
    }

    /// Returns false if the cluster was aborted.
    fn update_cluster(
        self: &Arc<Self>,
        state: &mut FlightState,
        master: &Transform,
        velocity: DVec3,
        now: f64,
    ) -> bool {
        let distance_to_target = state
            .lock
            .target
            .current_position(now)
            .map(|p| p.distance(master.position));
        let target_half = state.lock.target.half_shortest_dimension();
        let Some(cluster) = state.cluster.as_mut() else {
            return true;
        };

        if cluster.check_anomaly(velocity) {
            let slaves = cluster.take_slaves();
            warn!(
                projectile = %self.id,
                slaves = slaves.len(),
                "cluster master velocity anomaly, aborting cluster"
            );
            self.context.events.push(FlightEvent::ClusterAborted {
                projectile: self.id,
                slaves_destroyed: slaves.len(),
            });
            self.set_stage(Stage::Terminated);
            if self.context.is_server {
                self.context.dispatcher.defer(move || {
                    for slave in slaves {
                        slave.destroy();
                    }
                });
            }
            return false;
        }

        let goal = cluster.spread_goal(distance_to_target, target_half, self.profile.cluster_spread_range);
        cluster.adjust_spread(goal);
        let moves = cluster.formation_moves(master, velocity);
        if moves.is_empty() {
            return true;
        }

        let this = Arc::clone(self);
        self.context.dispatcher.defer(move || {
            if this.is_stopped() {
                return;
            }
            for m in moves {
                if m.slave.is_closed() {
                    continue;
                }
                let mut t = m.slave.transform();
                t.rotation = m.rotation;
                m.slave.set_transform(t);
                m.slave.set_velocity(m.velocity);
            }
        });
        true
    }

    fn keep_on_rail(self: &Arc<Self>, state: &FlightState, transform: &Transform, velocity: DVec3) {
        let Some(rail) = state.rail else {
            return;
        };
        let launcher = (!self.fired_by.is_closed()).then(|| self.fired_by.transform());
        let (on_rail, rail_velocity) = rail.keep_on_rail(launcher.as_ref(), transform, velocity);

        let this = Arc::clone(self);
        self.context.dispatcher.defer(move || {
            if this.is_stopped() {
                return;
            }
            this.entity.set_transform(on_rail);
            this.entity.set_velocity(rail_velocity);
        });
    }

    fn steer(
        self: &Arc<Self>,
        state: &mut FlightState,
        stage: Stage,
        transform: &Transform,
        velocity: DVec3,
        now: f64,
    ) {
        state
            .lock
            .solve(transform.position, velocity, self.profile.desired_speed, now);
        let Some(firing_direction) = state.lock.firing_direction else {
            return;
        };

        let input = SteeringInput {
            stage,
            heading: transform.forward(),
            velocity,
            firing_direction,
            gravity_normal: state.gravity.map(|g| g.normal),
            rotation_per_tick: self.profile.rotation_per_tick,
            desired_speed: self.profile.desired_speed,
            speed_increment: self.profile.speed_increment,
        };
        let Some(command) = steering::steer(&input) else {
            return;
        };
        trace!(projectile = %self.id, angle = command.angle, "steering");

        if command.rotation.is_some() || command.accelerated {
            let this = Arc::clone(self);
            self.context.dispatcher.defer(move || {
                if this.is_stopped() {
                    return;
                }
                let mut t = this.entity.transform();
                if let Some(rotation) = command.rotation {
                    t = t.rotated(rotation);
                }
                this.entity.set_transform(t);
                this.entity.set_velocity(command.new_velocity);
            });
        }

        if self.context.is_server && self.profile.detonate_range > 0.0 {
            self.check_detonation(state, transform.position, velocity, command.desired, now);
        }
    }

    // ---- Detonation ----

    fn check_detonation(
        self: &Arc<Self>,
        state: &FlightState,
        position: DVec3,
        velocity: DVec3,
        desired: DVec3,
        now: f64,
    ) {
        let ahead = position + velocity * DT * OBSTRUCTION_LOOKAHEAD_TICKS;
        if let Some(hit) = self.find_obstruction(state, position, ahead) {
            debug!(projectile = %self.id, obstacle = %hit.entity, "flight path obstructed");
            let this = Arc::clone(self);
            self.context.dispatcher.defer(move || {
                this.explode(DetonationCause::Obstruction, Some(hit.position));
            });
            return;
        }

        // A designator lead point is where to fly, not something to hit.
        if matches!(state.lock.target, Target::SemiActiveDesignator { .. }) {
            return;
        }
        let Some(target_position) = state.lock.target.current_position(now) else {
            return;
        };
        let range = self.profile.detonate_range;
        if position.distance_squared(target_position) > range * range {
            return;
        }
        let Some(heading) = velocity.try_normalize() else {
            return;
        };
        if heading.dot(desired) < COS_ANGLE_DETONATE {
            debug!(projectile = %self.id, "diverging inside detonation range");
            let this = Arc::clone(self);
            self.context.dispatcher.defer(move || {
                this.explode(DetonationCause::Proximity, None);
            });
        }
    }

    /// Raycast ahead, then confirm against each entity along the path so a
    /// coarse world hit alone never detonates the round.
    fn find_obstruction(&self, state: &FlightState, from: DVec3, to: DVec3) -> Option<RayHit> {
        let host = &self.context.host;
        host.raycast_world(from, to, Some(self.id))?;

        let own_slaves = state
            .cluster
            .as_ref()
            .map(|c| c.slave_ids())
            .unwrap_or_default();
        let center = (from + to) * 0.5;
        let radius = from.distance(to) * 0.5;
        host.entities_in_sphere(center, radius)
            .into_iter()
            .filter(|id| *id != self.id && !own_slaves.contains(id))
            .filter_map(|id| host.raycast_entity(id, from, to))
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    /// Authoritative thread only.
    fn explode(self: &Arc<Self>, cause: DetonationCause, contact: Option<DVec3>) {
        if self.is_stopped() {
            return;
        }
        let mut transform = self.entity.transform();
        self.chain_destroy(transform.position);

        if let Some(point) = contact {
            if point.distance(transform.position) > RELOCATE_MIN_DISTANCE {
                transform.position = point;
                self.entity.set_transform(transform);
            }
        }
        self.entity.set_velocity(DVec3::ZERO);

        let debris = match self.context.host.spawn_debris(transform) {
            Ok(id) => Some(id),
            Err(e) => {
                error!(projectile = %self.id, error = %e, "failed to spawn explosion debris");
                None
            }
        };
        {
            let mut state = self.state.lock();
            state.debris = debris;
            state.last_position = transform.position;
        }

        info!(projectile = %self.id, cause = ?cause, "detonated");
        self.context.events.push(FlightEvent::Detonated {
            projectile: self.id,
            cause,
        });
        self.set_stage(Stage::Terminated);
        self.entity.destroy();
    }

    /// Destroy other registered projectiles inside the blast radius.
    fn chain_destroy(&self, position: DVec3) -> usize {
        let host = &self.context.host;
        let mut destroyed = 0;
        for id in host.entities_in_sphere(position, self.profile.explosion_radius) {
            if id == self.id {
                continue;
            }
            let Some(other) = self.context.registry.get(id) else {
                continue;
            };
            // Own slaves are indexed under this projectile.
            if std::ptr::eq(Arc::as_ptr(&other), self) {
                continue;
            }
            if let Some(entity) = host.entity(id) {
                debug!(projectile = %self.id, victim = %id, "chain destruction");
                entity.destroy();
                destroyed += 1;
            }
        }
        destroyed
    }

    // ---- Medium pass ----

    /// Every 10th tick: stage transitions, retargeting and network sync.
    pub fn update_medium(self: &Arc<Self>) {
        if self.is_stopped() {
            return;
        }
        let now = self.context.now();
        let transform = self.entity.transform();
        let velocity = self.entity.velocity();

        {
            let mut state = self.state.lock();
            self.evaluate_stage(&mut state, &transform, now);
            match self.stage() {
                Stage::SemiActive => self.update_lead(&mut state, &transform, velocity),
                Stage::Guided if self.profile.target_range > MIN_WEAPON_RANGE => {
                    self.retarget(&mut state, &transform, now)
                }
                _ => {}
            }
        }

        self.sync_network(&transform, velocity, now);
    }

    fn evaluate_stage(&self, state: &mut FlightState, transform: &Transform, now: f64) {
        let position = transform.position;
        let launcher = (!self.fired_by.is_closed()).then(|| self.fired_by.transform());
        let ctx = StageContext {
            stage: self.stage(),
            semi_active: self.profile.semi_active,
            boost_distance: self.profile.boost_distance,
            has_gravity: state.gravity.is_some(),
            rail_travel: state
                .rail
                .map_or(0.0, |r| r.travel(launcher.as_ref(), position)),
            arming_distance: RAIL_ARMING_DIAGONALS * self.entity.local_aabb().diagonal(),
            distance_from_launch: position.distance(state.launch_position),
            distance_to_target: state
                .lock
                .target
                .current_position(now)
                .map(|p| p.distance(position)),
            now,
            guidance_expires_at: state.guidance_expires_at,
        };

        let update = stages::evaluate(&ctx);
        if !update.stage_changed || !self.set_stage(update.new_stage) {
            return;
        }
        if update.start_guidance_timer {
            state.guidance_expires_at = Some(now + self.profile.guidance_seconds);
        }
        if update.clear_gravity {
            state.gravity = None;
        }
        if update.clear_rail {
            state.rail = None;
        }
        if update.new_stage == Stage::Terminated {
            warn!(projectile = %self.id, "no gravity field for boost, terminating guidance");
        }
    }

    fn update_lead(&self, state: &mut FlightState, transform: &Transform, velocity: DVec3) {
        let aim = self
            .launcher
            .upgrade()
            .and_then(|l| l.block().turret_aim());
        if let Target::SemiActiveDesignator {
            designator,
            lead_point,
        } = &mut state.lock.target
        {
            if designator.is_closed() {
                *lead_point = None;
                return;
            }
            let d = designator.transform();
            let forward = aim.unwrap_or_else(|| d.forward());
            *lead_point = Some(semi_active_lead(d.position, forward, transform.position, velocity));
        }
    }

    fn retarget(&self, state: &mut FlightState, transform: &Transform, now: f64) {
        match &state.lock.target {
            Target::WorldEntity { entity } if entity.is_closed() => {
                debug!(projectile = %self.id, target = %entity.id(), "target destroyed");
                state.lock.set(Target::None);
            }
            Target::RememberedSighting { sighting } => {
                let id = sighting.entity;
                if self.context.host.entity(id).is_none() {
                    debug!(projectile = %self.id, target = %id, "remembered target gone");
                    state.lock.set(Target::None);
                } else if self.profile.has_relay {
                    let fresher = self
                        .launcher
                        .upgrade()
                        .and_then(|l| l.relay())
                        .and_then(|relay| relay.try_get_sighting(id))
                        .filter(|s| s.seen_at > sighting.seen_at);
                    if let Some(s) = fresher {
                        state.lock.set(Target::RememberedSighting { sighting: s });
                    }
                }
            }
            _ => {}
        }

        if !state.lock.target.is_none() {
            return;
        }
        if self.profile.has_radar && self.acquire_by_radar(state, transform) {
            return;
        }
        if self.profile.has_relay && now >= state.next_retarget_at {
            self.retarget_from_network(state, transform, now);
        }
    }

    /// Closest eligible sighting in the launcher's relay network, or only the
    /// designated entity when the weapon names one.
    fn retarget_from_network(&self, state: &mut FlightState, transform: &Transform, now: f64) -> bool {
        let Some(relay) = self.launcher.upgrade().and_then(|l| l.relay()) else {
            return false;
        };
        if let Some(id) = self.designated {
            return match relay.try_get_sighting(id) {
                Some(sighting) => {
                    self.adopt_sighting(state, sighting);
                    true
                }
                None => {
                    trace!(projectile = %self.id, target = %id, "designated target not on relay network");
                    false
                }
            };
        }
        let host = &self.context.host;
        let position = transform.position;
        let forward = transform.forward();
        let max_sq = self.profile.max_trajectory * self.profile.max_trajectory;
        let cos_cone = self.profile.cos_acquisition_angle;

        let blacklist = &mut state.blacklist;
        let mut best: Option<(f64, Sighting)> = None;
        relay.for_each_sighting(&mut |s| {
            if s.entity == self.id || !s.is_recent(now) || blacklist.contains(&s.entity) {
                return false;
            }
            if !self.allowed_targets.allows(s.category) || !host.is_hostile(self.owner, s.entity) {
                return false;
            }
            let predicted = s.predicted_position(now);
            let distance_sq = predicted.distance_squared(position);
            if distance_sq > max_sq {
                return false;
            }
            if let Some(dir) = (predicted - position).try_normalize() {
                if forward.dot(dir) < cos_cone {
                    blacklist.insert(s.entity);
                    return false;
                }
            }
            if best.as_ref().map_or(true, |(d, _)| distance_sq < *d) {
                best = Some((distance_sq, s.clone()));
            }
            false
        });

        match best {
            Some((_, sighting)) => {
                self.adopt_sighting(state, sighting);
                true
            }
            None => {
                state.next_retarget_at = now + RETARGET_BACKOFF_SECS;
                trace!(projectile = %self.id, "no target on relay network");
                false
            }
        }
    }

    fn adopt_sighting(&self, state: &mut FlightState, sighting: Sighting) {
        debug!(projectile = %self.id, target = %sighting.entity, "target from relay network");
        self.context.events.push(FlightEvent::Retargeted {
            projectile: self.id,
            target: Some(sighting.entity),
        });
        state.lock.set(Target::RememberedSighting { sighting });
    }

    /// Closest eligible entity inside the onboard radar's range and cone.
    fn acquire_by_radar(&self, state: &mut FlightState, transform: &Transform) -> bool {
        let host = &self.context.host;
        let position = transform.position;
        let forward = transform.forward();
        let found = host
            .entities_in_sphere(position, self.profile.radar_range)
            .into_iter()
            .filter(|id| *id != self.id && !state.blacklist.contains(id))
            .filter_map(|id| host.entity(id))
            .filter(|e| {
                self.allowed_targets.allows(e.category()) && host.is_hostile(self.owner, e.id())
            })
            .filter(|e| {
                (e.transform().position - position)
                    .try_normalize()
                    .is_some_and(|dir| forward.dot(dir) >= self.profile.cos_acquisition_angle)
            })
            .min_by(|a, b| {
                let da = a.transform().position.distance_squared(position);
                let db = b.transform().position.distance_squared(position);
                da.total_cmp(&db)
            });

        match found {
            Some(entity) => {
                debug!(projectile = %self.id, target = %entity.id(), "radar contact");
                self.context.events.push(FlightEvent::Retargeted {
                    projectile: self.id,
                    target: Some(entity.id()),
                });
                state.lock.set(Target::WorldEntity { entity });
                true
            }
            None => false,
        }
    }

    fn sync_network(&self, transform: &Transform, velocity: DVec3, now: f64) {
        let Some(relay) = self.launcher.upgrade().and_then(|l| l.relay()) else {
            return;
        };
        relay.push_self_sighting(Sighting {
            entity: self.id,
            position: transform.position,
            velocity,
            seen_at: now,
            category: EntityCategory::Missile,
        });
    }

    // ---- Slow pass ----

    /// Every 100th tick: refresh gravity, forget rejected sightings.
    pub fn update_slow(&self) {
        if self.is_stopped() {
            return;
        }
        let position = self.entity.transform().position;
        let mut state = self.state.lock();
        state.blacklist.clear();

        if state.gravity.is_none() {
            return;
        }
        let sample = self.context.host.gravity_at(position);
        let keep = match (state.gravity.as_mut(), sample) {
            (Some(gravity), Some(sample)) => gravity.refresh(sample),
            _ => false,
        };
        if !keep {
            debug!(projectile = %self.id, "left gravity field");
            state.gravity = None;
        }
    }

    // ---- Termination ----

    /// The owned entity is being destroyed. Safe from any thread and idempotent.
    pub fn on_destroyed(self: &Arc<Self>) {
        self.mark_exploded();
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some((handle, ids)) = self.registration.lock().take() {
            self.context.registry.unregister(handle, &ids);
        }
        debug!(projectile = %self.id, "torn down");
        self.context
            .events
            .push(FlightEvent::TornDown { projectile: self.id });

        let this = Arc::clone(self);
        self.context.dispatcher.defer(move || this.cleanup());
    }

    fn mark_exploded(&self) {
        let mut current = self.stage.load(Ordering::Acquire);
        while current < Stage::Terminated as u8 {
            match self.stage.compare_exchange(
                current,
                Stage::Exploded as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.context.events.push(FlightEvent::StageChanged {
                        projectile: self.id,
                        from: Stage::from_u8(current),
                        to: Stage::Exploded,
                    });
                    return;
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// A cluster slave left the world.
    pub fn on_slave_destroyed(&self, id: EntityId) {
        let removed = self
            .state
            .lock()
            .cluster
            .as_mut()
            .is_some_and(|c| c.remove_slave(id));
        if let Some((_, ids)) = self.registration.lock().as_mut() {
            ids.retain(|i| *i != id);
        }
        self.context.registry.forget(id);
        if removed {
            trace!(projectile = %self.id, slave = %id, "cluster slave lost");
        }
    }

    /// Authoritative thread. Each step runs regardless of the others failing.
    fn cleanup(&self) {
        let (debris, slaves, position) = {
            let mut state = self.state.lock();
            let slaves = state
                .cluster
                .as_mut()
                .map(Cluster::take_slaves)
                .unwrap_or_default();
            (state.debris.take(), slaves, state.last_position)
        };
        for slave in &slaves {
            self.context.registry.forget(slave.id());
        }
        if !self.context.is_server {
            return;
        }

        if let Some(id) = debris {
            match self.context.host.entity(id) {
                Some(entity) => entity.destroy(),
                None => debug!(projectile = %self.id, debris = %id, "debris already gone"),
            }
        }

        let chained = self.chain_destroy(position);
        if chained > 0 {
            info!(projectile = %self.id, chained, "chain destruction");
        }

        if self.profile.has_emp() {
            match self.context.host.apply_emp(
                position,
                self.profile.explosion_radius,
                self.profile.emp_strength,
                self.profile.emp_seconds,
                self.owner,
            ) {
                Ok(affected) => info!(projectile = %self.id, affected, "emp applied"),
                Err(e) => error!(projectile = %self.id, error = %e, "emp failed"),
            }
        }

        for slave in slaves {
            slave.destroy();
        }
    }
}

impl std::fmt::Debug for GuidedProjectile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuidedProjectile")
            .field("id", &self.id)
            .field("ammo", &self.ammo.name)
            .field("stage", &self.stage())
            .finish()
    }
}
