//! Firing-side bookkeeping: which spawned rounds belong to a weapon, what it
//! has loaded, cluster accumulation and the post-cluster cooldown.

use std::sync::Arc;

use glam::DVec3;
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use seeker_core::ammo::{Ammo, AmmoCatalog};
use seeker_core::constants::*;
use seeker_core::enums::{InitialTargetStatus, TargetTypes};
use seeker_core::events::FlightEvent;
use seeker_core::types::{Aabb, EntityId, OwnerId};

use crate::cluster::Cluster;
use crate::context::FlightContext;
use crate::host::EntityRef;
use crate::projectile::{GuidedProjectile, LaunchParams};
use crate::relay::{RelayNetwork, Sighting};
use crate::target::Target;

/// A weapon block as seen by the launcher.
///
/// Setters are only called from the authoritative thread.
pub trait WeaponBlock: Send + Sync {
    /// The block's own entity.
    fn entity(&self) -> EntityRef;

    fn owner(&self) -> OwnerId;

    fn is_shooting(&self) -> bool;

    fn set_shooting(&self, shooting: bool);

    fn is_enabled(&self) -> bool;

    fn set_enabled(&self, enabled: bool);

    /// Turret-style mount that claims regardless of the shooting flag.
    fn is_slewing(&self) -> bool {
        false
    }

    /// Current aim of a slewing mount, world space.
    fn turret_aim(&self) -> Option<DVec3> {
        None
    }

    /// How far ahead of the block rounds appear (m).
    fn spawn_forward_offset(&self) -> f64;

    /// Edge length of one grid cell (m).
    fn grid_size(&self) -> f64;

    fn inventory_mass(&self) -> f64;

    fn inventory_volume(&self) -> f64;

    /// Magazine name of the loaded ammunition.
    fn loaded_magazine(&self) -> Option<String>;

    /// Explicitly configured target.
    fn target_entity_id(&self) -> Option<EntityId>;

    fn allowed_targets(&self) -> TargetTypes;

    /// Relay network reachable from the block's antenna.
    fn relay(&self) -> Option<Arc<dyn RelayNetwork>>;

    /// Engagement range (m).
    fn range(&self) -> f64;
}

#[derive(Default)]
struct LauncherState {
    loaded: Option<Arc<Ammo>>,
    last_mass: f64,
    last_volume: f64,
    last_check_tick: Option<u64>,
    pending_cluster: Vec<EntityRef>,
    cooldown_until: Option<f64>,
    initial_target_status: InitialTargetStatus,
}

pub struct Launcher {
    block: Arc<dyn WeaponBlock>,
    entity: EntityRef,
    catalog: Arc<AmmoCatalog>,
    context: Arc<FlightContext>,
    /// Block-local volume a freshly spawned round must appear in.
    spawn_box: Aabb,
    state: Mutex<LauncherState>,
}

impl Launcher {
    pub fn new(block: Arc<dyn WeaponBlock>, catalog: Arc<AmmoCatalog>, context: Arc<FlightContext>) -> Self {
        let entity = block.entity();
        let bounds = entity.local_aabb();
        let ahead = DVec3::NEG_Z * block.spawn_forward_offset();
        let mut spawn_box = Aabb::from_points(&[
            bounds.min,
            bounds.max,
            bounds.min + ahead,
            bounds.max + ahead,
        ]);
        if block.is_slewing() {
            spawn_box = spawn_box.inflate(TURRET_SPAWN_BOX_INFLATE_CELLS * block.grid_size());
        }
        Self {
            block,
            entity,
            catalog,
            context,
            spawn_box,
            state: Mutex::new(LauncherState::default()),
        }
    }

    pub fn id(&self) -> EntityId {
        self.entity.id()
    }

    pub fn block(&self) -> &Arc<dyn WeaponBlock> {
        &self.block
    }

    pub fn relay(&self) -> Option<Arc<dyn RelayNetwork>> {
        self.block.relay()
    }

    pub fn spawn_box(&self) -> Aabb {
        self.spawn_box
    }

    pub fn initial_target_status(&self) -> InitialTargetStatus {
        self.state.lock().initial_target_status
    }

    pub fn loaded_ammo(&self) -> Option<Arc<Ammo>> {
        self.state.lock().loaded.clone()
    }

    pub fn pending_cluster_len(&self) -> usize {
        self.state.lock().pending_cluster.len()
    }

    pub fn is_cooling_down(&self) -> bool {
        self.state.lock().cooldown_until.is_some()
    }

    /// Whether `round` was just fired by this weapon.
    pub fn matches(&self, round: &EntityRef) -> bool {
        if self.entity.is_closed() || !(self.block.is_shooting() || self.block.is_slewing()) {
            return false;
        }
        let block_transform = self.entity.transform();
        let round_transform = round.transform();
        let local = block_transform.inverse_transform_point(round_transform.position);
        if !self.spawn_box.contains(local) {
            return false;
        }
        let aim = self
            .block
            .turret_aim()
            .unwrap_or_else(|| block_transform.forward());
        let diff = (round_transform.forward() - aim).abs();
        diff.x + diff.y + diff.z <= CLAIM_FACING_TOLERANCE
    }

    /// Take ownership of a freshly spawned round. Rounds with unknown or
    /// unguided ammunition are claimed but left unguided.
    pub fn claim(self: &Arc<Self>, round: &EntityRef) -> bool {
        if !self.matches(round) {
            return false;
        }
        let ammo = self
            .refresh_ammo(self.context.clock.tick())
            .filter(|a| a.is_guided());
        let Some(ammo) = ammo else {
            trace!(launcher = %self.id(), round = %round.id(), "claimed unguided round");
            return true;
        };

        if ammo.is_cluster {
            self.accumulate(round, ammo);
        } else {
            self.launch(Arc::clone(round), ammo, None);
        }
        true
    }

    fn accumulate(self: &Arc<Self>, round: &EntityRef, ammo: Arc<Ammo>) {
        let capacity = ammo.definition.magazine_capacity.max(1) as usize;
        let members = {
            let mut state = self.state.lock();
            if state.pending_cluster.len() >= capacity {
                drop(state);
                warn!(launcher = %self.id(), round = %round.id(), "cluster over capacity, destroying round");
                round.destroy();
                return;
            }
            state.pending_cluster.push(Arc::clone(round));
            if state.pending_cluster.len() == 1 {
                // Keep the weapon emitting the rest of the cluster.
                self.block.set_shooting(true);
            }
            if state.pending_cluster.len() < capacity {
                return;
            }
            std::mem::take(&mut state.pending_cluster)
        };

        let Some(cluster) = Cluster::form(members) else {
            return;
        };
        let master = Arc::clone(&cluster.master);
        let cooldown = ammo
            .description
            .as_ref()
            .map_or(0.0, |d| d.cluster_cooldown);
        self.launch(master, ammo, Some(cluster));
        self.start_cooldown(cooldown);
    }

    fn launch(self: &Arc<Self>, entity: EntityRef, ammo: Arc<Ammo>, cluster: Option<Cluster>) -> Arc<GuidedProjectile> {
        let target = self.initial_target(&ammo, entity.transform().position);
        let params = LaunchParams {
            entity,
            ammo,
            launcher: Arc::downgrade(self),
            fired_by: Arc::clone(&self.entity),
            owner: self.block.owner(),
            allowed_targets: self.block.allowed_targets(),
            designated: self.block.target_entity_id(),
            from_slewing_mount: self.block.is_slewing(),
            target,
            cluster,
        };
        GuidedProjectile::launch(params, Arc::clone(&self.context))
    }

    fn start_cooldown(&self, seconds: f64) {
        let now = self.context.now();
        self.state.lock().cooldown_until = Some(now + seconds);
        self.block.set_shooting(false);
        self.block.set_enabled(false);
        info!(launcher = %self.id(), seconds, "cluster cooldown started");
        self.context.events.push(FlightEvent::CooldownStarted {
            launcher: self.id(),
            duration_secs: seconds,
        });
    }

    /// Per-tick bookkeeping on the authoritative thread.
    pub fn update(&self, tick: u64, now: f64) {
        let expired = {
            let mut state = self.state.lock();
            match state.cooldown_until {
                Some(until) if now >= until => {
                    state.cooldown_until = None;
                    true
                }
                Some(_) => {
                    if self.block.is_enabled() {
                        self.block.set_enabled(false);
                    }
                    false
                }
                None => false,
            }
        };
        if expired {
            // Shooting stays off.
            self.block.set_enabled(true);
            debug!(launcher = %self.id(), "cluster cooldown ended");
            self.context
                .events
                .push(FlightEvent::CooldownEnded { launcher: self.id() });
        }
        self.refresh_ammo(tick);
    }

    /// Re-read the loaded magazine when the inventory changed, at most once
    /// per check interval.
    fn refresh_ammo(&self, tick: u64) -> Option<Arc<Ammo>> {
        let mut state = self.state.lock();
        if let Some(last) = state.last_check_tick {
            if tick < last + INVENTORY_CHECK_INTERVAL {
                return state.loaded.clone();
            }
        }
        let mass = self.block.inventory_mass();
        let volume = self.block.inventory_volume();
        let unchanged = state.last_check_tick.is_some()
            && mass == state.last_mass
            && volume == state.last_volume;
        state.last_check_tick = Some(tick);
        if unchanged {
            return state.loaded.clone();
        }
        state.last_mass = mass;
        state.last_volume = volume;

        let magazine = self.block.loaded_magazine();
        state.loaded = magazine.as_deref().and_then(|m| self.catalog.get(m));
        debug!(
            launcher = %self.id(),
            magazine = ?magazine,
            guided = state.loaded.as_ref().is_some_and(|a| a.is_guided()),
            "loaded ammunition refreshed"
        );
        state.loaded.clone()
    }

    // ---- Initial targeting ----

    fn initial_target(&self, ammo: &Ammo, position: DVec3) -> Target {
        let now = self.context.now();
        let (target, status) = self.resolve_initial_target(ammo, position, now);
        self.state.lock().initial_target_status = status;

        match target.current_position(now) {
            Some(at) => {
                let distance = at.distance(position);
                let speed = ammo.average_speed(distance);
                let eta = if speed > 0.0 { distance / speed } else { f64::INFINITY };
                debug!(launcher = %self.id(), status = ?status, distance, eta, "initial target");
            }
            None => debug!(launcher = %self.id(), status = ?status, "no initial target"),
        }
        target
    }

    fn resolve_initial_target(&self, ammo: &Ammo, position: DVec3, now: f64) -> (Target, InitialTargetStatus) {
        if ammo.description.as_ref().is_some_and(|d| d.semi_active_laser) {
            let designator = Target::SemiActiveDesignator {
                designator: Arc::clone(&self.entity),
                lead_point: None,
            };
            return (designator, InitialTargetStatus::SemiActive);
        }

        let Some(relay) = self.block.relay() else {
            return (Target::None, InitialTargetStatus::NoStorage);
        };

        if let Some(id) = self.block.target_entity_id() {
            return match relay.try_get_sighting(id) {
                Some(sighting) => (self.resolve(sighting), InitialTargetStatus::FromWeapon),
                None => (Target::None, InitialTargetStatus::NotFoundId),
            };
        }

        let range = if self.block.range() < MIN_WEAPON_RANGE {
            ammo.definition.max_trajectory
        } else {
            self.block.range()
        };
        let range_sq = range * range;
        let allowed = self.block.allowed_targets();
        let owner = self.block.owner();
        let host = &self.context.host;

        let mut best: Option<(f64, Sighting)> = None;
        relay.for_each_sighting(&mut |s| {
            if !s.is_recent(now) || !allowed.allows(s.category) || !host.is_hostile(owner, s.entity) {
                return false;
            }
            let distance_sq = s.predicted_position(now).distance_squared(position);
            if distance_sq <= range_sq && best.as_ref().map_or(true, |(d, _)| distance_sq < *d) {
                best = Some((distance_sq, s.clone()));
            }
            false
        });

        match best {
            Some((_, sighting)) => (self.resolve(sighting), InitialTargetStatus::FromWeapon),
            None => (Target::None, InitialTargetStatus::NotFoundAny),
        }
    }

    /// A live entity when the host still has it, otherwise the sighting.
    fn resolve(&self, sighting: Sighting) -> Target {
        match self.context.host.entity(sighting.entity) {
            Some(entity) if !entity.is_closed() => Target::WorldEntity { entity },
            _ => Target::RememberedSighting { sighting },
        }
    }
}

impl std::fmt::Debug for Launcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Launcher")
            .field("id", &self.id())
            .field("spawn_box", &self.spawn_box)
            .finish()
    }
}
