//! Headless host backed by a hecs world.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use glam::DVec3;
use hecs::{Component, World};
use parking_lot::{Mutex, RwLock};
use tracing::trace;

use seeker_core::constants::DT;
use seeker_core::enums::EntityCategory;
use seeker_core::types::{Aabb, EntityId, OwnerId, Transform};

use crate::host::{
    CloseCallback, EntityRef, GravitySample, Host, HostError, PhysicsQuery, RayHit, WorldEntity,
};
use crate::launcher::WeaponBlock;
use crate::relay::{Sighting, SightingStore};

/// Half extents of a spawned round (m).
pub const ROUND_HALF_EXTENTS: DVec3 = DVec3::new(0.2, 0.2, 1.0);

#[derive(Debug, Clone, Copy)]
struct Velocity(DVec3);

#[derive(Debug, Clone, Copy)]
struct Bounds(Aabb);

#[derive(Debug, Clone, Copy)]
struct Owner(OwnerId);

/// Description of a body to spawn.
#[derive(Debug, Clone, Copy)]
pub struct BodySpec {
    pub transform: Transform,
    pub velocity: DVec3,
    pub half_extents: DVec3,
    pub category: EntityCategory,
    pub owner: Option<OwnerId>,
}

impl BodySpec {
    pub fn new(position: DVec3, category: EntityCategory) -> Self {
        Self {
            transform: Transform::new(position, glam::DQuat::IDENTITY),
            velocity: DVec3::ZERO,
            half_extents: DVec3::splat(0.5),
            category,
            owner: None,
        }
    }

    pub fn facing(mut self, forward: DVec3) -> Self {
        self.transform = Transform::looking(self.transform.position, forward);
        self
    }

    pub fn moving(mut self, velocity: DVec3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn half_extents(mut self, half: DVec3) -> Self {
        self.half_extents = half;
        self
    }

    pub fn owned_by(mut self, owner: OwnerId) -> Self {
        self.owner = Some(owner);
        self
    }
}

/// Point gravity source with a hard edge.
#[derive(Debug, Clone, Copy)]
pub struct GravityWell {
    pub body: EntityId,
    pub center: DVec3,
    pub radius: f64,
    pub acceleration: f64,
}

/// One recorded electromagnetic pulse.
#[derive(Debug, Clone, PartialEq)]
pub struct EmpRecord {
    pub center: DVec3,
    pub radius: f64,
    pub strength: f64,
    pub seconds: f64,
    pub owner: OwnerId,
    pub affected: Vec<EntityId>,
}

pub struct SandboxHost {
    me: Weak<SandboxHost>,
    world: RwLock<World>,
    ids: RwLock<HashMap<EntityId, hecs::Entity>>,
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<EntityId, Vec<CloseCallback>>>,
    /// Last transform of destroyed entities.
    graveyard: RwLock<HashMap<EntityId, Transform>>,
    wells: RwLock<Vec<GravityWell>>,
    allies: RwLock<HashSet<(OwnerId, OwnerId)>>,
    relay: Arc<SightingStore>,
    fail_debris: AtomicBool,
    emp_log: Mutex<Vec<EmpRecord>>,
    transform_writes: AtomicU64,
}

impl SandboxHost {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| SandboxHost {
            me: me.clone(),
            world: RwLock::new(World::new()),
            ids: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            subscribers: Mutex::new(HashMap::new()),
            graveyard: RwLock::new(HashMap::new()),
            wells: RwLock::new(Vec::new()),
            allies: RwLock::new(HashSet::new()),
            relay: Arc::new(SightingStore::new()),
            fail_debris: AtomicBool::new(false),
            emp_log: Mutex::new(Vec::new()),
            transform_writes: AtomicU64::new(0),
        })
    }

    pub fn spawn(&self, spec: BodySpec) -> EntityRef {
        let id = EntityId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let bounds = Bounds(Aabb::from_half_extents(spec.half_extents));
        let entity = {
            let mut world = self.world.write();
            match spec.owner {
                Some(owner) => world.spawn((id, spec.transform, Velocity(spec.velocity), bounds, spec.category, Owner(owner))),
                None => world.spawn((id, spec.transform, Velocity(spec.velocity), bounds, spec.category)),
            }
        };
        self.ids.write().insert(id, entity);
        trace!(entity = %id, category = ?spec.category, "sandbox spawn");
        self.handle(id)
    }

    /// Handle to `id`, live or not.
    pub fn handle(&self, id: EntityId) -> EntityRef {
        Arc::new(SandboxEntity {
            id,
            host: self.me.clone(),
        })
    }

    /// Spawn a round the way the weapon would emit it.
    pub fn spawn_round(&self, weapon: &dyn WeaponBlock, speed: f64) -> EntityRef {
        let block = weapon.entity();
        let t = block.transform();
        let bounds = block.local_aabb();
        let center = bounds.center();
        let local = DVec3::new(center.x, center.y, bounds.min.z - weapon.spawn_forward_offset() * 0.5);
        let forward = weapon.turret_aim().unwrap_or_else(|| t.forward());
        let spec = BodySpec::new(t.transform_point(local), EntityCategory::Missile)
            .facing(forward)
            .moving(forward * speed + block.velocity())
            .half_extents(ROUND_HALF_EXTENTS)
            .owned_by(weapon.owner());
        self.spawn(spec)
    }

    /// Publish the current state of `id` to the relay store.
    pub fn observe(&self, id: EntityId, now: f64) -> bool {
        let (Some(transform), Some(velocity), Some(category)) = (
            self.read::<Transform>(id),
            self.read::<Velocity>(id),
            self.read::<EntityCategory>(id),
        ) else {
            return false;
        };
        self.relay.record(Sighting {
            entity: id,
            position: transform.position,
            velocity: velocity.0,
            seen_at: now,
            category,
        });
        true
    }

    /// Integrate velocities over one tick.
    pub fn step(&self) {
        let mut world = self.world.write();
        for (_entity, (transform, velocity)) in world.query_mut::<(&mut Transform, &Velocity)>() {
            transform.position += velocity.0 * DT;
        }
    }

    pub fn relay(&self) -> Arc<SightingStore> {
        Arc::clone(&self.relay)
    }

    pub fn add_gravity_well(&self, well: GravityWell) {
        self.wells.write().push(well);
    }

    pub fn set_allied(&self, a: OwnerId, b: OwnerId) {
        let mut allies = self.allies.write();
        allies.insert((a, b));
        allies.insert((b, a));
    }

    /// Make every subsequent debris spawn fail.
    pub fn set_fail_debris(&self, fail: bool) {
        self.fail_debris.store(fail, Ordering::Relaxed);
    }

    pub fn emp_log(&self) -> Vec<EmpRecord> {
        self.emp_log.lock().clone()
    }

    /// Number of `set_transform` calls so far.
    pub fn transform_writes(&self) -> u64 {
        self.transform_writes.load(Ordering::Relaxed)
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.ids.read().contains_key(&id)
    }

    pub fn entity_count(&self) -> usize {
        self.ids.read().len()
    }

    pub fn entities_of(&self, category: EntityCategory) -> Vec<EntityId> {
        let world = self.world.read();
        let mut found: Vec<EntityId> = world
            .query::<(&EntityId, &EntityCategory)>()
            .iter()
            .filter(|(_, (_, c))| **c == category)
            .map(|(_, (id, _))| *id)
            .collect();
        found.sort();
        found
    }

    // ---- Component access ----

    fn read<T: Component + Copy>(&self, id: EntityId) -> Option<T> {
        let ids = self.ids.read();
        let entity = *ids.get(&id)?;
        let world = self.world.read();
        let value = world.get::<&T>(entity).ok().map(|c| *c);
        value
    }

    fn write<T: Component>(&self, id: EntityId, value: T) -> bool {
        let ids = self.ids.read();
        let Some(entity) = ids.get(&id).copied() else {
            return false;
        };
        let world = self.world.write();
        let written = match world.get::<&mut T>(entity) {
            Ok(mut c) => {
                *c = value;
                true
            }
            Err(_) => false,
        };
        written
    }

    fn destroy(&self, id: EntityId) {
        let callbacks = {
            let Some(entity) = self.ids.write().remove(&id) else {
                return;
            };
            let mut world = self.world.write();
            if let Ok(t) = world.get::<&Transform>(entity) {
                self.graveyard.write().insert(id, *t);
            }
            // Already looked up through `ids`, cannot be missing.
            let _ = world.despawn(entity);
            self.subscribers.lock().remove(&id).unwrap_or_default()
        };
        trace!(entity = %id, callbacks = callbacks.len(), "sandbox destroy");
        for callback in callbacks {
            callback(id);
        }
    }

    fn subscribe(&self, id: EntityId, callback: CloseCallback) {
        let immediate = {
            let mut subscribers = self.subscribers.lock();
            if self.is_alive(id) {
                subscribers.entry(id).or_default().push(callback);
                None
            } else {
                Some(callback)
            }
        };
        if let Some(callback) = immediate {
            callback(id);
        }
    }

    /// Ray against one body's oriented box.
    fn ray_against(
        id: EntityId,
        transform: &Transform,
        bounds: &Aabb,
        from: DVec3,
        to: DVec3,
    ) -> Option<RayHit> {
        let length = from.distance(to);
        let dir = (to - from).try_normalize()?;
        let local_from = transform.inverse_transform_point(from);
        let local_dir = transform.rotation.inverse() * dir;
        let distance = bounds.ray_entry(local_from, local_dir, length)?;
        Some(RayHit {
            entity: id,
            position: from + dir * distance,
            distance,
        })
    }
}

impl PhysicsQuery for SandboxHost {
    fn raycast_world(&self, from: DVec3, to: DVec3, ignore: Option<EntityId>) -> Option<RayHit> {
        let world = self.world.read();
        let mut query = world.query::<(&EntityId, &Transform, &Bounds)>();
        query
            .iter()
            .filter(|(_, (id, _, _))| Some(**id) != ignore)
            .filter_map(|(_, (id, t, b))| Self::ray_against(*id, t, &b.0, from, to))
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    fn raycast_entity(&self, entity: EntityId, from: DVec3, to: DVec3) -> Option<RayHit> {
        let transform = self.read::<Transform>(entity)?;
        let bounds = self.read::<Bounds>(entity)?;
        Self::ray_against(entity, &transform, &bounds.0, from, to)
    }

    fn entities_in_sphere(&self, center: DVec3, radius: f64) -> Vec<EntityId> {
        let world = self.world.read();
        let mut query = world.query::<(&EntityId, &Transform, &Bounds)>();
        query
            .iter()
            .filter(|(_, (_, t, b))| {
                b.0.distance_squared_to_point(t.inverse_transform_point(center)) <= radius * radius
            })
            .map(|(_, (id, _, _))| *id)
            .collect()
    }
}

impl Host for SandboxHost {
    fn entity(&self, id: EntityId) -> Option<EntityRef> {
        self.is_alive(id).then(|| self.handle(id))
    }

    fn gravity_at(&self, position: DVec3) -> Option<GravitySample> {
        self.wells
            .read()
            .iter()
            .filter(|w| w.center.distance(position) <= w.radius)
            .max_by(|a, b| a.acceleration.total_cmp(&b.acceleration))
            .and_then(|w| {
                let normal = (w.center - position).try_normalize()?;
                Some(GravitySample {
                    body: w.body,
                    normal,
                    acceleration: w.acceleration,
                })
            })
    }

    fn spawn_debris(&self, at: Transform) -> Result<EntityId, HostError> {
        if self.fail_debris.load(Ordering::Relaxed) {
            return Err(HostError::Spawn {
                what: "debris",
                reason: "sandbox configured to fail".to_string(),
            });
        }
        let mut spec = BodySpec::new(at.position, EntityCategory::Unknown).half_extents(DVec3::splat(0.1));
        spec.transform.rotation = at.rotation;
        Ok(self.spawn(spec).id())
    }

    fn apply_emp(
        &self,
        center: DVec3,
        radius: f64,
        strength: f64,
        seconds: f64,
        owner: OwnerId,
    ) -> Result<usize, HostError> {
        if !strength.is_finite() || strength <= 0.0 {
            return Err(HostError::Effect(format!("invalid emp strength {strength}")));
        }
        let affected = self.entities_in_sphere(center, radius);
        let count = affected.len();
        trace!(owner = owner.0, radius, count, "sandbox emp");
        self.emp_log.lock().push(EmpRecord {
            center,
            radius,
            strength,
            seconds,
            owner,
            affected,
        });
        Ok(count)
    }

    fn is_hostile(&self, owner: OwnerId, entity: EntityId) -> bool {
        match self.owner_of(entity) {
            None => true,
            Some(other) if other == owner => false,
            Some(other) => !self.allies.read().contains(&(owner, other)),
        }
    }

    fn owner_of(&self, entity: EntityId) -> Option<OwnerId> {
        self.read::<Owner>(entity).map(|o| o.0)
    }
}

/// Handle to one sandbox body.
pub struct SandboxEntity {
    id: EntityId,
    host: Weak<SandboxHost>,
}

impl WorldEntity for SandboxEntity {
    fn id(&self) -> EntityId {
        self.id
    }

    fn transform(&self) -> Transform {
        let Some(host) = self.host.upgrade() else {
            return Transform::default();
        };
        host.read::<Transform>(self.id)
            .or_else(|| host.graveyard.read().get(&self.id).copied())
            .unwrap_or_default()
    }

    fn set_transform(&self, transform: Transform) {
        if let Some(host) = self.host.upgrade() {
            if host.write(self.id, transform) {
                host.transform_writes.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn velocity(&self) -> DVec3 {
        self.host
            .upgrade()
            .and_then(|h| h.read::<Velocity>(self.id))
            .map_or(DVec3::ZERO, |v| v.0)
    }

    fn set_velocity(&self, velocity: DVec3) {
        if let Some(host) = self.host.upgrade() {
            host.write(self.id, Velocity(velocity));
        }
    }

    fn local_aabb(&self) -> Aabb {
        self.host
            .upgrade()
            .and_then(|h| h.read::<Bounds>(self.id))
            .map_or(Aabb::from_half_extents(DVec3::ZERO), |b| b.0)
    }

    fn category(&self) -> EntityCategory {
        self.host
            .upgrade()
            .and_then(|h| h.read::<EntityCategory>(self.id))
            .unwrap_or_default()
    }

    fn is_closed(&self) -> bool {
        self.host.upgrade().map_or(true, |h| !h.is_alive(self.id))
    }

    fn destroy(&self) {
        if let Some(host) = self.host.upgrade() {
            host.destroy(self.id);
        }
    }

    fn subscribe_close(&self, callback: CloseCallback) {
        match self.host.upgrade() {
            Some(host) => host.subscribe(self.id, callback),
            None => callback(self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raycast_hits_rotated_box() {
        let host = SandboxHost::new();
        let body = host.spawn(
            BodySpec::new(DVec3::new(0.0, 0.0, -10.0), EntityCategory::LargeGrid)
                .facing(DVec3::X)
                .half_extents(DVec3::new(1.0, 1.0, 3.0)),
        );
        // Facing +X puts the long axis along X, so the near face is 1 m away on Z.
        let hit = host
            .raycast_world(DVec3::ZERO, DVec3::new(0.0, 0.0, -20.0), None)
            .expect("ray should hit the body");
        assert_eq!(hit.entity, body.id());
        assert!((hit.distance - 9.0).abs() < 1e-9, "distance was {}", hit.distance);
        assert!(host.raycast_world(DVec3::ZERO, DVec3::new(0.0, 0.0, -20.0), Some(body.id())).is_none());
    }

    #[test]
    fn test_sphere_query_uses_box_surface() {
        let host = SandboxHost::new();
        let body = host.spawn(
            BodySpec::new(DVec3::new(5.0, 0.0, 0.0), EntityCategory::SmallGrid)
                .half_extents(DVec3::splat(1.0)),
        );
        assert!(host.entities_in_sphere(DVec3::ZERO, 4.1).contains(&body.id()));
        assert!(host.entities_in_sphere(DVec3::ZERO, 3.9).is_empty());
    }

    #[test]
    fn test_close_callbacks_run_once() {
        let host = SandboxHost::new();
        let body = host.spawn(BodySpec::new(DVec3::ZERO, EntityCategory::Missile));
        let count = Arc::new(AtomicU64::new(0));
        let c = Arc::clone(&count);
        body.subscribe_close(Box::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        body.destroy();
        body.destroy();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(body.is_closed());

        let c = Arc::clone(&count);
        body.subscribe_close(Box::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(count.load(Ordering::SeqCst), 2, "late subscriber runs immediately");
    }

    #[test]
    fn test_destroyed_entity_keeps_last_transform() {
        let host = SandboxHost::new();
        let body = host.spawn(BodySpec::new(DVec3::new(1.0, 2.0, 3.0), EntityCategory::Meteor).moving(DVec3::X * 60.0));
        host.step();
        body.destroy();
        assert!((body.transform().position - DVec3::new(2.0, 2.0, 3.0)).length() < 1e-9);
        assert_eq!(body.velocity(), DVec3::ZERO);
    }

    #[test]
    fn test_hostility_and_allies() {
        let host = SandboxHost::new();
        let a = OwnerId(1);
        let b = OwnerId(2);
        let mine = host.spawn(BodySpec::new(DVec3::ZERO, EntityCategory::SmallGrid).owned_by(a));
        let theirs = host.spawn(BodySpec::new(DVec3::ZERO, EntityCategory::SmallGrid).owned_by(b));
        let rock = host.spawn(BodySpec::new(DVec3::ZERO, EntityCategory::Meteor));
        assert!(!host.is_hostile(a, mine.id()));
        assert!(host.is_hostile(a, theirs.id()));
        assert!(host.is_hostile(a, rock.id()), "unowned entities are hostile");
        host.set_allied(a, b);
        assert!(!host.is_hostile(a, theirs.id()));
    }

    #[test]
    fn test_gravity_picks_strongest_well() {
        let host = SandboxHost::new();
        host.add_gravity_well(GravityWell { body: EntityId(100), center: DVec3::new(0.0, -1000.0, 0.0), radius: 5000.0, acceleration: 9.81 });
        host.add_gravity_well(GravityWell { body: EntityId(101), center: DVec3::new(1000.0, 0.0, 0.0), radius: 5000.0, acceleration: 3.0 });
        let sample = host.gravity_at(DVec3::ZERO).expect("inside both wells");
        assert_eq!(sample.body, EntityId(100));
        assert!((sample.normal - DVec3::NEG_Y).length() < 1e-12);
        assert!(host.gravity_at(DVec3::new(0.0, 10_000.0, 0.0)).is_none());
    }

    #[test]
    fn test_debris_failure_is_reported() {
        let host = SandboxHost::new();
        host.set_fail_debris(true);
        assert!(matches!(host.spawn_debris(Transform::default()), Err(HostError::Spawn { .. })));
        host.set_fail_debris(false);
        assert!(host.spawn_debris(Transform::default()).is_ok());
    }
}
