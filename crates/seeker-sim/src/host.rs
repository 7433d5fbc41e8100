//! Capabilities the flight engine needs from the host simulation.
//!
//! The engine never holds concrete host objects. Entities, physics queries and
//! world effects are reached through these traits so any host (or the
//! headless sandbox) can drive it.

use std::sync::Arc;

use glam::DVec3;

use seeker_core::enums::EntityCategory;
use seeker_core::types::{Aabb, EntityId, OwnerId, Transform};

/// Called once when an entity is about to leave the world.
pub type CloseCallback = Box<dyn FnOnce(EntityId) + Send + 'static>;

/// Shared handle to a host entity.
pub type EntityRef = Arc<dyn WorldEntity>;

/// A live object in the host world.
///
/// Getters may be called from any thread. Setters and `destroy` are only
/// called from the authoritative thread.
pub trait WorldEntity: Send + Sync {
    fn id(&self) -> EntityId;

    fn transform(&self) -> Transform;

    fn set_transform(&self, transform: Transform);

    fn velocity(&self) -> DVec3;

    fn set_velocity(&self, velocity: DVec3);

    /// Bounds in the entity's local space.
    fn local_aabb(&self) -> Aabb;

    fn category(&self) -> EntityCategory;

    /// True once the entity has been destroyed.
    fn is_closed(&self) -> bool;

    /// Remove the entity from the world. Idempotent.
    fn destroy(&self);

    /// Register a callback for the entity's destruction. If the entity is
    /// already closed the callback runs immediately.
    fn subscribe_close(&self, callback: CloseCallback);
}

/// Result of a raycast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub entity: EntityId,
    pub position: DVec3,
    /// Distance from the ray origin (m).
    pub distance: f64,
}

/// Read-only spatial queries. Safe to call from worker threads.
pub trait PhysicsQuery: Send + Sync {
    /// First hit along `from -> to`, skipping `ignore`.
    fn raycast_world(&self, from: DVec3, to: DVec3, ignore: Option<EntityId>) -> Option<RayHit>;

    /// Hit against one specific entity only.
    fn raycast_entity(&self, entity: EntityId, from: DVec3, to: DVec3) -> Option<RayHit>;

    /// Every entity whose bounds reach into the sphere.
    fn entities_in_sphere(&self, center: DVec3, radius: f64) -> Vec<EntityId>;
}

/// Gravity at a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GravitySample {
    /// Body generating the field.
    pub body: EntityId,
    /// Unit vector pointing the way gravity pulls.
    pub normal: DVec3,
    /// Field strength (m/s²).
    pub acceleration: f64,
}

/// Failures reported by host calls.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("Failed to spawn {what}: {reason}")]
    Spawn { what: &'static str, reason: String },

    #[error("Entity {0} is closed")]
    Closed(EntityId),

    #[error("Effect failed: {0}")]
    Effect(String),
}

/// Everything the engine consumes from the host.
pub trait Host: PhysicsQuery {
    /// Look up a live entity.
    fn entity(&self, id: EntityId) -> Option<EntityRef>;

    /// Strongest gravity field at `position`, if any.
    fn gravity_at(&self, position: DVec3) -> Option<GravitySample>;

    /// Spawn the inert placeholder left behind by an explosion.
    fn spawn_debris(&self, at: Transform) -> Result<EntityId, HostError>;

    /// Electromagnetic pulse over the sphere at `center`, attributed to `owner`.
    /// Returns the number of entities affected.
    fn apply_emp(
        &self,
        center: DVec3,
        radius: f64,
        strength: f64,
        seconds: f64,
        owner: OwnerId,
    ) -> Result<usize, HostError>;

    /// Whether `entity` is hostile to `owner`.
    fn is_hostile(&self, owner: OwnerId, entity: EntityId) -> bool;

    /// Owner of an entity, if it has one.
    fn owner_of(&self, entity: EntityId) -> Option<OwnerId>;
}
