//! Fundamental geometric and simulation types.

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

/// Host-assigned identity of a world entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

/// Identity of the player/faction that owns a block or projectile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position and orientation of an entity in world space.
/// Forward is local -Z, up is local +Y.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: DVec3,
    pub rotation: DQuat,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
        }
    }
}

impl Transform {
    pub fn new(position: DVec3, rotation: DQuat) -> Self {
        Self { position, rotation }
    }

    /// Transform at `position` whose forward points along `forward`.
    pub fn looking(position: DVec3, forward: DVec3) -> Self {
        let dir = forward.normalize_or_zero();
        let rotation = if dir == DVec3::ZERO {
            DQuat::IDENTITY
        } else {
            DQuat::from_rotation_arc(DVec3::NEG_Z, dir)
        };
        Self { position, rotation }
    }

    /// Unit forward vector in world space.
    pub fn forward(&self) -> DVec3 {
        self.rotation * DVec3::NEG_Z
    }

    /// Unit up vector in world space.
    pub fn up(&self) -> DVec3 {
        self.rotation * DVec3::Y
    }

    /// Map a local-space point into world space.
    pub fn transform_point(&self, local: DVec3) -> DVec3 {
        self.position + self.rotation * local
    }

    /// Map a world-space point into this transform's local space.
    pub fn inverse_transform_point(&self, world: DVec3) -> DVec3 {
        self.rotation.inverse() * (world - self.position)
    }

    /// Rotate orientation by `rotation` (applied in world space), keeping position.
    pub fn rotated(&self, rotation: DQuat) -> Self {
        Self {
            position: self.position,
            rotation: (rotation * self.rotation).normalize(),
        }
    }
}

/// Axis-aligned bounding box (in whatever space its owner uses).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Box centred on the origin with the given half extents.
    pub fn from_half_extents(half: DVec3) -> Self {
        Self::new(-half, half)
    }

    /// Smallest box containing every point.
    pub fn from_points(points: &[DVec3]) -> Self {
        let mut min = DVec3::splat(f64::MAX);
        let mut max = DVec3::splat(f64::MIN);
        for p in points {
            min = min.min(*p);
            max = max.max(*p);
        }
        Self { min, max }
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    /// Length of the box diagonal.
    pub fn diagonal(&self) -> f64 {
        self.size().length()
    }

    pub fn shortest_dimension(&self) -> f64 {
        self.size().min_element()
    }

    /// Largest single dimension.
    pub fn longest_dimension(&self) -> f64 {
        self.size().max_element()
    }

    pub fn contains(&self, point: DVec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Grow every face outward by `amount`.
    pub fn inflate(&self, amount: f64) -> Self {
        Self::new(self.min - DVec3::splat(amount), self.max + DVec3::splat(amount))
    }

    pub fn translate(&self, offset: DVec3) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// Squared distance from the box surface to `point` (0 inside).
    pub fn distance_squared_to_point(&self, point: DVec3) -> f64 {
        let clamped = point.clamp(self.min, self.max);
        clamped.distance_squared(point)
    }

    /// Slab test. Returns the distance along `dir` (unit) at which a ray from
    /// `origin` enters the box, if that happens within `max_len`.
    pub fn ray_entry(&self, origin: DVec3, dir: DVec3, max_len: f64) -> Option<f64> {
        let mut t_min = 0.0_f64;
        let mut t_max = max_len;
        for axis in 0..3 {
            let o = origin[axis];
            let d = dir[axis];
            if d.abs() < 1e-12 {
                if o < self.min[axis] || o > self.max[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut t0 = (self.min[axis] - o) * inv;
            let mut t1 = (self.max[axis] - o) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }
        Some(t_min)
    }
}

/// Simulation time tracking.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SimTime {
    /// Current tick number (increments by 1 each tick).
    pub tick: u64,
    /// Elapsed simulation time in seconds.
    pub elapsed_secs: f64,
}

impl SimTime {
    /// Seconds per tick at the default tick rate.
    pub fn dt(&self) -> f64 {
        crate::constants::DT
    }

    /// Advance by one tick.
    pub fn advance(&mut self) {
        self.tick += 1;
        self.elapsed_secs += self.dt();
    }
}
