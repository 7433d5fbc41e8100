//! Transient flight-phase geometry: the launch rail and the gravity field.

use glam::DVec3;

use seeker_core::types::{EntityId, Transform};

use crate::host::GravitySample;

/// Launch rail. The start point is kept in launcher-local space so the rail
/// follows a launcher that moves or turns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RailData {
    start_local: DVec3,
    /// World start at creation, used once the launcher is gone.
    start_world: DVec3,
    forward_world: DVec3,
    pub created_at: f64,
}

impl RailData {
    pub fn new(launcher: &Transform, projectile_position: DVec3, now: f64) -> Self {
        Self {
            start_local: launcher.inverse_transform_point(projectile_position),
            start_world: projectile_position,
            forward_world: launcher.forward(),
            created_at: now,
        }
    }

    /// Rail line `(start, forward)` in world space.
    pub fn line(&self, launcher: Option<&Transform>) -> (DVec3, DVec3) {
        match launcher {
            Some(t) => (t.transform_point(self.start_local), t.forward()),
            None => (self.start_world, self.forward_world),
        }
    }

    /// Distance from the rail start.
    pub fn travel(&self, launcher: Option<&Transform>, position: DVec3) -> f64 {
        let (start, _) = self.line(launcher);
        start.distance(position)
    }

    /// Transform and velocity that put the projectile back on the rail,
    /// facing along it at its current speed.
    pub fn keep_on_rail(
        &self,
        launcher: Option<&Transform>,
        current: &Transform,
        velocity: DVec3,
    ) -> (Transform, DVec3) {
        let (start, forward) = self.line(launcher);
        let along = (current.position - start).dot(forward).max(0.0);
        let rotation = launcher.map_or(current.rotation, |t| t.rotation);
        let transform = Transform::new(start + forward * along, rotation);
        (transform, forward * velocity.length())
    }
}

/// Gravity field used by the boost and midcourse phases.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GravityData {
    pub body: EntityId,
    /// Gravity normal at the target position when first sampled.
    pub normal_at_target: Option<DVec3>,
    /// Gravity normal at the projectile.
    pub normal: DVec3,
    pub acceleration: f64,
}

impl GravityData {
    pub fn new(at_projectile: GravitySample, at_target: Option<GravitySample>) -> Self {
        Self {
            body: at_projectile.body,
            normal_at_target: at_target
                .filter(|s| s.body == at_projectile.body)
                .map(|s| s.normal),
            normal: at_projectile.normal,
            acceleration: at_projectile.acceleration,
        }
    }

    /// Take a fresh sample at the projectile. Returns false if it is from another body.
    pub fn refresh(&mut self, sample: GravitySample) -> bool {
        if sample.body != self.body {
            return false;
        }
        self.normal = sample.normal;
        self.acceleration = sample.acceleration;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rail_follows_launcher() {
        let launcher = Transform::looking(DVec3::ZERO, DVec3::NEG_Z);
        let rail = RailData::new(&launcher, DVec3::new(0.0, 0.0, -2.0), 0.0);

        let moved = Transform::looking(DVec3::new(10.0, 0.0, 0.0), DVec3::NEG_Z);
        let (start, _) = rail.line(Some(&moved));
        assert!((start - DVec3::new(10.0, 0.0, -2.0)).length() < 1e-9);
        assert!((rail.travel(Some(&moved), DVec3::new(10.0, 0.0, -7.0)) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_keep_on_rail_projects_and_aligns() {
        let launcher = Transform::looking(DVec3::ZERO, DVec3::NEG_Z);
        let rail = RailData::new(&launcher, DVec3::new(0.0, 0.0, -2.0), 0.0);
        let drifted = Transform::looking(DVec3::new(0.3, -0.2, -8.0), DVec3::new(0.1, 0.0, -1.0));
        let (t, v) = rail.keep_on_rail(Some(&launcher), &drifted, DVec3::new(5.0, 0.0, -50.0));
        assert!((t.position - DVec3::new(0.0, 0.0, -8.0)).length() < 1e-9, "got {:?}", t.position);
        assert!((t.forward() - DVec3::NEG_Z).length() < 1e-9);
        assert!((v.length() - DVec3::new(5.0, 0.0, -50.0).length()).abs() < 1e-9);
        assert!(v.normalize().dot(DVec3::NEG_Z) > 0.999_999);
    }

    #[test]
    fn test_rail_without_launcher_uses_creation_line() {
        let launcher = Transform::looking(DVec3::new(1.0, 0.0, 0.0), DVec3::X);
        let rail = RailData::new(&launcher, DVec3::new(3.0, 0.0, 0.0), 0.0);
        let (start, forward) = rail.line(None);
        assert_eq!(start, DVec3::new(3.0, 0.0, 0.0));
        assert!((forward - DVec3::X).length() < 1e-9);
    }

    #[test]
    fn test_gravity_refresh_same_body_only() {
        let sample = GravitySample {
            body: EntityId(1),
            normal: DVec3::NEG_Y,
            acceleration: 9.81,
        };
        let mut g = GravityData::new(sample, None);
        assert!(g.normal_at_target.is_none());

        let other = GravitySample {
            body: EntityId(2),
            normal: DVec3::X,
            acceleration: 3.0,
        };
        assert!(!g.refresh(other));
        assert_eq!(g.normal, DVec3::NEG_Y);

        let tilted = GravitySample {
            normal: DVec3::new(0.0, -1.0, 0.1).normalize(),
            ..sample
        };
        assert!(g.refresh(tilted));
        assert_eq!(g.normal, tilted.normal);
    }
}
