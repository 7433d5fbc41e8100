//! Moving-target intercept and semi-active lead geometry.

use glam::DVec3;

use seeker_core::constants::{DT, TRY_HARD_TANGENTIAL_FACTOR};

/// Result of an intercept calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterceptSolution {
    /// Unit vector to fly along.
    pub firing_direction: DVec3,
    /// Where shot and target are predicted to meet.
    pub contact_point: DVec3,
    /// False when the shot is too slow and this is only a compromise heading.
    pub exact: bool,
}

/// Find the direction to fire a shot of `shot_speed` from `shot_origin` so
/// that it meets a target moving at constant velocity.
///
/// The relative velocity is split into the part along the line of sight and
/// the part tangential to it. The shot matches the tangential part and spends
/// the rest of its speed closing. When `try_hard` is set the tangential part is
/// over-corrected, and a shot that is too slow still gets a compromise
/// direction instead of `None`.
pub fn intercept_vector(
    shot_origin: DVec3,
    shooter_velocity: DVec3,
    target_origin: DVec3,
    target_velocity: DVec3,
    shot_speed: f64,
    try_hard: bool,
) -> Option<InterceptSolution> {
    let relative_vel = target_velocity - shooter_velocity;
    let target_origin = target_origin + relative_vel * DT;

    let displacement = target_origin - shot_origin;
    let distance = displacement.length();
    if distance < 1e-9 {
        return None;
    }
    let direction = displacement / distance;

    let target_speed_radial = relative_vel.dot(direction);
    let relative_vel_tangential = relative_vel - direction * target_speed_radial;

    let mut shot_vel_tangential = relative_vel_tangential;
    if try_hard {
        shot_vel_tangential *= TRY_HARD_TANGENTIAL_FACTOR;
    }

    let tangential_sq = shot_vel_tangential.length_squared();
    let shot_speed_radial_sq = shot_speed * shot_speed - tangential_sq;
    let closing = if shot_speed_radial_sq > 0.0 {
        let shot_speed_radial = shot_speed_radial_sq.sqrt();
        Some((shot_speed_radial, shot_speed_radial - target_speed_radial))
    } else {
        None
    };

    match closing {
        Some((shot_speed_radial, closing_speed)) if closing_speed > 0.0 => {
            let shot_vel = direction * shot_speed_radial + shot_vel_tangential;
            let firing_direction = shot_vel.try_normalize()?;
            let time_to_collision = distance / closing_speed;
            Some(InterceptSolution {
                firing_direction,
                contact_point: shot_origin + shot_vel * time_to_collision,
                exact: true,
            })
        }
        _ if try_hard => {
            // Trade-off between facing the target and fighting tangential drift.
            let firing_direction =
                (direction + displacement * 0.01 + shot_vel_tangential).try_normalize()?;
            Some(InterceptSolution {
                firing_direction,
                contact_point: shot_origin + firing_direction * distance,
                exact: false,
            })
        }
        _ => None,
    }
}

/// Closest point to `point` on the ray from `origin` along unit `direction`.
/// Points behind the origin clamp to the origin.
pub fn closest_point_on_ray(origin: DVec3, direction: DVec3, point: DVec3) -> DVec3 {
    let t = (point - origin).dot(direction).max(0.0);
    origin + direction * t
}

/// Lead point for a semi-active round: the closest point on the designator's
/// line of sight to the projectile, advanced by one second of the
/// projectile's own velocity.
pub fn semi_active_lead(
    designator_origin: DVec3,
    designator_forward: DVec3,
    projectile_position: DVec3,
    projectile_velocity: DVec3,
) -> DVec3 {
    let forward = designator_forward.normalize_or_zero();
    closest_point_on_ray(designator_origin, forward, projectile_position) + projectile_velocity
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stationary_target_fires_straight() {
        let sol = intercept_vector(
            DVec3::ZERO,
            DVec3::ZERO,
            DVec3::new(0.0, 0.0, -1000.0),
            DVec3::ZERO,
            200.0,
            true,
        )
        .unwrap();
        assert!(sol.exact);
        assert!((sol.firing_direction - DVec3::NEG_Z).length() < 1e-12);
        assert!((sol.contact_point - DVec3::new(0.0, 0.0, -1000.0)).length() < 1e-6);
    }

    #[test]
    fn test_crossing_target_leads() {
        let sol = intercept_vector(
            DVec3::ZERO,
            DVec3::ZERO,
            DVec3::new(0.0, 0.0, -1000.0),
            DVec3::new(50.0, 0.0, 0.0),
            200.0,
            false,
        )
        .unwrap();
        assert!(sol.firing_direction.x > 0.0, "should lead toward +X, got {:?}", sol.firing_direction);
        assert!(sol.contact_point.x > 0.0);
    }

    #[test]
    fn test_too_slow_without_trying_fails() {
        let sol = intercept_vector(
            DVec3::ZERO,
            DVec3::ZERO,
            DVec3::new(0.0, 0.0, -100.0),
            DVec3::new(500.0, 0.0, 0.0),
            100.0,
            false,
        );
        assert!(sol.is_none());
    }

    #[test]
    fn test_too_slow_trying_hard_compromises() {
        let sol = intercept_vector(
            DVec3::ZERO,
            DVec3::ZERO,
            DVec3::new(0.0, 0.0, -100.0),
            DVec3::new(500.0, 0.0, 0.0),
            100.0,
            true,
        )
        .unwrap();
        assert!(!sol.exact);
        assert!((sol.firing_direction.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_coincident_points_have_no_solution() {
        assert!(intercept_vector(DVec3::ONE, DVec3::ZERO, DVec3::ONE, DVec3::ZERO, 10.0, true).is_none());
    }

    #[test]
    fn test_closest_point_on_ray() {
        let p = closest_point_on_ray(DVec3::ZERO, DVec3::NEG_Z, DVec3::new(3.0, 0.0, -10.0));
        assert!((p - DVec3::new(0.0, 0.0, -10.0)).length() < 1e-12);
        let behind = closest_point_on_ray(DVec3::ZERO, DVec3::NEG_Z, DVec3::new(0.0, 0.0, 5.0));
        assert_eq!(behind, DVec3::ZERO, "points behind the designator clamp to its origin");
    }

    #[test]
    fn test_semi_active_lead_adds_one_second() {
        let lead = semi_active_lead(
            DVec3::ZERO,
            DVec3::NEG_Z * 2.0,
            DVec3::new(4.0, 0.0, -50.0),
            DVec3::new(0.0, 0.0, -100.0),
        );
        assert!((lead - DVec3::new(0.0, 0.0, -150.0)).length() < 1e-12, "got {lead:?}");
    }
}
