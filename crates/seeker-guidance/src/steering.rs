//! Per-tick steering: desired direction, bounded heading rotation and
//! acceleration decision.

use glam::{DQuat, DVec3};

use seeker_core::constants::{ANGLE_ACCELERATE_WHEN, MIN_ROTATION_ANGLE};
use seeker_core::enums::Stage;

/// Direction the projectile should face this tick, or `None` if the stage
/// has no steering rule or the required data is missing.
///
/// * `Boost`: straight up, against gravity.
/// * `MidCourse`: toward the target, flattened onto the plane perpendicular to gravity.
/// * `SemiActive` / `Guided`: the target's firing direction.
pub fn desired_direction(
    stage: Stage,
    firing_direction: DVec3,
    gravity_normal: Option<DVec3>,
) -> Option<DVec3> {
    match stage {
        Stage::Boost => gravity_normal.map(|n| -n).and_then(DVec3::try_normalize),
        Stage::MidCourse => {
            let n = gravity_normal?.try_normalize()?;
            (firing_direction - n * firing_direction.dot(n)).try_normalize()
        }
        Stage::SemiActive | Stage::Guided => firing_direction.try_normalize(),
        _ => None,
    }
}

/// A heading change limited to the per-tick rotation limit.
#[derive(Debug, Clone, Copy)]
pub struct HeadingChange {
    /// World-space rotation to apply to orientation and velocity.
    pub rotation: DQuat,
    /// Angle between heading and desired direction before the change (radians).
    pub angle: f64,
    /// Angle actually rotated (radians), never above the limit.
    pub applied: f64,
}

/// Rotate `heading` toward `desired` by at most `limit` radians.
///
/// Returns `None` when the angle is too small to give a usable rotation axis.
pub fn bounded_rotation(heading: DVec3, desired: DVec3, limit: f64) -> Option<HeadingChange> {
    let angle = heading.angle_between(desired);
    if angle.is_nan() || angle <= MIN_ROTATION_ANGLE {
        return None;
    }
    // Antiparallel vectors have no cross product; any perpendicular axis will do.
    let axis = heading
        .cross(desired)
        .try_normalize()
        .unwrap_or_else(|| heading.any_orthonormal_vector());
    let applied = angle.min(limit.max(0.0));
    Some(HeadingChange {
        rotation: DQuat::from_axis_angle(axis, applied),
        angle,
        applied,
    })
}

/// Input to one steering step.
#[derive(Debug, Clone)]
pub struct SteeringInput {
    pub stage: Stage,
    /// Current forward vector.
    pub heading: DVec3,
    pub velocity: DVec3,
    pub firing_direction: DVec3,
    pub gravity_normal: Option<DVec3>,
    pub rotation_per_tick: f64,
    /// Cruise speed (m/s); no acceleration at or above it.
    pub desired_speed: f64,
    /// Speed added per tick while locked on (m/s).
    pub speed_increment: f64,
}

/// Mutation computed by one steering step.
#[derive(Debug, Clone, Copy)]
pub struct SteeringCommand {
    pub desired: DVec3,
    /// Angle between heading and `desired` before rotating.
    pub angle: f64,
    pub rotation: Option<DQuat>,
    /// Velocity after rotation and acceleration.
    pub new_velocity: DVec3,
    pub accelerated: bool,
}

/// Compute one steering step. `None` means nothing to do this tick.
pub fn steer(input: &SteeringInput) -> Option<SteeringCommand> {
    if !input.stage.steers() {
        return None;
    }
    let desired = desired_direction(input.stage, input.firing_direction, input.gravity_normal)?;
    debug_assert!(desired.is_finite(), "non-finite steering direction");

    let change = bounded_rotation(input.heading, desired, input.rotation_per_tick);
    let angle = change
        .map(|c| c.angle)
        .unwrap_or_else(|| input.heading.angle_between(desired));
    let rotation = change.map(|c| c.rotation);

    let new_heading = rotation.map_or(input.heading, |r| r * input.heading);
    let mut new_velocity = rotation.map_or(input.velocity, |r| r * input.velocity);

    let accelerated = angle < ANGLE_ACCELERATE_WHEN
        && input.speed_increment > 0.0
        && input.velocity.length_squared() < input.desired_speed * input.desired_speed;
    if accelerated {
        new_velocity += new_heading * input.speed_increment;
    }

    Some(SteeringCommand {
        desired,
        angle,
        rotation,
        new_velocity,
        accelerated,
    })
}
