//! What a projectile steers toward.

use glam::DVec3;

use seeker_core::types::EntityId;
use seeker_guidance::intercept::intercept_vector;

use crate::host::EntityRef;
use crate::relay::Sighting;

/// The thing being steered toward.
#[derive(Clone, Default)]
pub enum Target {
    #[default]
    None,
    /// A live entity the host can see.
    WorldEntity { entity: EntityRef },
    /// Last known position from the relay network.
    RememberedSighting { sighting: Sighting },
    /// Line of sight from a laser designator. `lead_point` is refreshed on the medium pass.
    SemiActiveDesignator {
        designator: EntityRef,
        lead_point: Option<DVec3>,
    },
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::None => write!(f, "None"),
            Target::WorldEntity { entity } => write!(f, "WorldEntity({})", entity.id()),
            Target::RememberedSighting { sighting } => {
                write!(f, "RememberedSighting({})", sighting.entity)
            }
            Target::SemiActiveDesignator { designator, lead_point } => {
                write!(f, "SemiActiveDesignator({}, {:?})", designator.id(), lead_point)
            }
        }
    }
}

impl Target {
    /// Entity being tracked. Designators track a point, not an entity.
    pub fn entity_id(&self) -> Option<EntityId> {
        match self {
            Target::WorldEntity { entity } => Some(entity.id()),
            Target::RememberedSighting { sighting } => Some(sighting.entity),
            Target::None | Target::SemiActiveDesignator { .. } => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Target::None)
    }

    /// False once a tracked entity has been destroyed.
    pub fn is_live(&self) -> bool {
        match self {
            Target::None => false,
            Target::WorldEntity { entity } => !entity.is_closed(),
            Target::RememberedSighting { .. } => true,
            Target::SemiActiveDesignator { designator, .. } => !designator.is_closed(),
        }
    }

    /// Where the target is now.
    pub fn current_position(&self, now: f64) -> Option<DVec3> {
        match self {
            Target::None => None,
            Target::WorldEntity { entity } => Some(entity.transform().position),
            Target::RememberedSighting { sighting } => Some(sighting.predicted_position(now)),
            Target::SemiActiveDesignator { lead_point, .. } => *lead_point,
        }
    }

    pub fn velocity(&self) -> DVec3 {
        match self {
            Target::WorldEntity { entity } => entity.velocity(),
            Target::RememberedSighting { sighting } => sighting.velocity,
            Target::None | Target::SemiActiveDesignator { .. } => DVec3::ZERO,
        }
    }

    /// Half the shortest dimension of the target's bounds, when known.
    pub fn half_shortest_dimension(&self) -> f64 {
        match self {
            Target::WorldEntity { entity } => entity.local_aabb().shortest_dimension() * 0.5,
            _ => 0.0,
        }
    }
}

/// A target plus this tick's aim solution.
#[derive(Debug, Clone, Default)]
pub struct TargetLock {
    pub target: Target,
    /// Unit vector to fly along. Only set once the aim has been solved this tick.
    pub firing_direction: Option<DVec3>,
    pub contact_point: Option<DVec3>,
}

impl TargetLock {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            firing_direction: None,
            contact_point: None,
        }
    }

    /// Replace the target and drop the old solution.
    pub fn set(&mut self, target: Target) {
        *self = Self::new(target);
    }

    /// Solve the aim for a projectile at `position` moving at `velocity`.
    pub fn solve(&mut self, position: DVec3, velocity: DVec3, shot_speed: f64, now: f64) {
        self.firing_direction = None;
        self.contact_point = None;

        if let Target::SemiActiveDesignator { lead_point, .. } = &self.target {
            if let Some(lead) = *lead_point {
                self.firing_direction = (lead - position).try_normalize();
                self.contact_point = Some(lead);
            }
            return;
        }

        if !self.target.is_live() {
            return;
        }
        let Some(target_position) = self.target.current_position(now) else {
            return;
        };
        let shot_speed = if shot_speed > 0.0 {
            shot_speed
        } else {
            velocity.length()
        };
        if let Some(solution) = intercept_vector(
            position,
            velocity,
            target_position,
            self.target.velocity(),
            shot_speed,
            true,
        ) {
            self.firing_direction = Some(solution.firing_direction);
            self.contact_point = Some(solution.contact_point);
        }
    }
}
