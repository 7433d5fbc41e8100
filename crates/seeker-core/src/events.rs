//! Events emitted by the flight engine for status display and logging.

use serde::{Deserialize, Serialize};

use crate::enums::{DetonationCause, Stage};
use crate::types::{EntityId, OwnerId};

/// Flight events, drained by the caller each tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FlightEvent {
    /// A launcher started guiding a projectile (cluster master for cluster rounds).
    Launched {
        projectile: EntityId,
        launcher: EntityId,
        owner: OwnerId,
        ammo: String,
        cluster_size: usize,
    },
    /// Stage transition.
    StageChanged {
        projectile: EntityId,
        from: Stage,
        to: Stage,
    },
    /// The projectile picked up a new target.
    Retargeted {
        projectile: EntityId,
        target: Option<EntityId>,
    },
    /// Server-side detonation.
    Detonated {
        projectile: EntityId,
        cause: DetonationCause,
    },
    /// Master velocity jumped; the whole cluster was dropped.
    ClusterAborted {
        projectile: EntityId,
        slaves_destroyed: usize,
    },
    /// Owned entity gone and cleanup scheduled.
    TornDown { projectile: EntityId },
    /// Launcher disabled after releasing a cluster.
    CooldownStarted {
        launcher: EntityId,
        duration_secs: f64,
    },
    /// Launcher cooldown expired.
    CooldownEnded { launcher: EntityId },
}

impl FlightEvent {
    /// Projectile the event concerns, if any.
    pub fn projectile(&self) -> Option<EntityId> {
        match self {
            FlightEvent::Launched { projectile, .. }
            | FlightEvent::StageChanged { projectile, .. }
            | FlightEvent::Retargeted { projectile, .. }
            | FlightEvent::Detonated { projectile, .. }
            | FlightEvent::ClusterAborted { projectile, .. }
            | FlightEvent::TornDown { projectile } => Some(*projectile),
            FlightEvent::CooldownStarted { .. } | FlightEvent::CooldownEnded { .. } => None,
        }
    }
}
