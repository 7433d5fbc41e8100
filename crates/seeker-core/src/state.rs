//! Persisted shape of a live guided projectile.
//!
//! Only export is supported. Rebuilding a projectile from a record after a
//! reload is not wired up.

use serde::{Deserialize, Serialize};

use crate::enums::Stage;
use crate::types::{EntityId, OwnerId};

/// Cluster membership at the time of export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub master: EntityId,
    pub slaves: Vec<EntityId>,
    pub spread_multiplier: f64,
}

/// Everything needed to describe a projectile in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileRecord {
    pub projectile: EntityId,
    /// Magazine name of the round.
    pub ammo: String,
    pub launcher: EntityId,
    pub owner: OwnerId,
    pub stage: Stage,
    /// Seconds until guidance expires; `None` before the countdown starts.
    pub guidance_remaining_secs: Option<f64>,
    pub cluster: Option<ClusterRecord>,
}
