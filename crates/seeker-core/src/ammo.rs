//! Ammunition catalog: per-round ballistic and guidance constants.
//!
//! `AmmoDescription` is the guidance-specific part authored per round type;
//! `MissileDefinition` is what the host engine already knows about the round.
//! `Ammo` couples both and derives flight numbers from them.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_ROTATION_PER_TICK, MIN_GUIDANCE_SECS};
use crate::error::FlightError;

/// Radar carried by a round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarDefinition {
    /// Detection range (m).
    pub max_range: f64,
    /// Number of contacts tracked at once.
    pub max_targets: u32,
}

/// Guidance description of a round type. Every field is optional in the source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmmoDescription {
    /// Seconds of active guidance once homing starts.
    pub guidance_seconds: f64,
    /// Maximum heading change per tick (radians).
    pub rotation_per_tick: f64,
    /// Extra acceleration provided by the guidance package (m/s²).
    pub acceleration: f64,
    /// Maximum angle between nose and target to acquire it (radians).
    pub acquisition_angle: f64,
    /// Distance from launch point at which boost ends (m). Zero disables boost.
    pub boost_distance: f64,
    /// Range of onboard target seeking (m).
    pub target_range: f64,
    /// Round can receive sightings from the relay network.
    pub has_antenna: bool,
    /// Onboard radar, if any.
    pub radar: Option<RadarDefinition>,
    /// Semi-active laser homing; supersedes other targeting.
    pub semi_active_laser: bool,
    /// Detonate when this close to the target (m).
    pub detonate_range: f64,
    pub emp_strength: f64,
    pub emp_seconds: f64,
    /// Seconds from the last cluster member leaving until the launcher may fire again.
    /// Positive marks the round as a cluster round.
    pub cluster_cooldown: f64,
    /// Distance to target (m) inside which the cluster starts spreading out.
    pub cluster_spread_range: f64,
}

impl Default for AmmoDescription {
    fn default() -> Self {
        Self {
            guidance_seconds: 0.0,
            rotation_per_tick: DEFAULT_ROTATION_PER_TICK,
            acceleration: 0.0,
            acquisition_angle: std::f64::consts::PI,
            boost_distance: 0.0,
            target_range: 0.0,
            has_antenna: false,
            radar: None,
            semi_active_laser: false,
            detonate_range: 0.0,
            emp_strength: 0.0,
            emp_seconds: 0.0,
            cluster_cooldown: 0.0,
            cluster_spread_range: 0.0,
        }
    }
}

impl AmmoDescription {
    /// Cosine of the acquisition cone.
    pub fn cos_acquisition_angle(&self) -> f64 {
        self.acquisition_angle.clamp(0.0, std::f64::consts::PI).cos()
    }

    pub fn has_emp(&self) -> bool {
        self.emp_strength > 0.0 && self.emp_seconds > 0.0
    }
}

/// What the host engine defines for the physical round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissileDefinition {
    /// Cruise speed the host accelerates the round toward (m/s).
    pub desired_speed: f64,
    /// Speed at spawn (m/s).
    pub initial_speed: f64,
    /// Host-side acceleration (m/s²).
    pub missile_acceleration: f64,
    /// Maximum distance the round travels before self-destruct (m).
    pub max_trajectory: f64,
    /// Blast radius (m).
    pub explosion_radius: f64,
    /// Rounds per magazine; cluster size for cluster rounds.
    pub magazine_capacity: u32,
}

impl Default for MissileDefinition {
    fn default() -> Self {
        Self {
            desired_speed: 200.0,
            initial_speed: 0.0,
            missile_acceleration: 600.0,
            max_trajectory: 800.0,
            explosion_radius: 4.0,
            magazine_capacity: 1,
        }
    }
}

/// Catalog entry as it appears in the JSON document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AmmoEntry {
    pub missile: MissileDefinition,
    pub description: Option<AmmoDescription>,
}

/// A round type with derived flight numbers. Immutable once built.
#[derive(Debug, Clone)]
pub struct Ammo {
    pub name: String,
    pub definition: MissileDefinition,
    /// `None` for rounds without guidance.
    pub description: Option<AmmoDescription>,
    pub time_to_max_speed: f64,
    pub distance_to_max_speed: f64,
    pub is_cluster: bool,
}

impl Ammo {
    pub fn new(
        name: impl Into<String>,
        definition: MissileDefinition,
        description: Option<AmmoDescription>,
    ) -> Self {
        let (time_to_max_speed, distance_to_max_speed) = if definition.missile_acceleration > 0.0
            && definition.desired_speed > definition.initial_speed
        {
            let t = (definition.desired_speed - definition.initial_speed)
                / definition.missile_acceleration;
            let d = (definition.desired_speed + definition.initial_speed) / 2.0 * t;
            (t, d)
        } else {
            (0.0, 0.0)
        };
        let is_cluster = description
            .as_ref()
            .is_some_and(|d| d.cluster_cooldown > 0.0);
        Self {
            name: name.into(),
            definition,
            description,
            time_to_max_speed,
            distance_to_max_speed,
            is_cluster,
        }
    }

    /// True when the launcher should wrap claimed rounds in guidance.
    pub fn is_guided(&self) -> bool {
        self.description
            .as_ref()
            .is_some_and(|d| d.guidance_seconds >= MIN_GUIDANCE_SECS)
    }

    /// Average speed of the round over a flight of `distance` metres.
    pub fn average_speed(&self, distance: f64) -> f64 {
        let def = &self.definition;
        if distance < self.distance_to_max_speed {
            let final_speed = (def.initial_speed * def.initial_speed
                + 2.0 * def.missile_acceleration * distance)
                .sqrt();
            (def.initial_speed + final_speed) / 2.0
        } else if def.desired_speed > 0.0 {
            let after = (distance - self.distance_to_max_speed) / def.desired_speed;
            let total = self.time_to_max_speed + after;
            if total > 0.0 {
                distance / total
            } else {
                def.desired_speed
            }
        } else {
            def.initial_speed
        }
    }
}

/// All round types known to the engine, keyed by magazine name.
#[derive(Debug, Clone, Default)]
pub struct AmmoCatalog {
    entries: HashMap<String, Arc<Ammo>>,
}

impl AmmoCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object of `{ "<magazine>": AmmoEntry, ... }`.
    pub fn from_json(json: &str) -> Result<Self, FlightError> {
        let raw: HashMap<String, AmmoEntry> = serde_json::from_str(json)?;
        let mut catalog = Self::new();
        for (name, entry) in raw {
            catalog.insert(Ammo::new(name, entry.missile, entry.description));
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, ammo: Ammo) -> Arc<Ammo> {
        let ammo = Arc::new(ammo);
        self.entries.insert(ammo.name.clone(), Arc::clone(&ammo));
        ammo
    }

    pub fn get(&self, magazine: &str) -> Option<Arc<Ammo>> {
        self.entries.get(magazine).cloned()
    }

    /// Like `get`, but unknown names are an error.
    pub fn require(&self, magazine: &str) -> Result<Arc<Ammo>, FlightError> {
        self.get(magazine)
            .ok_or_else(|| FlightError::UnknownAmmo(magazine.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
