//! Relay network interface: remembered sightings of world entities.

use std::collections::HashMap;

use glam::DVec3;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use seeker_core::constants::SIGHTING_RECENT_SECS;
use seeker_core::enums::EntityCategory;
use seeker_core::types::EntityId;

/// Last known position and velocity of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sighting {
    pub entity: EntityId,
    pub position: DVec3,
    pub velocity: DVec3,
    /// Simulation time of the observation (s).
    pub seen_at: f64,
    pub category: EntityCategory,
}

impl Sighting {
    /// Younger than the recent window.
    pub fn is_recent(&self, now: f64) -> bool {
        now - self.seen_at <= SIGHTING_RECENT_SECS
    }

    /// Position extrapolated to `now` from the last observation.
    pub fn predicted_position(&self, now: f64) -> DVec3 {
        self.position + self.velocity * (now - self.seen_at).max(0.0)
    }
}

/// Source of remembered sightings.
pub trait RelayNetwork: Send + Sync {
    fn try_get_sighting(&self, entity: EntityId) -> Option<Sighting>;

    /// Visit sightings until `visit` returns true. Returns whether it did.
    fn for_each_sighting(&self, visit: &mut dyn FnMut(&Sighting) -> bool) -> bool;

    /// Let the network see a friendly projectile.
    fn push_self_sighting(&self, sighting: Sighting);
}

/// In-memory relay network. Keeps the newest sighting per entity.
#[derive(Debug, Default)]
pub struct SightingStore {
    sightings: RwLock<HashMap<EntityId, Sighting>>,
}

impl SightingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `sighting` unless a newer one is already known.
    pub fn record(&self, sighting: Sighting) {
        let mut map = self.sightings.write();
        match map.get(&sighting.entity) {
            Some(existing) if existing.seen_at > sighting.seen_at => {}
            _ => {
                map.insert(sighting.entity, sighting);
            }
        }
    }

    pub fn forget(&self, entity: EntityId) {
        self.sightings.write().remove(&entity);
    }

    pub fn len(&self) -> usize {
        self.sightings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sightings.read().is_empty()
    }
}

impl RelayNetwork for SightingStore {
    fn try_get_sighting(&self, entity: EntityId) -> Option<Sighting> {
        self.sightings.read().get(&entity).cloned()
    }

    fn for_each_sighting(&self, visit: &mut dyn FnMut(&Sighting) -> bool) -> bool {
        let map = self.sightings.read();
        map.values().any(|s| visit(s))
    }

    fn push_self_sighting(&self, sighting: Sighting) {
        self.record(sighting);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sighting(id: u64, seen_at: f64) -> Sighting {
        Sighting {
            entity: EntityId(id),
            position: DVec3::ZERO,
            velocity: DVec3::X * 10.0,
            seen_at,
            category: EntityCategory::SmallGrid,
        }
    }

    #[test]
    fn test_store_keeps_newest() {
        let store = SightingStore::new();
        store.record(sighting(1, 5.0));
        store.record(sighting(1, 3.0));
        assert_eq!(store.try_get_sighting(EntityId(1)).unwrap().seen_at, 5.0);
        store.record(sighting(1, 6.0));
        assert_eq!(store.try_get_sighting(EntityId(1)).unwrap().seen_at, 6.0);
    }

    #[test]
    fn test_for_each_short_circuits() {
        let store = SightingStore::new();
        for id in 0..5 {
            store.record(sighting(id, 0.0));
        }
        let mut visited = 0;
        let stopped = store.for_each_sighting(&mut |_| {
            visited += 1;
            visited == 2
        });
        assert!(stopped);
        assert_eq!(visited, 2);
    }

    #[test]
    fn test_sighting_recency_and_prediction() {
        let s = sighting(1, 10.0);
        assert!(s.is_recent(12.0));
        assert!(!s.is_recent(12.5));
        assert!((s.predicted_position(11.5) - DVec3::X * 15.0).length() < 1e-12);
    }
}
