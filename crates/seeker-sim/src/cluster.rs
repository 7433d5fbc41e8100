//! Cluster formation keeping.
//!
//! A cluster is a master projectile and slaves released together. Slaves hold
//! fixed offsets in the master's local frame; the offsets are scaled by a
//! spread multiplier that grows as the group nears a large target.

use glam::{DQuat, DVec3};

use seeker_core::constants::*;
use seeker_core::state::ClusterRecord;
use seeker_core::types::{EntityId, Transform};

use crate::host::EntityRef;

/// Velocity and orientation for one slave this tick.
#[derive(Clone)]
pub struct SlaveMove {
    pub slave: EntityRef,
    pub velocity: DVec3,
    pub rotation: DQuat,
    /// Distance to the formation slot before moving.
    pub distance: f64,
}

pub struct Cluster {
    pub master: EntityRef,
    slaves: Vec<EntityRef>,
    /// Master-local unit-scale offsets, parallel to `slaves`.
    offsets: Vec<DVec3>,
    /// Distance of the furthest slave at formation (m).
    formation_radius: f64,
    spread_multiplier: f64,
    last_master_velocity: DVec3,
}

impl Cluster {
    /// Form a cluster from claimed rounds. The member closest to the centroid
    /// becomes the master. `None` for an empty list.
    pub fn form(members: Vec<EntityRef>) -> Option<Cluster> {
        if members.is_empty() {
            return None;
        }
        let positions: Vec<DVec3> = members.iter().map(|m| m.transform().position).collect();
        let centroid = positions.iter().copied().sum::<DVec3>() / positions.len() as f64;
        let master_index = positions
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.distance_squared(centroid)
                    .total_cmp(&b.distance_squared(centroid))
            })
            .map(|(i, _)| i)?;

        let mut members = members;
        let master = members.swap_remove(master_index);
        let master_transform = master.transform();

        let raw: Vec<DVec3> = members
            .iter()
            .map(|s| master_transform.inverse_transform_point(s.transform().position))
            .collect();
        let formation_radius = raw.iter().map(|o| o.length()).fold(0.0, f64::max);
        let offsets = if formation_radius > 0.0 {
            raw.iter().map(|o| *o / formation_radius).collect()
        } else {
            raw
        };

        Some(Cluster {
            last_master_velocity: master.velocity(),
            master,
            slaves: members,
            offsets,
            formation_radius,
            spread_multiplier: 1.0,
        })
    }

    pub fn slaves(&self) -> &[EntityRef] {
        &self.slaves
    }

    pub fn slave_ids(&self) -> Vec<EntityId> {
        self.slaves.iter().map(|s| s.id()).collect()
    }

    pub fn is_slave(&self, id: EntityId) -> bool {
        self.slaves.iter().any(|s| s.id() == id)
    }

    pub fn formation_radius(&self) -> f64 {
        self.formation_radius
    }

    pub fn spread_multiplier(&self) -> f64 {
        self.spread_multiplier
    }

    /// Drop a slave that left the world. Returns whether it was a member.
    pub fn remove_slave(&mut self, id: EntityId) -> bool {
        match self.slaves.iter().position(|s| s.id() == id) {
            Some(i) => {
                self.slaves.remove(i);
                self.offsets.remove(i);
                true
            }
            None => false,
        }
    }

    /// Take every slave out of the cluster.
    pub fn take_slaves(&mut self) -> Vec<EntityRef> {
        self.offsets.clear();
        std::mem::take(&mut self.slaves)
    }

    /// Spread multiplier goal: stay tight until within `spread_range` of the
    /// target, then open up so the formation covers the target.
    pub fn spread_goal(
        &self,
        distance_to_target: Option<f64>,
        target_half_shortest: f64,
        spread_range: f64,
    ) -> f64 {
        match distance_to_target {
            Some(d) if d <= spread_range && self.formation_radius > 0.0 => {
                (target_half_shortest / self.formation_radius).max(1.0)
            }
            _ => 1.0,
        }
    }

    /// Move the spread multiplier toward `goal` by at most one step.
    pub fn adjust_spread(&mut self, goal: f64) {
        let delta = (goal - self.spread_multiplier).clamp(-CLUSTER_SPREAD_STEP, CLUSTER_SPREAD_STEP);
        self.spread_multiplier += delta;
    }

    /// Record the master's velocity. Returns true if it jumped by more than
    /// the anomaly threshold since the last call.
    pub fn check_anomaly(&mut self, master_velocity: DVec3) -> bool {
        let jump = master_velocity.distance(self.last_master_velocity);
        self.last_master_velocity = master_velocity;
        jump > CLUSTER_VELOCITY_ANOMALY
    }

    /// World position of slave `index`'s formation slot.
    pub fn slot_position(&self, index: usize, master: &Transform) -> DVec3 {
        master.transform_point(self.offsets[index] * self.formation_radius * self.spread_multiplier)
    }

    /// Velocities that carry every slave toward its slot while matching the master.
    pub fn formation_moves(&self, master: &Transform, master_velocity: DVec3) -> Vec<SlaveMove> {
        self.slaves
            .iter()
            .enumerate()
            .map(|(i, slave)| {
                let to_slot = self.slot_position(i, master) - slave.transform().position;
                let distance = to_slot.length();
                let correction = if distance > CLUSTER_SLOT_TOLERANCE {
                    to_slot / distance * (distance / DT).min(CLUSTER_MAX_CLOSING_SPEED)
                } else {
                    DVec3::ZERO
                };
                SlaveMove {
                    slave: slave.clone(),
                    velocity: master_velocity + correction,
                    rotation: master.rotation,
                    distance,
                }
            })
            .collect()
    }

    pub fn record(&self) -> ClusterRecord {
        ClusterRecord {
            master: self.master.id(),
            slaves: self.slave_ids(),
            spread_multiplier: self.spread_multiplier,
        }
    }
}
