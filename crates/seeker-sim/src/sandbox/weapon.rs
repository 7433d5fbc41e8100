//! Weapon block for the sandbox host.

use std::sync::Arc;

use glam::DVec3;
use parking_lot::Mutex;

use seeker_core::enums::TargetTypes;
use seeker_core::types::{EntityId, OwnerId};

use crate::host::EntityRef;
use crate::launcher::WeaponBlock;
use crate::relay::RelayNetwork;

struct WeaponState {
    shooting: bool,
    enabled: bool,
    slewing: bool,
    aim: Option<DVec3>,
    magazine: Option<String>,
    mass: f64,
    volume: f64,
    target: Option<EntityId>,
    allowed: TargetTypes,
    relay: Option<Arc<dyn RelayNetwork>>,
    range: f64,
    spawn_offset: f64,
    grid_size: f64,
}

pub struct SandboxWeapon {
    entity: EntityRef,
    owner: OwnerId,
    state: Mutex<WeaponState>,
}

impl SandboxWeapon {
    pub fn new(entity: EntityRef, owner: OwnerId) -> Self {
        Self {
            entity,
            owner,
            state: Mutex::new(WeaponState {
                shooting: false,
                enabled: true,
                slewing: false,
                aim: None,
                magazine: None,
                mass: 0.0,
                volume: 0.0,
                target: None,
                allowed: TargetTypes::ALL,
                relay: None,
                range: 0.0,
                spawn_offset: 2.0,
                grid_size: 2.5,
            }),
        }
    }

    /// Put a magazine in the inventory. Mass and volume change with it.
    pub fn load(&self, magazine: &str, mass: f64) {
        let mut state = self.state.lock();
        state.magazine = Some(magazine.to_string());
        state.mass = mass;
        state.volume = mass * 0.5;
    }

    pub fn unload(&self) {
        let mut state = self.state.lock();
        state.magazine = None;
        state.mass = 0.0;
        state.volume = 0.0;
    }

    /// Turn the block into a slewing mount aimed along `aim`.
    pub fn set_turret_aim(&self, aim: Option<DVec3>) {
        let mut state = self.state.lock();
        state.slewing = aim.is_some();
        state.aim = aim.and_then(|a| a.try_normalize());
    }

    pub fn set_relay(&self, relay: Option<Arc<dyn RelayNetwork>>) {
        self.state.lock().relay = relay;
    }

    pub fn set_target(&self, target: Option<EntityId>) {
        self.state.lock().target = target;
    }

    pub fn set_allowed_targets(&self, allowed: TargetTypes) {
        self.state.lock().allowed = allowed;
    }

    pub fn set_range(&self, range: f64) {
        self.state.lock().range = range;
    }
}

impl WeaponBlock for SandboxWeapon {
    fn entity(&self) -> EntityRef {
        Arc::clone(&self.entity)
    }

    fn owner(&self) -> OwnerId {
        self.owner
    }

    fn is_shooting(&self) -> bool {
        self.state.lock().shooting
    }

    fn set_shooting(&self, shooting: bool) {
        self.state.lock().shooting = shooting;
    }

    fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    fn set_enabled(&self, enabled: bool) {
        self.state.lock().enabled = enabled;
    }

    fn is_slewing(&self) -> bool {
        self.state.lock().slewing
    }

    fn turret_aim(&self) -> Option<DVec3> {
        self.state.lock().aim
    }

    fn spawn_forward_offset(&self) -> f64 {
        self.state.lock().spawn_offset
    }

    fn grid_size(&self) -> f64 {
        self.state.lock().grid_size
    }

    fn inventory_mass(&self) -> f64 {
        self.state.lock().mass
    }

    fn inventory_volume(&self) -> f64 {
        self.state.lock().volume
    }

    fn loaded_magazine(&self) -> Option<String> {
        self.state.lock().magazine.clone()
    }

    fn target_entity_id(&self) -> Option<EntityId> {
        self.state.lock().target
    }

    fn allowed_targets(&self) -> TargetTypes {
        self.state.lock().allowed
    }

    fn relay(&self) -> Option<Arc<dyn RelayNetwork>> {
        self.state.lock().relay.clone()
    }

    fn range(&self) -> f64 {
        self.state.lock().range
    }
}
