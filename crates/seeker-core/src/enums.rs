//! Enumeration types used throughout the flight engine.

use serde::{Deserialize, Serialize};

/// Flight phase of a guided projectile.
///
/// Discriminants follow flight order; a projectile only ever moves to a
/// greater stage. `Terminated` and `Exploded` are absorbing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Stage {
    /// Riding the launch rail, unguided.
    #[default]
    Rail = 0,
    /// Following an external line-of-sight designator.
    SemiActive = 1,
    /// Climbing straight out of the gravity well.
    Boost = 2,
    /// Gravity-compensated cruise toward the target.
    MidCourse = 3,
    /// Terminal homing.
    Guided = 4,
    /// Guidance expired, free flight.
    Ballistic = 5,
    /// Guidance stopped (detonated or misconfigured).
    Terminated = 6,
    /// Owned entity destroyed.
    Exploded = 7,
}

impl Stage {
    /// Decode from the atomic representation. Out-of-range values saturate to `Exploded`.
    pub fn from_u8(value: u8) -> Stage {
        match value {
            0 => Stage::Rail,
            1 => Stage::SemiActive,
            2 => Stage::Boost,
            3 => Stage::MidCourse,
            4 => Stage::Guided,
            5 => Stage::Ballistic,
            6 => Stage::Terminated,
            _ => Stage::Exploded,
        }
    }

    /// True for `Terminated` and `Exploded`.
    pub fn is_terminal(self) -> bool {
        self >= Stage::Terminated
    }

    /// Stages with a steering rule.
    pub fn steers(self) -> bool {
        matches!(
            self,
            Stage::Boost | Stage::MidCourse | Stage::SemiActive | Stage::Guided
        )
    }

    /// Stages bounded by the guidance-expiry countdown.
    pub fn has_guidance_timer(self) -> bool {
        matches!(self, Stage::SemiActive | Stage::Guided)
    }
}

/// Coarse classification of world entities, used for target filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityCategory {
    #[default]
    Unknown,
    Missile,
    Meteor,
    Character,
    FloatingObject,
    LargeGrid,
    SmallGrid,
    Station,
}

/// Bit set of entity categories a weapon may engage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetTypes(pub u16);

impl TargetTypes {
    pub const NONE: TargetTypes = TargetTypes(0);
    pub const MISSILE: TargetTypes = TargetTypes(1 << 0);
    pub const METEOR: TargetTypes = TargetTypes(1 << 1);
    pub const CHARACTER: TargetTypes = TargetTypes(1 << 2);
    /// Floating objects.
    pub const MOVING: TargetTypes = TargetTypes(1 << 3);
    pub const LARGE_GRID: TargetTypes = TargetTypes(1 << 4);
    pub const SMALL_GRID: TargetTypes = TargetTypes(1 << 5);
    pub const STATION: TargetTypes = TargetTypes(1 << 6);

    pub const PROJECTILE: TargetTypes = TargetTypes(1 | (1 << 1) | (1 << 3));
    pub const ALL_GRID: TargetTypes = TargetTypes((1 << 4) | (1 << 5) | (1 << 6));
    pub const ALL: TargetTypes = TargetTypes(0x7f);

    pub fn contains(self, other: TargetTypes) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    /// Whether a weapon with these types may engage an entity of `category`.
    pub fn allows(self, category: EntityCategory) -> bool {
        self.contains(TargetTypes::of(category))
    }

    /// The single-bit type of an entity category.
    pub fn of(category: EntityCategory) -> TargetTypes {
        match category {
            EntityCategory::Unknown => TargetTypes::NONE,
            EntityCategory::Missile => TargetTypes::MISSILE,
            EntityCategory::Meteor => TargetTypes::METEOR,
            EntityCategory::Character => TargetTypes::CHARACTER,
            EntityCategory::FloatingObject => TargetTypes::MOVING,
            EntityCategory::LargeGrid => TargetTypes::LARGE_GRID,
            EntityCategory::SmallGrid => TargetTypes::SMALL_GRID,
            EntityCategory::Station => TargetTypes::STATION,
        }
    }
}

impl std::ops::BitOr for TargetTypes {
    type Output = TargetTypes;

    fn bitor(self, rhs: TargetTypes) -> TargetTypes {
        TargetTypes(self.0 | rhs.0)
    }
}

/// Outcome of the launcher's last attempt to pick an initial target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitialTargetStatus {
    /// No ammunition loaded, nothing attempted.
    #[default]
    NotReady,
    /// Target found through the relay network.
    FromWeapon,
    /// Round is laser guided; the launcher itself designates.
    SemiActive,
    /// Launcher is not connected to a relay network.
    NoStorage,
    /// A specific target id was configured but is not known to the network.
    NotFoundId,
    /// No eligible sighting.
    NotFoundAny,
}

/// Why a projectile detonated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetonationCause {
    /// The predicted flight path is blocked.
    Obstruction,
    /// Inside detonation range and diverging from the target.
    Proximity,
}

/// The three periodic sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pass {
    /// Every tick: steering, cluster formation, rail keeping.
    Fast,
    /// Every 10th tick: stage transitions, retargeting, network sync.
    Medium,
    /// Every 100th tick: gravity refresh, blacklist expiry.
    Slow,
}
