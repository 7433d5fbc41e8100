//! Headless reference host used by tests and the demo binary.

pub mod weapon;
pub mod world;

pub use weapon::SandboxWeapon;
pub use world::{BodySpec, EmpRecord, GravityWell, SandboxEntity, SandboxHost, ROUND_HALF_EXTENTS};
