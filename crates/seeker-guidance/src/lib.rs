//! Guidance math for the seeker flight engine.
//!
//! Pure functions over plain data: stage transitions, bounded heading
//! rotation and moving-target intercept. No host or ECS dependency.

pub mod intercept;
pub mod stages;
pub mod steering;

pub use seeker_core as core;
