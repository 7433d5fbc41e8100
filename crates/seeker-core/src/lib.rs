//! Core types and definitions for the seeker flight engine.
//!
//! This crate defines the vocabulary shared across all other crates:
//! geometry, stages, ammunition, events, configuration and errors.
//! It has no dependency on any host or runtime.

pub mod ammo;
pub mod config;
pub mod constants;
pub mod enums;
pub mod error;
pub mod events;
pub mod state;
pub mod types;

#[cfg(test)]
mod tests;
