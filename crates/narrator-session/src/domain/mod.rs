//! Domain layer: the `Session` aggregate and its phase-scoped sub-states.

pub mod aggregates;
pub mod commands;
pub mod config;
pub mod edits;
pub mod endgame;
pub mod events;
pub mod names;
pub mod phase;
