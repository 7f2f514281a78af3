//! Narrator — Session state machine.
//!
//! Responsible for the per-chat game session: seats, narrator, scenario,
//! role commit, pending edits, voting rounds and the endgame, plus the
//! directory that serializes work per chat and the router that authorizes
//! inbound intents.

pub mod application;
pub mod domain;

pub use domain::config::GameConfig;
