//! Narrator — Voting subsystem.
//!
//! A vote round collects advisory ballots per nominated seat inside short,
//! fixed ballot windows. Rounds never decide an outcome on their own.

pub mod defense;
pub mod round;

pub use defense::parse_defense_seats;
pub use round::{BallotOutcome, BallotWindow, VoteRound, VoteStage};
