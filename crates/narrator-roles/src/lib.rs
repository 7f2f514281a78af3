//! Narrator — Role Assignment Engine.
//!
//! Scenarios describe a multiset of role labels. The engine turns a scenario
//! and an ordered list of identities into an identity→role bijection, and can
//! permute seat order for the commit step.

pub mod assignment;
pub mod faction;
pub mod scenario;
pub mod shuffle;

pub use assignment::{Assignment, assign, seat_roles};
pub use faction::{Faction, FactionTable};
pub use scenario::Scenario;
pub use shuffle::permute;
