//! Endgame modifiers and the final outcome.

use std::collections::{BTreeMap, BTreeSet};

use narrator_core::ids::{MessageId, SeatNo};
use narrator_roles::Faction;
use serde::{Deserialize, Serialize};

/// Modifiers the narrator sets before declaring the winner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndgameDraft {
    /// Seat whose role was purchased.
    pub purchased: Option<SeatNo>,
    /// Seats picked by chaos.
    pub chaos: BTreeSet<SeatNo>,
    /// Clean sweep flag.
    pub clean_sweep: bool,
    /// Message id of the winner picker.
    #[serde(default)]
    pub view: Option<MessageId>,
}

impl EndgameDraft {
    /// Sets the purchased seat; choosing it again clears it.
    pub fn set_purchased(&mut self, seat: SeatNo) {
        self.purchased = if self.purchased == Some(seat) {
            None
        } else {
            Some(seat)
        };
    }

    /// Adds or removes `seat` from the chaos set.
    pub fn toggle_chaos(&mut self, seat: SeatNo) {
        if !self.chaos.remove(&seat) {
            self.chaos.insert(seat);
        }
    }
}

/// A finished game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Winning faction.
    pub winner: Faction,
    /// Seat whose role was purchased.
    pub purchased: Option<SeatNo>,
    /// Seats picked by chaos.
    pub chaos: BTreeSet<SeatNo>,
    /// Clean sweep flag.
    pub clean_sweep: bool,
    /// Seat → role table at the end of the game.
    pub roles: BTreeMap<SeatNo, String>,
}
