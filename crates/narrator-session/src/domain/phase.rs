//! Session phases. Each variant owns the sub-state that is only meaningful
//! while it is active.

use narrator_roles::Assignment;
use narrator_voting::VoteRound;
use serde::{Deserialize, Serialize};

use super::endgame::{EndgameDraft, Outcome};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No game.
    #[default]
    Idle,
    /// Seats are open.
    Seating,
    /// Scenario chosen and seats full; roles can be previewed.
    RolePreview {
        /// The last preview, if any.
        preview: Option<Assignment>,
    },
    /// Roles committed.
    Playing,
    /// A vote round is running.
    Voting(VoteRound),
    /// Game over, winner not yet declared.
    AwaitingWinner(EndgameDraft),
    /// Winner declared.
    Ended(Outcome),
}

impl Phase {
    /// Stable name used in errors, logs and views.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Seating => "seating",
            Self::RolePreview { .. } => "role_preview",
            Self::Playing => "playing",
            Self::Voting(round) => match round.stage() {
                narrator_voting::VoteStage::Initial => "voting_initial",
                narrator_voting::VoteStage::Final => "voting_final",
            },
            Self::AwaitingWinner(_) => "awaiting_winner",
            Self::Ended(_) => "ended",
        }
    }

    /// Whether roles have been committed (playing or later).
    #[must_use]
    pub fn is_committed(&self) -> bool {
        matches!(
            self,
            Self::Playing | Self::Voting(_) | Self::AwaitingWinner(_) | Self::Ended(_)
        )
    }
}
