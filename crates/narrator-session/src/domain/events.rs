//! Domain events for the Session context.
//!
//! Events carry no role labels: they are logged, and roles stay secret
//! until the winner is announced.

use chrono::{DateTime, Utc};
use narrator_core::event::{DomainEvent, EventMetadata};
use narrator_core::ids::{SeatNo, UserId};
use narrator_roles::Faction;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::edits::EditField;

/// Event payload variants for the Session context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEventKind {
    /// A session was opened with `seats` empty seats.
    SessionOpened {
        /// Number of seats.
        seats: u32,
        /// Scenario preselected at open time.
        scenario: Option<String>,
    },
    /// The session went back to idle.
    SessionReset,
    /// A narrator registered on a vacant chair, or set their name.
    NarratorRegistered {
        /// The narrator identity.
        user_id: UserId,
        /// Display name, if known yet.
        name: Option<String>,
    },
    /// The narrator chair changed hands.
    NarratorTransferred {
        /// Previous narrator.
        from: Option<UserId>,
        /// New narrator.
        to: UserId,
        /// Display name of the new narrator.
        name: Option<String>,
    },
    /// The header start time changed.
    EventTimeSet {
        /// Free text shown in the header.
        text: String,
    },
    /// A seat was taken, by its occupant or by proxy.
    SeatTaken {
        /// The seat.
        seat: SeatNo,
        /// The occupant.
        user_id: UserId,
        /// Display name.
        name: String,
    },
    /// An occupant moved to another seat.
    SeatRelocated {
        /// The occupant.
        user_id: UserId,
        /// Seat left.
        from: SeatNo,
        /// Seat taken.
        to: SeatNo,
    },
    /// An occupant left their seat.
    SeatCancelled {
        /// The seat vacated.
        seat: SeatNo,
        /// The former occupant.
        user_id: UserId,
    },
    /// An occupant's display name changed.
    SeatRenamed {
        /// The seat.
        seat: SeatNo,
        /// The occupant.
        user_id: UserId,
        /// New display name.
        name: String,
    },
    /// A scenario was selected.
    ScenarioSelected {
        /// Scenario name.
        name: String,
        /// Role count.
        headcount: u32,
    },
    /// Seats are full and roles can be previewed.
    RolePreviewOpened,
    /// A preview assignment was drawn.
    RolesPreviewed {
        /// Number of players.
        players: usize,
    },
    /// Roles were committed and the game is on.
    RolesCommitted {
        /// Whether seat order was permuted.
        seats_shuffled: bool,
        /// Number of players.
        players: usize,
    },
    /// A "back" step discarded a phase's sub-state.
    PhaseRewound {
        /// Phase left.
        from: String,
        /// Phase entered.
        to: String,
    },
    /// A pending edit opened.
    EditBegun {
        /// Field edited.
        field: EditField,
    },
    /// A seat was tapped in the pending edit.
    EditToggled {
        /// Field edited.
        field: EditField,
        /// Seat tapped.
        seat: SeatNo,
    },
    /// The pending edit was applied.
    EditConfirmed {
        /// Field edited.
        field: EditField,
        /// Seats whose value changed.
        changed: Vec<SeatNo>,
    },
    /// The pending edit was discarded.
    EditCancelled {
        /// Field edited.
        field: EditField,
    },
    /// A vote round started.
    VoteStarted {
        /// Round identifier.
        round_id: Uuid,
        /// "initial" or "final".
        stage: String,
        /// Candidate seats in menu order.
        candidates: Vec<SeatNo>,
    },
    /// A ballot window opened.
    BallotWindowOpened {
        /// Round identifier.
        round_id: Uuid,
        /// Seat voted on.
        target: SeatNo,
        /// Absolute close time.
        closes_at: DateTime<Utc>,
    },
    /// A ballot was recorded.
    BallotCast {
        /// Round identifier.
        round_id: Uuid,
        /// Seat voted on.
        target: SeatNo,
        /// Voter identity.
        voter: UserId,
    },
    /// A ballot window expired.
    BallotWindowClosed {
        /// Round identifier.
        round_id: Uuid,
        /// Seat voted on.
        target: SeatNo,
        /// Distinct voters recorded.
        ballots: usize,
    },
    /// The narrator finished the vote round.
    VoteFinished {
        /// Round identifier.
        round_id: Uuid,
        /// Advisory tally in candidate order.
        tally: Vec<(SeatNo, usize)>,
    },
    /// The narrator ended the game; the winner is still open.
    GameEnded,
    /// An endgame modifier changed.
    EndgameModified {
        /// Purchased seat.
        purchased: Option<SeatNo>,
        /// Chaos seats.
        chaos: Vec<SeatNo>,
        /// Clean sweep flag.
        clean_sweep: bool,
    },
    /// The winner was declared.
    WinnerDeclared {
        /// Winning faction.
        winner: Faction,
    },
}

impl SessionEventKind {
    /// Event type identifier.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionOpened { .. } => "session.opened",
            Self::SessionReset => "session.reset",
            Self::NarratorRegistered { .. } => "session.narrator_registered",
            Self::NarratorTransferred { .. } => "session.narrator_transferred",
            Self::EventTimeSet { .. } => "session.event_time_set",
            Self::SeatTaken { .. } => "session.seat_taken",
            Self::SeatRelocated { .. } => "session.seat_relocated",
            Self::SeatCancelled { .. } => "session.seat_cancelled",
            Self::SeatRenamed { .. } => "session.seat_renamed",
            Self::ScenarioSelected { .. } => "session.scenario_selected",
            Self::RolePreviewOpened => "session.role_preview_opened",
            Self::RolesPreviewed { .. } => "session.roles_previewed",
            Self::RolesCommitted { .. } => "session.roles_committed",
            Self::PhaseRewound { .. } => "session.phase_rewound",
            Self::EditBegun { .. } => "session.edit_begun",
            Self::EditToggled { .. } => "session.edit_toggled",
            Self::EditConfirmed { .. } => "session.edit_confirmed",
            Self::EditCancelled { .. } => "session.edit_cancelled",
            Self::VoteStarted { .. } => "session.vote_started",
            Self::BallotWindowOpened { .. } => "session.ballot_window_opened",
            Self::BallotCast { .. } => "session.ballot_cast",
            Self::BallotWindowClosed { .. } => "session.ballot_window_closed",
            Self::VoteFinished { .. } => "session.vote_finished",
            Self::GameEnded => "session.game_ended",
            Self::EndgameModified { .. } => "session.endgame_modified",
            Self::WinnerDeclared { .. } => "session.winner_declared",
        }
    }
}

/// Domain event envelope for the Session context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: SessionEventKind,
}

impl DomainEvent for SessionEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(&self.kind).unwrap_or(serde_json::Value::Null)
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
