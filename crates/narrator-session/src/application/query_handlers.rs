//! Query handlers for the Session context.
//!
//! Read models never expose the role table; roles reach players and the
//! narrator only through private delivery.

use chrono::{DateTime, Utc};
use narrator_core::aggregate::AggregateRoot;
use narrator_core::error::DomainError;
use narrator_core::ids::{ChatId, SeatNo, UserId};
use narrator_roles::Scenario;
use serde::Serialize;

use crate::domain::aggregates::Session;

use super::services::SessionServices;
use super::views::seat_name;

/// One roster line of the read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeatView {
    /// Seat number.
    pub seat: SeatNo,
    /// Occupant, if any.
    pub user_id: Option<UserId>,
    /// Display name, if occupied.
    pub name: Option<String>,
    /// Whether the seat is eliminated.
    pub eliminated: bool,
    /// Warning count.
    pub warnings: u32,
}

/// The open ballot window, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowView {
    /// Candidate seat being voted on.
    pub target: SeatNo,
    /// Candidate display name.
    pub name: String,
    /// Deadline.
    pub closes_at: DateTime<Utc>,
}

/// Vote progress while voting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteView {
    /// `initial` or `final`.
    pub stage: &'static str,
    /// Candidate seats in order.
    pub candidates: Vec<SeatNo>,
    /// Ballots per finalized candidate.
    pub tally: Vec<(SeatNo, usize)>,
    /// The open window.
    pub window: Option<WindowView>,
}

/// Read model of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    /// Chat identity.
    pub chat_id: ChatId,
    /// Phase name.
    pub phase: &'static str,
    /// Events applied so far.
    pub version: i64,
    /// Group label.
    pub title: Option<String>,
    /// Narrator identity.
    pub narrator: Option<UserId>,
    /// Narrator display name.
    pub narrator_name: Option<String>,
    /// Selected scenario name.
    pub scenario: Option<String>,
    /// Seat count.
    pub max_seats: u32,
    /// Header start time.
    pub event_time: Option<String>,
    /// Every seat in order.
    pub seats: Vec<SeatView>,
    /// Vote progress, when voting.
    pub vote: Option<VoteView>,
}

impl SessionView {
    /// Builds the read model of `session`.
    #[must_use]
    pub fn of(session: &Session) -> Self {
        let seats = (1..=session.max_seats())
            .map(|seat| {
                let occupant = session.seats().get(&seat);
                SeatView {
                    seat,
                    user_id: occupant.map(|o| o.user_id),
                    name: occupant.map(|o| o.name.clone()),
                    eliminated: session.eliminated().contains(&seat),
                    warnings: session.warnings().get(&seat).copied().unwrap_or(0),
                }
            })
            .collect();

        let vote = session.vote_round().map(|round| VoteView {
            stage: round.stage().as_str(),
            candidates: round.candidates().to_vec(),
            tally: round.tally(),
            window: round.window().map(|w| WindowView {
                target: w.target,
                name: seat_name(session, w.target),
                closes_at: w.closes_at,
            }),
        });

        Self {
            chat_id: session.chat_id(),
            phase: session.phase().name(),
            version: session.version(),
            title: session.title().map(str::to_owned),
            narrator: session.narrator().map(|n| n.user_id),
            narrator_name: session.narrator().and_then(|n| n.name.clone()),
            scenario: session.scenario().map(|s| s.name.clone()),
            max_seats: session.max_seats(),
            event_time: session.event_time().map(str::to_owned),
            seats,
            vote,
        }
    }
}

/// Returns the read model of the session in `chat_id`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the chat has no session.
pub async fn get_session(
    services: &SessionServices,
    chat_id: ChatId,
) -> Result<SessionView, DomainError> {
    let handle = services
        .directory
        .get(chat_id)
        .ok_or_else(|| DomainError::NotFound(format!("no session in chat {chat_id}")))?;
    let session = handle.lock().await;
    Ok(SessionView::of(&session))
}

/// Chats that currently have a session, in id order.
#[must_use]
pub fn list_sessions(services: &SessionServices) -> Vec<ChatId> {
    services.directory.chat_ids()
}

/// All stored scenarios, sorted by name.
pub async fn list_scenarios(services: &SessionServices) -> Vec<Scenario> {
    let mut scenarios = services.profiles.scenarios().await;
    scenarios.sort_by(|a, b| a.name.cmp(&b.name));
    scenarios
}
