//! Aggregate root for the Session context.
//!
//! Every operation validates first and mutates last, so an `Err` leaves the
//! session exactly as it was. Authorization is the router's job; the
//! aggregate only enforces phase legality and the data invariants.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use narrator_core::aggregate::AggregateRoot;
use narrator_core::clock::Clock;
use narrator_core::error::DomainError;
use narrator_core::event::EventMetadata;
use narrator_core::ids::{ChatId, MessageId, SeatNo, UserId};
use narrator_core::rng::DeterministicRng;
use narrator_roles::{Assignment, Faction, Scenario, assign, permute, seat_roles};
use narrator_roster::RoleListView;
use narrator_voting::{BallotOutcome, BallotWindow, VoteRound, VoteStage};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::edits::{EditField, PendingEdit, PendingEditSet};
use super::endgame::{EndgameDraft, Outcome};
use super::events::{SessionEvent, SessionEventKind};
use super::phase::Phase;

/// The narrator of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Narrator {
    /// Narrator identity.
    pub user_id: UserId,
    /// Display name, once known.
    pub name: Option<String>,
}

/// The occupant of a seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    /// Occupant identity.
    pub user_id: UserId,
    /// Display name.
    pub name: String,
}

/// A free-text input an identity owes the session. The next text from that
/// identity answers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Prompt {
    /// Name for the seat the identity tapped.
    SeatName {
        /// Seat tapped.
        seat: SeatNo,
    },
    /// New display name of an occupant.
    Rename,
    /// Narrator display name.
    NarratorName,
    /// Header start time.
    EventTime,
    /// Defense seats for the final vote.
    DefenseSeats,
    /// Name for an identity the narrator seats by proxy.
    ProxyName {
        /// Seat to fill.
        seat: SeatNo,
        /// Identity to seat.
        user_id: UserId,
    },
}

/// The aggregate root for one chat's game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    chat_id: ChatId,
    version: i64,
    title: Option<String>,
    narrator: Option<Narrator>,
    seats: BTreeMap<SeatNo, Seat>,
    max_seats: u32,
    event_time: Option<String>,
    opened_on: Option<NaiveDate>,
    scenario: Option<Scenario>,
    phase: Phase,
    eliminated: BTreeSet<SeatNo>,
    warnings: BTreeMap<SeatNo, u32>,
    roles: BTreeMap<SeatNo, String>,
    pending_edit: Option<PendingEdit>,
    prompts: BTreeMap<UserId, Prompt>,
    roster_view: Option<MessageId>,
    role_list_view: Option<RoleListView>,
    #[serde(skip)]
    uncommitted_events: Vec<SessionEvent>,
}

const SEATING: &str = "seating";
const SEATING_OR_PREVIEW: &str = "seating or role_preview";
const ROLE_PREVIEW: &str = "role_preview";
const PLAYING: &str = "playing";
const PLAYING_OR_VOTING: &str = "playing or voting";
const VOTING: &str = "voting";
const AWAITING_WINNER: &str = "awaiting_winner";

impl Session {
    /// Creates an idle session for `chat_id`.
    #[must_use]
    pub fn new(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            version: 0,
            title: None,
            narrator: None,
            seats: BTreeMap::new(),
            max_seats: 0,
            event_time: None,
            opened_on: None,
            scenario: None,
            phase: Phase::Idle,
            eliminated: BTreeSet::new(),
            warnings: BTreeMap::new(),
            roles: BTreeMap::new(),
            pending_edit: None,
            prompts: BTreeMap::new(),
            roster_view: None,
            role_list_view: None,
            uncommitted_events: Vec::new(),
        }
    }

    // ----- queries -----

    /// The chat this session belongs to.
    #[must_use]
    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    /// Group label shown in the roster header.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// The narrator, if registered.
    #[must_use]
    pub fn narrator(&self) -> Option<&Narrator> {
        self.narrator.as_ref()
    }

    /// Whether `user_id` is the narrator.
    #[must_use]
    pub fn is_narrator(&self, user_id: UserId) -> bool {
        self.narrator.as_ref().is_some_and(|n| n.user_id == user_id)
    }

    /// Occupied seats.
    #[must_use]
    pub fn seats(&self) -> &BTreeMap<SeatNo, Seat> {
        &self.seats
    }

    /// Seat held by `user_id`.
    #[must_use]
    pub fn seat_of(&self, user_id: UserId) -> Option<SeatNo> {
        self.seats
            .iter()
            .find(|(_, seat)| seat.user_id == user_id)
            .map(|(n, _)| *n)
    }

    /// Number of seats the session was opened with.
    #[must_use]
    pub fn max_seats(&self) -> u32 {
        self.max_seats
    }

    /// Whether every seat is occupied.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.max_seats > 0 && self.seats.len() == self.max_seats as usize
    }

    /// Header start time.
    #[must_use]
    pub fn event_time(&self) -> Option<&str> {
        self.event_time.as_deref()
    }

    /// Date the session was opened.
    #[must_use]
    pub fn opened_on(&self) -> Option<NaiveDate> {
        self.opened_on
    }

    /// Selected scenario.
    #[must_use]
    pub fn scenario(&self) -> Option<&Scenario> {
        self.scenario.as_ref()
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Confirmed elimination set.
    #[must_use]
    pub fn eliminated(&self) -> &BTreeSet<SeatNo> {
        &self.eliminated
    }

    /// Confirmed warning counts.
    #[must_use]
    pub fn warnings(&self) -> &BTreeMap<SeatNo, u32> {
        &self.warnings
    }

    /// Committed seat → role map; empty before commit.
    #[must_use]
    pub fn roles(&self) -> &BTreeMap<SeatNo, String> {
        &self.roles
    }

    /// The pending edit, if one is open.
    #[must_use]
    pub fn pending_edit(&self) -> Option<&PendingEdit> {
        self.pending_edit.as_ref()
    }

    /// Prompt owed by `user_id`.
    #[must_use]
    pub fn prompt(&self, user_id: UserId) -> Option<Prompt> {
        self.prompts.get(&user_id).copied()
    }

    /// Live roster message.
    #[must_use]
    pub fn roster_view(&self) -> Option<MessageId> {
        self.roster_view
    }

    /// Live role list message.
    #[must_use]
    pub fn role_list_view(&self) -> Option<&RoleListView> {
        self.role_list_view.as_ref()
    }

    /// The running vote round.
    #[must_use]
    pub fn vote_round(&self) -> Option<&VoteRound> {
        match &self.phase {
            Phase::Voting(round) => Some(round),
            _ => None,
        }
    }

    /// The ballot window currently open, with its round.
    #[must_use]
    pub fn open_window(&self) -> Option<(Uuid, BallotWindow)> {
        self.vote_round()
            .and_then(|round| round.window().map(|w| (round.round_id(), *w)))
    }

    /// Whether `seat` is occupied and not eliminated.
    #[must_use]
    pub fn is_alive(&self, seat: SeatNo) -> bool {
        self.seats.contains_key(&seat) && !self.eliminated.contains(&seat)
    }

    /// Occupied seats still in the game, in seat order.
    #[must_use]
    pub fn living_seats(&self) -> Vec<SeatNo> {
        self.seats
            .keys()
            .copied()
            .filter(|seat| !self.eliminated.contains(seat))
            .collect()
    }

    // ----- session lifecycle -----

    /// Opens a fresh game with `seats` empty seats, optionally with a
    /// scenario preselected.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `seats` is outside
    /// `1..=max_seats` or the scenario does not fit.
    pub fn open(
        &mut self,
        seats: u32,
        max_seats: u32,
        scenario: Option<Scenario>,
        title: Option<String>,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if seats == 0 || seats > max_seats {
            return Err(DomainError::Validation(format!(
                "a session needs between 1 and {max_seats} seats"
            )));
        }
        if let Some(s) = &scenario {
            if !s.fits(seats) {
                return Err(headcount_mismatch(s, seats));
            }
        }

        let scenario_name = scenario.as_ref().map(|s| s.name.clone());
        self.clear_game();
        self.max_seats = seats;
        self.scenario = scenario;
        self.opened_on = Some(clock.today());
        self.phase = Phase::Seating;
        if title.is_some() {
            self.title = title;
        }
        self.record(
            SessionEventKind::SessionOpened {
                seats,
                scenario: scenario_name,
            },
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Returns the session to idle. The title and role list message survive.
    pub fn reset(&mut self, correlation_id: Uuid, clock: &dyn Clock) {
        self.clear_game();
        self.record(SessionEventKind::SessionReset, correlation_id, clock);
    }

    fn clear_game(&mut self) {
        self.narrator = None;
        self.seats.clear();
        self.max_seats = 0;
        self.event_time = None;
        self.opened_on = None;
        self.scenario = None;
        self.phase = Phase::Idle;
        self.eliminated.clear();
        self.warnings.clear();
        self.roles.clear();
        self.pending_edit = None;
        self.prompts.clear();
        self.roster_view = None;
    }

    // ----- narrator -----

    /// Registers `user_id` as narrator, or updates the narrator's name.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPhase` once the game has ended,
    /// `DomainError::Unauthorized` if another identity narrates, and
    /// `DomainError::Validation` if `user_id` holds a seat.
    pub fn register_narrator(
        &mut self,
        user_id: UserId,
        name: Option<String>,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if matches!(self.phase, Phase::Ended(_)) {
            return Err(self.invalid_phase("any phase but ended"));
        }
        if let Some(current) = &self.narrator {
            if current.user_id != user_id {
                return Err(DomainError::Unauthorized(
                    "the narrator chair is taken".to_owned(),
                ));
            }
        }
        if let Some(seat) = self.seat_of(user_id) {
            return Err(DomainError::Validation(format!(
                "you hold seat {seat}; a player cannot narrate"
            )));
        }

        let name = name.or_else(|| self.narrator.as_ref().and_then(|n| n.name.clone()));
        self.narrator = Some(Narrator {
            user_id,
            name: name.clone(),
        });
        self.record(
            SessionEventKind::NarratorRegistered { user_id, name },
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Hands the narrator chair to `to`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `to` holds a seat or already
    /// narrates.
    pub fn transfer_narrator(
        &mut self,
        to: UserId,
        name: Option<String>,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if let Some(seat) = self.seat_of(to) {
            return Err(DomainError::Validation(format!(
                "the new narrator holds seat {seat}"
            )));
        }
        if self.is_narrator(to) {
            return Err(DomainError::Validation(
                "that identity already narrates".to_owned(),
            ));
        }

        let from = self.narrator.as_ref().map(|n| n.user_id);
        if let Some(old) = from {
            self.prompts.remove(&old);
        }
        self.narrator = Some(Narrator {
            user_id: to,
            name: name.clone(),
        });
        self.record(
            SessionEventKind::NarratorTransferred { from, to, name },
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Sets the header start time.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPhase` outside seating and role preview,
    /// and `DomainError::Validation` for blank text.
    pub fn set_event_time(
        &mut self,
        text: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if !matches!(self.phase, Phase::Seating | Phase::RolePreview { .. }) {
            return Err(self.invalid_phase(SEATING_OR_PREVIEW));
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(DomainError::Validation(
                "the start time must not be blank".to_owned(),
            ));
        }

        self.event_time = Some(text.to_owned());
        self.record(
            SessionEventKind::EventTimeSet {
                text: text.to_owned(),
            },
            correlation_id,
            clock,
        );
        Ok(())
    }

    // ----- seats -----

    fn check_free_seat(&self, seat: SeatNo) -> Result<(), DomainError> {
        if seat == 0 || seat > self.max_seats {
            return Err(DomainError::Validation(format!(
                "seat {seat} is out of range 1..={}",
                self.max_seats
            )));
        }
        if self.seats.contains_key(&seat) {
            return Err(DomainError::Validation(format!("seat {seat} is taken")));
        }
        Ok(())
    }

    fn occupied_seat(&self, user_id: UserId) -> Result<SeatNo, DomainError> {
        self.seat_of(user_id)
            .ok_or_else(|| DomainError::Validation("you do not hold a seat".to_owned()))
    }

    /// Seats `user_id` at `seat` under `name`. The name is already validated.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPhase` outside seating, and
    /// `DomainError::Validation` if the seat is out of range or taken, the
    /// identity already sits, or the identity narrates.
    pub fn take_seat(
        &mut self,
        seat: SeatNo,
        user_id: UserId,
        name: String,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.phase != Phase::Seating {
            return Err(self.invalid_phase(SEATING));
        }
        self.check_free_seat(seat)?;
        if let Some(held) = self.seat_of(user_id) {
            return Err(DomainError::Validation(format!("you already hold seat {held}")));
        }
        if self.is_narrator(user_id) {
            return Err(DomainError::Validation(
                "the narrator cannot take a seat".to_owned(),
            ));
        }

        self.seats.insert(
            seat,
            Seat {
                user_id,
                name: name.clone(),
            },
        );
        self.record(
            SessionEventKind::SeatTaken {
                seat,
                user_id,
                name,
            },
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Seats another identity on the narrator's behalf.
    ///
    /// # Errors
    ///
    /// Same as [`take_seat`](Self::take_seat).
    pub fn assign_seat(
        &mut self,
        seat: SeatNo,
        user_id: UserId,
        name: String,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.take_seat(seat, user_id, name, correlation_id, clock)
    }

    /// Moves the occupant `user_id` to the empty seat `to`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPhase` outside seating, and
    /// `DomainError::Validation` if the identity holds no seat or `to` is
    /// not free.
    pub fn relocate(
        &mut self,
        user_id: UserId,
        to: SeatNo,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.phase != Phase::Seating {
            return Err(self.invalid_phase(SEATING));
        }
        let from = self.occupied_seat(user_id)?;
        self.check_free_seat(to)?;

        if let Some(occupant) = self.seats.remove(&from) {
            self.seats.insert(to, occupant);
        }
        self.record(
            SessionEventKind::SeatRelocated { user_id, from, to },
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Vacates the seat of `user_id`. In role preview the session drops back
    /// to seating.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPhase` after commit, and
    /// `DomainError::Validation` if the identity holds no seat.
    pub fn cancel_seat(
        &mut self,
        user_id: UserId,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if !matches!(self.phase, Phase::Seating | Phase::RolePreview { .. }) {
            return Err(self.invalid_phase(SEATING_OR_PREVIEW));
        }
        let seat = self.occupied_seat(user_id)?;

        self.vacate(seat);
        self.prompts.remove(&user_id);
        self.record(
            SessionEventKind::SeatCancelled { seat, user_id },
            correlation_id,
            clock,
        );
        self.drop_to_seating_if_not_full(correlation_id, clock);
        Ok(())
    }

    /// Changes the display name of the occupant `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPhase` after commit, and
    /// `DomainError::Validation` if the identity holds no seat.
    pub fn rename(
        &mut self,
        user_id: UserId,
        name: String,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if !matches!(self.phase, Phase::Seating | Phase::RolePreview { .. }) {
            return Err(self.invalid_phase(SEATING_OR_PREVIEW));
        }
        let seat = self.occupied_seat(user_id)?;

        if let Some(occupant) = self.seats.get_mut(&seat) {
            occupant.name.clone_from(&name);
        }
        self.record(
            SessionEventKind::SeatRenamed {
                seat,
                user_id,
                name,
            },
            correlation_id,
            clock,
        );
        Ok(())
    }

    fn vacate(&mut self, seat: SeatNo) {
        self.seats.remove(&seat);
        self.eliminated.remove(&seat);
        self.warnings.remove(&seat);
    }

    fn drop_to_seating_if_not_full(&mut self, correlation_id: Uuid, clock: &dyn Clock) {
        if matches!(self.phase, Phase::RolePreview { .. }) && !self.is_full() {
            self.phase = Phase::Seating;
            self.record(
                SessionEventKind::PhaseRewound {
                    from: ROLE_PREVIEW.to_owned(),
                    to: SEATING.to_owned(),
                },
                correlation_id,
                clock,
            );
        }
    }

    // ----- scenario and roles -----

    /// Selects `scenario`. In role preview the previous preview is dropped.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPhase` after commit, and
    /// `DomainError::Validation` if the headcount differs from the seat
    /// count; the current scenario is left untouched.
    pub fn select_scenario(
        &mut self,
        scenario: Scenario,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if !matches!(self.phase, Phase::Seating | Phase::RolePreview { .. }) {
            return Err(self.invalid_phase(SEATING_OR_PREVIEW));
        }
        if !scenario.fits(self.max_seats) {
            return Err(headcount_mismatch(&scenario, self.max_seats));
        }

        if let Phase::RolePreview { preview } = &mut self.phase {
            *preview = None;
        }
        let event = SessionEventKind::ScenarioSelected {
            name: scenario.name.clone(),
            headcount: scenario.headcount(),
        };
        self.scenario = Some(scenario);
        self.record(event, correlation_id, clock);
        Ok(())
    }

    /// Moves from seating to role preview.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPhase` outside seating, and
    /// `DomainError::Validation` without a narrator, a scenario, full seats,
    /// or while an edit is pending.
    pub fn open_role_preview(
        &mut self,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.phase != Phase::Seating {
            return Err(self.invalid_phase(SEATING));
        }
        if self.narrator.is_none() {
            return Err(DomainError::Validation(
                "register a narrator first".to_owned(),
            ));
        }
        self.check_ready_to_draw()?;
        self.check_no_pending_edit()?;

        self.prompts
            .retain(|_, prompt| !matches!(prompt, Prompt::SeatName { .. }));
        self.phase = Phase::RolePreview { preview: None };
        self.record(SessionEventKind::RolePreviewOpened, correlation_id, clock);
        Ok(())
    }

    /// Whether [`Session::open_role_preview`] would succeed now.
    #[must_use]
    pub fn can_open_role_preview(&self) -> bool {
        self.phase == Phase::Seating
            && self.narrator.is_some()
            && self.check_ready_to_draw().is_ok()
            && self.check_no_pending_edit().is_ok()
    }

    fn check_ready_to_draw(&self) -> Result<&Scenario, DomainError> {
        let scenario = self
            .scenario
            .as_ref()
            .ok_or_else(|| DomainError::Validation("select a scenario first".to_owned()))?;
        if !self.is_full() {
            return Err(DomainError::Validation(format!(
                "{} of {} seats are filled",
                self.seats.len(),
                self.max_seats
            )));
        }
        Ok(scenario)
    }

    fn players(&self) -> Vec<UserId> {
        self.seats.values().map(|seat| seat.user_id).collect()
    }

    /// Draws a preview assignment. Seats, occupancy and phase stay as they
    /// are; only the stored preview changes.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPhase` outside role preview, and
    /// `DomainError::Validation` if seats are not full or no scenario is set.
    pub fn preview_roles(
        &mut self,
        rng: &mut dyn DeterministicRng,
        repeats: u32,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<Assignment, DomainError> {
        if !matches!(self.phase, Phase::RolePreview { .. }) {
            return Err(self.invalid_phase(ROLE_PREVIEW));
        }
        let scenario = self.check_ready_to_draw()?;
        let players = self.players();
        let drawn = assign(&players, scenario, repeats, rng)?;

        if let Phase::RolePreview { preview } = &mut self.phase {
            *preview = Some(drawn.clone());
        }
        self.record(
            SessionEventKind::RolesPreviewed {
                players: players.len(),
            },
            correlation_id,
            clock,
        );
        Ok(drawn)
    }

    /// Commits roles and starts the game. The last preview is reused when it
    /// still covers the roster; otherwise a fresh assignment is drawn. With
    /// `shuffle_seats` the occupants are also permuted across seat numbers.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPhase` outside role preview, and
    /// `DomainError::Validation` if seats are not full, no scenario is set,
    /// or an edit is pending. Nothing changes on error.
    pub fn commit_roles(
        &mut self,
        rng: &mut dyn DeterministicRng,
        repeats: u32,
        shuffle_seats: bool,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let Phase::RolePreview { preview } = &self.phase else {
            return Err(self.invalid_phase(ROLE_PREVIEW));
        };
        let scenario = self.check_ready_to_draw()?;
        self.check_no_pending_edit()?;

        let players = self.players();
        let assignment = match preview {
            Some(p) if p.matches(scenario) && players.iter().all(|u| p.role_of(*u).is_some()) => {
                p.clone()
            }
            _ => assign(&players, scenario, repeats, rng)?,
        };

        let numbers: Vec<SeatNo> = self.seats.keys().copied().collect();
        let mut occupants: Vec<Seat> = self.seats.values().cloned().collect();
        if shuffle_seats {
            permute(&mut occupants, repeats, rng);
        }
        let seats: BTreeMap<SeatNo, Seat> = numbers.into_iter().zip(occupants).collect();
        let roles = seat_roles(
            seats.iter().map(|(n, seat)| (*n, seat.user_id)),
            &assignment,
        )?;

        let players = seats.len();
        self.seats = seats;
        self.roles = roles;
        self.eliminated.clear();
        self.warnings.clear();
        // Seating prompts would otherwise swallow ballots typed later.
        self.prompts.retain(|_, prompt| {
            matches!(prompt, Prompt::NarratorName | Prompt::DefenseSeats)
        });
        self.phase = Phase::Playing;
        self.record(
            SessionEventKind::RolesCommitted {
                seats_shuffled: shuffle_seats,
                players,
            },
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Steps back one phase, discarding that phase's sub-state: role
    /// preview → seating, voting → playing, awaiting winner → playing.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPhase` from any other phase.
    pub fn rewind(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> Result<(), DomainError> {
        let to = match self.phase {
            Phase::RolePreview { .. } => Phase::Seating,
            Phase::Voting(_) | Phase::AwaitingWinner(_) => Phase::Playing,
            _ => return Err(self.invalid_phase("role_preview, voting or awaiting_winner")),
        };
        let from = self.phase.name().to_owned();
        self.phase = to;
        self.record(
            SessionEventKind::PhaseRewound {
                from,
                to: self.phase.name().to_owned(),
            },
            correlation_id,
            clock,
        );
        Ok(())
    }

    // ----- pending edits -----

    fn check_no_pending_edit(&self) -> Result<(), DomainError> {
        match &self.pending_edit {
            Some(edit) => Err(DomainError::Validation(format!(
                "confirm or cancel the pending {} edit first",
                edit.field().as_str()
            ))),
            None => Ok(()),
        }
    }

    /// Opens a pending edit of `field`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPhase` if the field cannot be edited now
    /// (elimination and warnings need playing; deletion needs seating or
    /// role preview), and `DomainError::Validation` if another edit is open.
    pub fn begin_edit(
        &mut self,
        field: EditField,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        match field {
            EditField::Elimination | EditField::Warnings if self.phase != Phase::Playing => {
                return Err(self.invalid_phase(PLAYING));
            }
            EditField::Deletion
                if !matches!(self.phase, Phase::Seating | Phase::RolePreview { .. }) =>
            {
                return Err(self.invalid_phase(SEATING_OR_PREVIEW));
            }
            _ => {}
        }
        self.check_no_pending_edit()?;

        self.pending_edit = Some(match field {
            EditField::Elimination => {
                PendingEdit::Seats(PendingEditSet::begin(field, self.eliminated.clone()))
            }
            EditField::Deletion => PendingEdit::Seats(PendingEditSet::begin(field, BTreeSet::new())),
            EditField::Warnings => {
                PendingEdit::Warnings(PendingEditSet::begin(field, self.warnings.clone()))
            }
        });
        self.record(SessionEventKind::EditBegun { field }, correlation_id, clock);
        Ok(())
    }

    /// Taps `seat` in the pending edit.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if no edit is open or the seat is
    /// empty.
    pub fn toggle_edit(
        &mut self,
        seat: SeatNo,
        max_warnings: u32,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if !self.seats.contains_key(&seat) {
            return Err(DomainError::Validation(format!("seat {seat} is empty")));
        }
        let Some(edit) = self.pending_edit.as_mut() else {
            return Err(no_pending_edit());
        };

        edit.toggle(seat, max_warnings);
        let field = edit.field();
        self.record(
            SessionEventKind::EditToggled { field, seat },
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Applies the pending edit. A confirmed deletion also drops the removed
    /// seats from the elimination set and warning map.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if no edit is open.
    pub fn confirm_edit(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> Result<(), DomainError> {
        let Some(edit) = self.pending_edit.take() else {
            return Err(no_pending_edit());
        };

        let field = edit.field();
        let changed: Vec<SeatNo> = self
            .seats
            .keys()
            .copied()
            .filter(|seat| edit.is_provisional(*seat))
            .collect();
        match edit {
            PendingEdit::Seats(set) if field == EditField::Deletion => {
                for seat in set.confirm() {
                    if let Some(occupant) = self.seats.get(&seat) {
                        self.prompts.remove(&occupant.user_id);
                    }
                    self.vacate(seat);
                }
            }
            PendingEdit::Seats(set) => {
                let occupied = &self.seats;
                self.eliminated = set
                    .confirm()
                    .into_iter()
                    .filter(|seat| occupied.contains_key(seat))
                    .collect();
            }
            PendingEdit::Warnings(set) => {
                let occupied = &self.seats;
                self.warnings = set
                    .confirm()
                    .into_iter()
                    .filter(|(seat, _)| occupied.contains_key(seat))
                    .collect();
            }
        }
        self.record(
            SessionEventKind::EditConfirmed { field, changed },
            correlation_id,
            clock,
        );
        self.drop_to_seating_if_not_full(correlation_id, clock);
        Ok(())
    }

    /// Discards the pending edit.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if no edit is open.
    pub fn cancel_edit(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> Result<(), DomainError> {
        let Some(edit) = self.pending_edit.take() else {
            return Err(no_pending_edit());
        };
        self.record(
            SessionEventKind::EditCancelled {
                field: edit.field(),
            },
            correlation_id,
            clock,
        );
        Ok(())
    }

    // ----- voting -----

    /// Starts a vote round. The initial stage nominates every living seat;
    /// the final stage nominates `defense` in the given order. Starting from
    /// a running round replaces it and keeps its menu message.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPhase` outside playing and voting, and
    /// `DomainError::Validation` while an edit is pending, when a defense
    /// seat is empty or eliminated, or when no candidate remains.
    pub fn start_vote(
        &mut self,
        stage: VoteStage,
        defense: Vec<SeatNo>,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<Uuid, DomainError> {
        if !matches!(self.phase, Phase::Playing | Phase::Voting(_)) {
            return Err(self.invalid_phase(PLAYING_OR_VOTING));
        }
        self.check_no_pending_edit()?;
        let candidates = match stage {
            VoteStage::Initial => self.living_seats(),
            VoteStage::Final => {
                if let Some(seat) = defense.iter().find(|seat| !self.is_alive(**seat)) {
                    return Err(DomainError::Validation(format!(
                        "seat {seat} cannot stand in defense"
                    )));
                }
                defense
            }
        };
        let mut round = VoteRound::start(stage, candidates)?;

        round.set_vote_view(self.vote_round().and_then(VoteRound::vote_view));
        let event = SessionEventKind::VoteStarted {
            round_id: round.round_id(),
            stage: stage.as_str().to_owned(),
            candidates: round.candidates().to_vec(),
        };
        let round_id = round.round_id();
        self.phase = Phase::Voting(round);
        self.record(event, correlation_id, clock);
        Ok(round_id)
    }

    /// Opens the ballot window for `target`, starting now.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPhase` outside voting, and
    /// `DomainError::Validation` if `target` is not an open candidate or a
    /// window is already open.
    pub fn open_ballot_window(
        &mut self,
        target: SeatNo,
        duration: Duration,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(Uuid, BallotWindow), DomainError> {
        let now = clock.now();
        let actual = self.phase.name();
        let Phase::Voting(round) = &mut self.phase else {
            return Err(DomainError::InvalidPhase {
                expected: VOTING,
                actual,
            });
        };
        let window = round.open_window(target, now, duration)?;
        let round_id = round.round_id();
        self.record(
            SessionEventKind::BallotWindowOpened {
                round_id,
                target,
                closes_at: window.closes_at,
            },
            correlation_id,
            clock,
        );
        Ok((round_id, window))
    }

    /// Records a free-text ballot from `voter` at `at`. Only occupants that
    /// are still alive can vote; anything else is reported, never raised.
    pub fn cast_ballot(
        &mut self,
        voter: UserId,
        at: DateTime<Utc>,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> BallotOutcome {
        let voter_seat = match self.seat_of(voter) {
            Some(seat) if !self.eliminated.contains(&seat) => seat,
            _ => return BallotOutcome::Ineligible,
        };
        let Phase::Voting(round) = &mut self.phase else {
            return BallotOutcome::NoOpenWindow;
        };
        let outcome = round.cast_ballot(voter, voter_seat, at);
        if outcome == BallotOutcome::Recorded {
            let round_id = round.round_id();
            let target = round.window().map_or(0, |w| w.target);
            self.record(
                SessionEventKind::BallotCast {
                    round_id,
                    target,
                    voter,
                },
                correlation_id,
                clock,
            );
        }
        outcome
    }

    /// Closes the window for `target` in round `round_id`, marking the
    /// target finalized. Stale expiries (other round, other target, no
    /// longer voting) return `None` and change nothing.
    pub fn close_ballot_window(
        &mut self,
        round_id: Uuid,
        target: SeatNo,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Option<usize> {
        let Phase::Voting(round) = &mut self.phase else {
            return None;
        };
        let ballots = round.close_window(round_id, target)?;
        self.record(
            SessionEventKind::BallotWindowClosed {
                round_id,
                target,
                ballots,
            },
            correlation_id,
            clock,
        );
        Some(ballots)
    }

    /// Ends the vote round and returns to playing. The tally is advisory and
    /// decides nothing.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPhase` outside voting.
    pub fn finish_vote(
        &mut self,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<VoteRound, DomainError> {
        let phase = std::mem::replace(&mut self.phase, Phase::Playing);
        let Phase::Voting(round) = phase else {
            let actual = phase.name();
            self.phase = phase;
            return Err(DomainError::InvalidPhase {
                expected: VOTING,
                actual,
            });
        };
        self.record(
            SessionEventKind::VoteFinished {
                round_id: round.round_id(),
                tally: round.tally(),
            },
            correlation_id,
            clock,
        );
        Ok(round)
    }

    // ----- endgame -----

    /// Ends the game; the winner is declared separately.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPhase` outside playing, and
    /// `DomainError::Validation` while an edit is pending.
    pub fn end_game(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> Result<(), DomainError> {
        if self.phase != Phase::Playing {
            return Err(self.invalid_phase(PLAYING));
        }
        self.check_no_pending_edit()?;

        self.phase = Phase::AwaitingWinner(EndgameDraft::default());
        self.record(SessionEventKind::GameEnded, correlation_id, clock);
        Ok(())
    }

    fn modify_endgame(
        &mut self,
        seat: Option<SeatNo>,
        change: impl FnOnce(&mut EndgameDraft),
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if let Some(seat) = seat {
            if !self.seats.contains_key(&seat) {
                return Err(DomainError::Validation(format!("seat {seat} is empty")));
            }
        }
        let actual = self.phase.name();
        let Phase::AwaitingWinner(draft) = &mut self.phase else {
            return Err(DomainError::InvalidPhase {
                expected: AWAITING_WINNER,
                actual,
            });
        };
        change(draft);
        let event = SessionEventKind::EndgameModified {
            purchased: draft.purchased,
            chaos: draft.chaos.iter().copied().collect(),
            clean_sweep: draft.clean_sweep,
        };
        self.record(event, correlation_id, clock);
        Ok(())
    }

    /// Marks `seat` as purchased; choosing the same seat again clears it.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPhase` unless awaiting the winner, and
    /// `DomainError::Validation` for an empty seat.
    pub fn set_purchased(
        &mut self,
        seat: SeatNo,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.modify_endgame(Some(seat), |d| d.set_purchased(seat), correlation_id, clock)
    }

    /// Adds or removes `seat` from the chaos set.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPhase` unless awaiting the winner, and
    /// `DomainError::Validation` for an empty seat.
    pub fn toggle_chaos(
        &mut self,
        seat: SeatNo,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.modify_endgame(Some(seat), |d| d.toggle_chaos(seat), correlation_id, clock)
    }

    /// Flips the clean sweep flag.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPhase` unless awaiting the winner.
    pub fn toggle_clean_sweep(
        &mut self,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.modify_endgame(
            None,
            |d| d.clean_sweep = !d.clean_sweep,
            correlation_id,
            clock,
        )
    }

    /// Declares `winner` and ends the game.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPhase` unless awaiting the winner.
    pub fn declare_winner(
        &mut self,
        winner: Faction,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<Outcome, DomainError> {
        let Phase::AwaitingWinner(draft) = &self.phase else {
            return Err(self.invalid_phase(AWAITING_WINNER));
        };
        let outcome = Outcome {
            winner,
            purchased: draft.purchased,
            chaos: draft.chaos.clone(),
            clean_sweep: draft.clean_sweep,
            roles: self.roles.clone(),
        };
        self.phase = Phase::Ended(outcome.clone());
        self.record(
            SessionEventKind::WinnerDeclared { winner },
            correlation_id,
            clock,
        );
        Ok(outcome)
    }

    // ----- prompts and views (not recorded as events) -----

    /// Records that `user_id` owes `prompt`, replacing any earlier one.
    pub fn set_prompt(&mut self, user_id: UserId, prompt: Prompt) {
        self.prompts.insert(user_id, prompt);
    }

    /// Removes and returns the prompt owed by `user_id`.
    pub fn take_prompt(&mut self, user_id: UserId) -> Option<Prompt> {
        self.prompts.remove(&user_id)
    }

    /// Records the live roster message.
    pub fn set_roster_view(&mut self, message_id: Option<MessageId>) {
        self.roster_view = message_id;
    }

    /// Records the live role list message.
    pub fn set_role_list_view(&mut self, view: Option<RoleListView>) {
        self.role_list_view = view;
    }

    /// Records the vote menu message of the running round.
    pub fn set_vote_view(&mut self, message_id: Option<MessageId>) {
        if let Phase::Voting(round) = &mut self.phase {
            round.set_vote_view(message_id);
        }
    }

    /// Records the winner picker message.
    pub fn set_endgame_view(&mut self, message_id: Option<MessageId>) {
        if let Phase::AwaitingWinner(draft) = &mut self.phase {
            draft.view = message_id;
        }
    }

    // ----- internals -----

    fn invalid_phase(&self, expected: &'static str) -> DomainError {
        DomainError::InvalidPhase {
            expected,
            actual: self.phase.name(),
        }
    }

    /// Returns the next sequence number for a new event.
    #[allow(clippy::cast_possible_wrap)]
    fn next_sequence_number(&self) -> i64 {
        self.version + self.uncommitted_events.len() as i64 + 1
    }

    fn record(&mut self, kind: SessionEventKind, correlation_id: Uuid, clock: &dyn Clock) {
        let event = SessionEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: kind.event_type().to_owned(),
                chat_id: self.chat_id,
                sequence_number: self.next_sequence_number(),
                correlation_id,
                occurred_at: clock.now(),
            },
            kind,
        };
        self.uncommitted_events.push(event);
    }
}

fn headcount_mismatch(scenario: &Scenario, seats: u32) -> DomainError {
    DomainError::Validation(format!(
        "scenario {} needs {} players, the session has {seats} seats",
        scenario.name,
        scenario.headcount()
    ))
}

fn no_pending_edit() -> DomainError {
    DomainError::Validation("no edit is pending".to_owned())
}

impl AggregateRoot for Session {
    type Event = SessionEvent;

    fn aggregate_id(&self) -> ChatId {
        self.chat_id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    #[allow(clippy::cast_possible_wrap)]
    fn take_uncommitted_events(&mut self) -> Vec<Self::Event> {
        let events = std::mem::take(&mut self.uncommitted_events);
        self.version += events.len() as i64;
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use narrator_core::event::DomainEvent;
    use narrator_core::rng::SystemRng;
    use narrator_test_support::{FixedClock, MockRng, SequenceRng};

    const NARRATOR: UserId = UserId(100);

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 20, 0, 0).unwrap())
    }

    fn five_roles() -> Scenario {
        Scenario::new(
            "classic",
            [("citizen", 2), ("doctor", 1), ("detective", 1), ("mafia", 1)],
        )
        .unwrap()
    }

    fn seated(players: u32) -> Session {
        let clock = clock();
        let cid = Uuid::new_v4();
        let mut session = Session::new(ChatId(-1));
        session.open(players, 30, None, None, cid, &clock).unwrap();
        session
            .register_narrator(NARRATOR, Some("Nora".to_owned()), cid, &clock)
            .unwrap();
        for seat in 1..=players {
            session
                .take_seat(seat, UserId(i64::from(seat)), format!("P{seat}"), cid, &clock)
                .unwrap();
        }
        session
    }

    fn in_preview() -> Session {
        let clock = clock();
        let mut session = seated(5);
        session.select_scenario(five_roles(), Uuid::new_v4(), &clock).unwrap();
        session.open_role_preview(Uuid::new_v4(), &clock).unwrap();
        session
    }

    fn playing() -> Session {
        let mut session = in_preview();
        session
            .commit_roles(&mut MockRng, 1, false, Uuid::new_v4(), &clock())
            .unwrap();
        session
    }

    fn assert_invariants(session: &Session) {
        let occupied: BTreeSet<SeatNo> = session.seats().keys().copied().collect();
        assert!(session.eliminated().is_subset(&occupied));
        let identities: BTreeSet<UserId> = session.seats().values().map(|s| s.user_id).collect();
        assert_eq!(identities.len(), session.seats().len());
        assert!(session.seats().keys().all(|s| *s >= 1 && *s <= session.max_seats()));
    }

    #[test]
    fn test_open_produces_opened_event_with_metadata() {
        // Arrange
        let clock = clock();
        let correlation_id = Uuid::new_v4();
        let mut session = Session::new(ChatId(-42));

        // Act
        session
            .open(10, 30, None, Some("Friday club".to_owned()), correlation_id, &clock)
            .unwrap();

        // Assert
        assert_eq!(session.phase(), &Phase::Seating);
        assert_eq!(session.max_seats(), 10);
        assert_eq!(session.opened_on(), Some(clock.0.date_naive()));
        let events = session.uncommitted_events();
        assert_eq!(events.len(), 1);
        let meta = events[0].metadata();
        assert_eq!(events[0].event_type(), "session.opened");
        assert_eq!(meta.chat_id, ChatId(-42));
        assert_eq!(meta.sequence_number, 1);
        assert_eq!(meta.correlation_id, correlation_id);
        assert_eq!(meta.occurred_at, clock.0);
    }

    #[test]
    fn test_open_rejects_seat_count_out_of_range() {
        let mut session = Session::new(ChatId(1));

        let zero = session.open(0, 30, None, None, Uuid::new_v4(), &clock());
        let many = session.open(31, 30, None, None, Uuid::new_v4(), &clock());

        assert!(matches!(zero, Err(DomainError::Validation(_))));
        assert!(matches!(many, Err(DomainError::Validation(_))));
        assert_eq!(session.phase(), &Phase::Idle);
    }

    #[test]
    fn test_take_seat_rules() {
        // Arrange
        let clock = clock();
        let cid = Uuid::new_v4();
        let mut session = Session::new(ChatId(1));
        session.open(3, 30, None, None, cid, &clock).unwrap();
        session.register_narrator(NARRATOR, None, cid, &clock).unwrap();
        session.take_seat(1, UserId(1), "Ana".into(), cid, &clock).unwrap();

        // Act / Assert
        let out_of_range = session.take_seat(4, UserId(2), "Bo".into(), cid, &clock);
        let taken = session.take_seat(1, UserId(2), "Bo".into(), cid, &clock);
        let twice = session.take_seat(2, UserId(1), "Ana".into(), cid, &clock);
        let narrator = session.take_seat(2, NARRATOR, "Nora".into(), cid, &clock);

        for result in [out_of_range, taken, twice, narrator] {
            assert!(matches!(result, Err(DomainError::Validation(_))));
        }
        assert_eq!(session.seats().len(), 1);
        assert_invariants(&session);
    }

    #[test]
    fn test_seated_player_cannot_narrate() {
        let clock = clock();
        let cid = Uuid::new_v4();
        let mut session = Session::new(ChatId(1));
        session.open(3, 30, None, None, cid, &clock).unwrap();
        session.take_seat(2, UserId(5), "Ana".into(), cid, &clock).unwrap();

        let result = session.register_narrator(UserId(5), None, cid, &clock);

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert!(session.narrator().is_none());
    }

    #[test]
    fn test_narrator_chair_is_guarded() {
        let clock = clock();
        let mut session = seated(2);

        let result = session.register_narrator(UserId(77), None, Uuid::new_v4(), &clock);

        assert!(matches!(result, Err(DomainError::Unauthorized(_))));
        assert!(session.is_narrator(NARRATOR));
    }

    #[test]
    fn test_transfer_narrator_replaces_chair() {
        let clock = clock();
        let mut session = seated(2);

        session
            .transfer_narrator(UserId(77), Some("Max".into()), Uuid::new_v4(), &clock)
            .unwrap();

        assert!(session.is_narrator(UserId(77)));
        assert_eq!(session.narrator().unwrap().name.as_deref(), Some("Max"));
    }

    #[test]
    fn test_relocate_keeps_name() {
        let clock = clock();
        let cid = Uuid::new_v4();
        let mut session = Session::new(ChatId(1));
        session.open(4, 30, None, None, cid, &clock).unwrap();
        session.take_seat(1, UserId(1), "Ana".into(), cid, &clock).unwrap();

        session.relocate(UserId(1), 4, cid, &clock).unwrap();

        assert!(!session.seats().contains_key(&1));
        assert_eq!(session.seats()[&4].name, "Ana");
        assert_eq!(session.seat_of(UserId(1)), Some(4));
    }

    #[test]
    fn test_cancel_seat_in_preview_drops_back_to_seating() {
        let clock = clock();
        let mut session = in_preview();

        session.cancel_seat(UserId(3), Uuid::new_v4(), &clock).unwrap();

        assert_eq!(session.phase(), &Phase::Seating);
        assert!(!session.seats().contains_key(&3));
    }

    #[test]
    fn test_select_scenario_with_wrong_headcount_leaves_scenario_untouched() {
        // Arrange
        let clock = clock();
        let mut session = seated(5);
        session.select_scenario(five_roles(), Uuid::new_v4(), &clock).unwrap();
        let six = Scenario::new("big", [("citizen", 4), ("mafia", 2)]).unwrap();

        // Act
        let result = session.select_scenario(six, Uuid::new_v4(), &clock);

        // Assert
        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(session.scenario(), Some(&five_roles()));
    }

    #[test]
    fn test_role_preview_needs_full_seats_narrator_and_scenario() {
        let clock = clock();
        let cid = Uuid::new_v4();
        let mut session = Session::new(ChatId(1));
        session.open(2, 30, None, None, cid, &clock).unwrap();

        assert!(session.open_role_preview(cid, &clock).is_err());
        session.register_narrator(NARRATOR, None, cid, &clock).unwrap();
        assert!(session.open_role_preview(cid, &clock).is_err());
        let duo = Scenario::new("duo", [("citizen", 1), ("mafia", 1)]).unwrap();
        session.select_scenario(duo, cid, &clock).unwrap();
        session.take_seat(1, UserId(1), "A".into(), cid, &clock).unwrap();
        assert!(session.open_role_preview(cid, &clock).is_err());
        session.take_seat(2, UserId(2), "B".into(), cid, &clock).unwrap();

        session.open_role_preview(cid, &clock).unwrap();

        assert_eq!(session.phase().name(), "role_preview");
    }

    #[test]
    fn test_preview_twice_changes_only_the_preview() {
        // Arrange
        let clock = clock();
        let mut session = in_preview();
        let seats_before = session.seats().clone();
        let mut rng = SystemRng::seeded(3);

        // Act
        let first = session.preview_roles(&mut rng, 1, Uuid::new_v4(), &clock).unwrap();
        let second = session.preview_roles(&mut rng, 1, Uuid::new_v4(), &clock).unwrap();

        // Assert
        assert!(first.matches(&five_roles()));
        assert_eq!(session.seats(), &seats_before);
        assert_eq!(
            session.phase(),
            &Phase::RolePreview {
                preview: Some(second)
            }
        );
        assert!(session.roles().is_empty());
    }

    #[test]
    fn test_commit_without_shuffle_matches_last_preview() {
        // Arrange
        let clock = clock();
        let mut session = in_preview();
        let mut rng = SystemRng::seeded(9);
        session.preview_roles(&mut rng, 1, Uuid::new_v4(), &clock).unwrap();
        let last = session.preview_roles(&mut rng, 2, Uuid::new_v4(), &clock).unwrap();
        let seats_before = session.seats().clone();

        // Act
        session
            .commit_roles(&mut rng, 1, false, Uuid::new_v4(), &clock)
            .unwrap();

        // Assert
        assert_eq!(session.phase(), &Phase::Playing);
        assert_eq!(session.seats(), &seats_before);
        for (seat, occupant) in session.seats() {
            assert_eq!(
                session.roles()[seat].as_str(),
                last.role_of(occupant.user_id).unwrap()
            );
        }
        let mut counts = BTreeMap::new();
        for role in session.roles().values() {
            *counts.entry(role.clone()).or_insert(0_u32) += 1;
        }
        assert_eq!(counts, five_roles().roles);
    }

    #[test]
    fn test_commit_with_seat_shuffle_keeps_identity_roles() {
        let clock = clock();
        let mut session = in_preview();
        let preview = session
            .preview_roles(&mut MockRng, 1, Uuid::new_v4(), &clock)
            .unwrap();

        session
            .commit_roles(&mut MockRng, 1, true, Uuid::new_v4(), &clock)
            .unwrap();

        // MockRng rotates left: seat 1 now holds the former seat 2 occupant.
        assert_eq!(session.seats()[&1].user_id, UserId(2));
        assert_eq!(session.seats()[&5].user_id, UserId(1));
        for (seat, occupant) in session.seats() {
            assert_eq!(
                session.roles()[seat].as_str(),
                preview.role_of(occupant.user_id).unwrap()
            );
        }
        assert_invariants(&session);
    }

    #[test]
    fn test_commit_without_preview_draws_fresh_assignment() {
        let clock = clock();
        let mut session = in_preview();
        let mut rng = SequenceRng::new(vec![0, 1, 2, 3]);

        session
            .commit_roles(&mut rng, 1, false, Uuid::new_v4(), &clock)
            .unwrap();

        assert!(rng.draws() > 0);
        assert_eq!(session.roles().len(), 5);
    }

    #[test]
    fn test_commit_fails_closed_outside_preview() {
        let clock = clock();
        let mut session = seated(5);

        let result = session.commit_roles(&mut MockRng, 1, false, Uuid::new_v4(), &clock);

        assert!(matches!(result, Err(DomainError::InvalidPhase { .. })));
        assert!(session.roles().is_empty());
        assert_eq!(session.phase(), &Phase::Seating);
    }

    #[test]
    fn test_rewind_discards_sub_state() {
        let clock = clock();
        let mut session = in_preview();
        session.preview_roles(&mut MockRng, 1, Uuid::new_v4(), &clock).unwrap();

        session.rewind(Uuid::new_v4(), &clock).unwrap();
        assert_eq!(session.phase(), &Phase::Seating);

        let again = session.rewind(Uuid::new_v4(), &clock);
        assert!(matches!(again, Err(DomainError::InvalidPhase { .. })));
    }

    #[test]
    fn test_elimination_edit_confirm_applies_draft() {
        // Arrange
        let clock = clock();
        let mut session = playing();
        session
            .begin_edit(EditField::Elimination, Uuid::new_v4(), &clock)
            .unwrap();

        // Act
        session.toggle_edit(2, 3, Uuid::new_v4(), &clock).unwrap();
        session.toggle_edit(4, 3, Uuid::new_v4(), &clock).unwrap();
        assert!(session.eliminated().is_empty());
        session.confirm_edit(Uuid::new_v4(), &clock).unwrap();

        // Assert
        assert_eq!(session.eliminated(), &BTreeSet::from([2, 4]));
        assert!(session.pending_edit().is_none());
        assert_invariants(&session);
    }

    #[test]
    fn test_cancel_edit_applies_nothing() {
        let clock = clock();
        let mut session = playing();
        session
            .begin_edit(EditField::Warnings, Uuid::new_v4(), &clock)
            .unwrap();
        session.toggle_edit(1, 3, Uuid::new_v4(), &clock).unwrap();

        session.cancel_edit(Uuid::new_v4(), &clock).unwrap();

        assert!(session.warnings().is_empty());
        assert!(session.pending_edit().is_none());
    }

    #[test]
    fn test_only_one_edit_at_a_time() {
        let clock = clock();
        let mut session = playing();
        session
            .begin_edit(EditField::Elimination, Uuid::new_v4(), &clock)
            .unwrap();

        let second = session.begin_edit(EditField::Warnings, Uuid::new_v4(), &clock);
        let vote = session.start_vote(VoteStage::Initial, vec![], Uuid::new_v4(), &clock);

        assert!(matches!(second, Err(DomainError::Validation(_))));
        assert!(matches!(vote, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_edit_field_phase_rules() {
        let clock = clock();
        let mut seating = seated(3);
        let mut game = playing();

        let eliminate_early = seating.begin_edit(EditField::Elimination, Uuid::new_v4(), &clock);
        let delete_late = game.begin_edit(EditField::Deletion, Uuid::new_v4(), &clock);

        assert!(matches!(eliminate_early, Err(DomainError::InvalidPhase { .. })));
        assert!(matches!(delete_late, Err(DomainError::InvalidPhase { .. })));
    }

    #[test]
    fn test_confirmed_deletion_in_preview_returns_to_seating() {
        // Arrange
        let clock = clock();
        let mut session = in_preview();
        session
            .begin_edit(EditField::Deletion, Uuid::new_v4(), &clock)
            .unwrap();
        session.toggle_edit(5, 3, Uuid::new_v4(), &clock).unwrap();

        // Act
        session.confirm_edit(Uuid::new_v4(), &clock).unwrap();

        // Assert
        assert!(!session.seats().contains_key(&5));
        assert_eq!(session.phase(), &Phase::Seating);
        assert_invariants(&session);
    }

    #[test]
    fn test_toggle_on_empty_seat_is_rejected() {
        let clock = clock();
        let cid = Uuid::new_v4();
        let mut session = Session::new(ChatId(1));
        session.open(3, 30, None, None, cid, &clock).unwrap();
        session.begin_edit(EditField::Deletion, cid, &clock).unwrap();

        let result = session.toggle_edit(2, 3, cid, &clock);

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_initial_vote_nominates_living_seats() {
        let clock = clock();
        let mut session = playing();
        session
            .begin_edit(EditField::Elimination, Uuid::new_v4(), &clock)
            .unwrap();
        session.toggle_edit(2, 3, Uuid::new_v4(), &clock).unwrap();
        session.confirm_edit(Uuid::new_v4(), &clock).unwrap();

        session
            .start_vote(VoteStage::Initial, vec![], Uuid::new_v4(), &clock)
            .unwrap();

        assert_eq!(session.vote_round().unwrap().candidates(), &[1, 3, 4, 5]);
    }

    #[test]
    fn test_final_vote_rejects_eliminated_defense() {
        let clock = clock();
        let mut session = playing();
        session
            .begin_edit(EditField::Elimination, Uuid::new_v4(), &clock)
            .unwrap();
        session.toggle_edit(2, 3, Uuid::new_v4(), &clock).unwrap();
        session.confirm_edit(Uuid::new_v4(), &clock).unwrap();

        let result = session.start_vote(VoteStage::Final, vec![3, 2], Uuid::new_v4(), &clock);

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(session.phase(), &Phase::Playing);
    }

    #[test]
    fn test_ballot_window_flow() {
        // Arrange
        let clock = clock();
        let mut session = playing();
        let round_id = session
            .start_vote(VoteStage::Initial, vec![], Uuid::new_v4(), &clock)
            .unwrap();
        let (opened_round, window) = session
            .open_ballot_window(3, Duration::seconds(5), Uuid::new_v4(), &clock)
            .unwrap();
        let inside = window.opens_at + Duration::seconds(1);

        // Act
        let first = session.cast_ballot(UserId(1), inside, Uuid::new_v4(), &clock);
        let repeat = session.cast_ballot(UserId(1), inside, Uuid::new_v4(), &clock);
        let own = session.cast_ballot(UserId(3), inside, Uuid::new_v4(), &clock);
        let outsider = session.cast_ballot(UserId(999), inside, Uuid::new_v4(), &clock);
        let second = session.cast_ballot(UserId(2), inside, Uuid::new_v4(), &clock);
        let closed = session.close_ballot_window(round_id, 3, Uuid::new_v4(), &clock);

        // Assert
        assert_eq!(opened_round, round_id);
        assert_eq!(first, BallotOutcome::Recorded);
        assert_eq!(repeat, BallotOutcome::Duplicate);
        assert_eq!(own, BallotOutcome::OwnSeat);
        assert_eq!(outsider, BallotOutcome::Ineligible);
        assert_eq!(second, BallotOutcome::Recorded);
        assert_eq!(closed, Some(2));
        assert!(session.vote_round().unwrap().is_finalized(3));
        let reopen = session.open_ballot_window(3, Duration::seconds(5), Uuid::new_v4(), &clock);
        assert!(matches!(reopen, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_stale_expiry_is_ignored_after_restart_of_stage() {
        let clock = clock();
        let mut session = playing();
        let old = session
            .start_vote(VoteStage::Initial, vec![], Uuid::new_v4(), &clock)
            .unwrap();
        session
            .open_ballot_window(1, Duration::seconds(5), Uuid::new_v4(), &clock)
            .unwrap();

        session
            .start_vote(VoteStage::Initial, vec![], Uuid::new_v4(), &clock)
            .unwrap();
        let stale = session.close_ballot_window(old, 1, Uuid::new_v4(), &clock);

        assert_eq!(stale, None);
        assert!(!session.vote_round().unwrap().is_finalized(1));
    }

    #[test]
    fn test_finish_vote_returns_to_playing() {
        let clock = clock();
        let mut session = playing();
        session
            .start_vote(VoteStage::Final, vec![4, 2], Uuid::new_v4(), &clock)
            .unwrap();

        let round = session.finish_vote(Uuid::new_v4(), &clock).unwrap();

        assert_eq!(round.candidates(), &[4, 2]);
        assert_eq!(session.phase(), &Phase::Playing);
        assert!(session.vote_round().is_none());
    }

    #[test]
    fn test_endgame_modifiers_and_winner() {
        // Arrange
        let clock = clock();
        let mut session = playing();
        session.end_game(Uuid::new_v4(), &clock).unwrap();

        // Act
        session.set_purchased(2, Uuid::new_v4(), &clock).unwrap();
        session.toggle_chaos(4, Uuid::new_v4(), &clock).unwrap();
        session.toggle_clean_sweep(Uuid::new_v4(), &clock).unwrap();
        let empty = session.toggle_chaos(9, Uuid::new_v4(), &clock);
        let outcome = session
            .declare_winner(Faction::Town, Uuid::new_v4(), &clock)
            .unwrap();

        // Assert
        assert!(matches!(empty, Err(DomainError::Validation(_))));
        assert_eq!(outcome.winner, Faction::Town);
        assert_eq!(outcome.purchased, Some(2));
        assert_eq!(outcome.chaos, BTreeSet::from([4]));
        assert!(outcome.clean_sweep);
        assert_eq!(outcome.roles.len(), 5);
        assert_eq!(session.phase().name(), "ended");
        let narrate = session.register_narrator(NARRATOR, None, Uuid::new_v4(), &clock);
        assert!(matches!(narrate, Err(DomainError::InvalidPhase { .. })));
    }

    #[test]
    fn test_declare_winner_requires_awaiting_winner() {
        let clock = clock();
        let mut session = playing();

        let result = session.declare_winner(Faction::Mafia, Uuid::new_v4(), &clock);

        assert!(matches!(result, Err(DomainError::InvalidPhase { .. })));
    }

    #[test]
    fn test_reset_clears_game_and_keeps_title() {
        let clock = clock();
        let cid = Uuid::new_v4();
        let mut session = Session::new(ChatId(1));
        session
            .open(2, 30, None, Some("Club".to_owned()), cid, &clock)
            .unwrap();
        session.take_seat(1, UserId(1), "A".into(), cid, &clock).unwrap();
        session.set_roster_view(Some(MessageId(10)));

        session.reset(cid, &clock);

        assert_eq!(session.phase(), &Phase::Idle);
        assert!(session.seats().is_empty());
        assert!(session.roster_view().is_none());
        assert_eq!(session.title(), Some("Club"));
    }

    #[test]
    fn test_take_uncommitted_events_advances_version() {
        let mut session = seated(3);
        let recorded = session.uncommitted_events().len();

        let drained = session.take_uncommitted_events();

        assert_eq!(drained.len(), recorded);
        assert_eq!(session.version(), i64::try_from(recorded).unwrap());
        assert!(session.uncommitted_events().is_empty());
        session.reset(Uuid::new_v4(), &clock());
        assert_eq!(
            session.uncommitted_events()[0].metadata().sequence_number,
            session.version() + 1
        );
    }

    #[test]
    fn test_session_survives_a_snapshot_round_trip() {
        let clock = clock();
        let mut session = playing();
        session
            .start_vote(VoteStage::Initial, vec![], Uuid::new_v4(), &clock)
            .unwrap();

        let json = serde_json::to_string(&session).unwrap();
        let restored: Session = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.phase(), session.phase());
        assert_eq!(restored.seats(), session.seats());
        assert_eq!(restored.roles(), session.roles());
        assert!(restored.uncommitted_events().is_empty());
    }
}
