//! Command handlers for the Session context.
//!
//! Every handler follows the same shape: lock the chat's session, run the
//! domain operation, then settle (drain events, reconcile the live views,
//! persist). Locks are never held across a ballot window.

use std::sync::Arc;

use narrator_core::aggregate::AggregateRoot;
use narrator_core::command::Command;
use narrator_core::error::DomainError;
use narrator_core::event::DomainEvent;
use narrator_core::ids::{Actor, ChatId, MessageId, SeatNo, UserId};
use narrator_core::transport::{Menu, TransportError};
use narrator_roles::{Faction, Scenario};
use narrator_roster::menus::scenario_menu;
use narrator_roster::texts::{
    Announcement, TIMER_DONE, announcement, call_players, cleanup_done, preview_summary,
    role_delivery, role_summary, timer_started, window_closed, window_opened,
};
use narrator_roster::with_throttle_retry;
use narrator_voting::{VoteRound, VoteStage, parse_defense_seats};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::aggregates::{Prompt, Session};
use crate::domain::commands::{
    AddScenario, AssignSeat, HandleIntent, Intent, OpenSession, RemoveScenario, ResetSession,
    TransferNarrator,
};
use crate::domain::events::{SessionEvent, SessionEventKind};
use crate::domain::names::validate_name;
use crate::domain::phase::Phase;

use super::router::{
    Action, Requirement, TextRoute, authorize, prompt_requirement, route_text,
};
use super::services::SessionServices;
use super::views::{refresh_views, role_rows, seat_name};

/// Countdown commands older than this, by their send time, are ignored.
const STALE_COMMAND_SECS: i64 = 10;

/// Handles one inbound intent: routes it, applies it, tells the actor about
/// a rejection, and settles the session.
///
/// # Errors
///
/// Returns `DomainError::Unauthorized` for chats outside the allow-list and
/// for actions the actor may not perform, and whatever the domain operation
/// rejected the intent with. User-facing rejections have already been
/// shown to the actor when this returns.
#[instrument(skip(services, command), fields(chat_id = %command.chat_id, user_id = %command.actor.user_id, command_type = command.command_type()))]
pub async fn handle_intent(
    services: &Arc<SessionServices>,
    command: &HandleIntent,
) -> Result<Vec<SessionEvent>, DomainError> {
    if !services.profiles.is_allowed(command.chat_id).await {
        debug!("chat is not on the allow-list, intent dropped");
        return Err(DomainError::Unauthorized(format!(
            "chat {} is not served",
            command.chat_id
        )));
    }

    let handle = services.directory.get_or_create(command.chat_id);
    let mut session = handle.lock().await;
    let outcome = dispatch(services, &mut session, command).await;
    acknowledge(services, command, &outcome).await;
    let events = settle(services, &mut session).await;
    outcome.map(|_| events)
}

/// Handles the `OpenSession` command.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for an unknown scenario and
/// `DomainError::Validation` for a bad seat count or a scenario that does
/// not fit.
#[instrument(skip(services, command), fields(chat_id = %command.chat_id, command_type = command.command_type()))]
pub async fn handle_open_session(
    services: &Arc<SessionServices>,
    command: &OpenSession,
) -> Result<Vec<SessionEvent>, DomainError> {
    let scenario = match &command.scenario {
        Some(name) => Some(find_scenario(services, name).await?),
        None => None,
    };

    let handle = services.directory.get_or_create(command.chat_id);
    let mut session = handle.lock().await;
    session.open(
        command.seats,
        services.config.max_seats,
        scenario,
        command.title.clone(),
        command.correlation_id,
        services.clock.as_ref(),
    )?;
    Ok(settle(services, &mut session).await)
}

/// Handles the `ResetSession` command. Menus of the abandoned game are
/// removed on a best-effort basis.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the chat has no session.
#[instrument(skip(services, command), fields(chat_id = %command.chat_id, command_type = command.command_type()))]
pub async fn handle_reset_session(
    services: &Arc<SessionServices>,
    command: &ResetSession,
) -> Result<Vec<SessionEvent>, DomainError> {
    let handle = services
        .directory
        .get(command.chat_id)
        .ok_or_else(|| DomainError::NotFound(format!("no session in chat {}", command.chat_id)))?;
    let mut session = handle.lock().await;
    let menu = secondary_view(&session);
    discard_view(services, command.chat_id, menu).await;
    session.reset(command.correlation_id, services.clock.as_ref());
    Ok(settle(services, &mut session).await)
}

/// Handles the `TransferNarrator` command. When roles are already
/// committed, the new narrator receives the role summary.
///
/// # Errors
///
/// Returns `DomainError::Unauthorized` unless the requester narrates (or
/// the chair is vacant), and `DomainError::Validation` if the new narrator
/// holds a seat.
#[instrument(skip(services, command), fields(chat_id = %command.chat_id, command_type = command.command_type()))]
pub async fn handle_transfer_narrator(
    services: &Arc<SessionServices>,
    command: &TransferNarrator,
) -> Result<Vec<SessionEvent>, DomainError> {
    let handle = services.directory.get_or_create(command.chat_id);
    let mut session = handle.lock().await;
    authorize(
        &session,
        command.requested_by.user_id,
        Requirement::NarratorOrVacant,
    )?;

    let name = resolve_name(services, &command.to).await;
    session.transfer_narrator(
        command.to.user_id,
        name,
        command.correlation_id,
        services.clock.as_ref(),
    )?;
    if session.phase().is_committed() {
        let factions = services.profiles.factions().await;
        let rows = role_rows(
            &session,
            session.roles().iter().map(|(seat, role)| (*seat, role.as_str())),
            &factions,
        );
        tell_narrator(services, &session, &role_summary(&rows, &[])).await;
    }
    Ok(settle(services, &mut session).await)
}

/// Handles the `AssignSeat` command. Without a usable name, the narrator
/// is prompted for one and the seat is taken when it arrives.
///
/// # Errors
///
/// Returns `DomainError::Unauthorized` unless the requester narrates, and
/// the seating rejections of the session.
#[instrument(skip(services, command), fields(chat_id = %command.chat_id, seat = command.seat, command_type = command.command_type()))]
pub async fn handle_assign_seat(
    services: &Arc<SessionServices>,
    command: &AssignSeat,
) -> Result<Vec<SessionEvent>, DomainError> {
    let handle = services.directory.get_or_create(command.chat_id);
    let mut session = handle.lock().await;
    authorize(&session, command.requested_by.user_id, Requirement::Narrator)?;

    let name = match &command.name {
        Some(raw) => Some(validate_name(raw, services.config.name_max_chars)?),
        None => services.profiles.display_name(command.user_id).await,
    };
    if let Some(name) = name {
        session.assign_seat(
            command.seat,
            command.user_id,
            name,
            command.correlation_id,
            services.clock.as_ref(),
        )?;
    } else {
        check_seat_claimable(&session, command.seat)?;
        let prompt = Prompt::ProxyName {
            seat: command.seat,
            user_id: command.user_id,
        };
        session.set_prompt(command.requested_by.user_id, prompt);
        announce(services, command.chat_id, &prompt_notice(prompt)).await;
    }
    Ok(settle(services, &mut session).await)
}

/// Handles the `AddScenario` command, replacing any scenario of the same
/// name.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an empty name, zero counts or an
/// empty role list.
#[instrument(skip(services, command), fields(scenario = %command.name, command_type = command.command_type()))]
pub async fn handle_add_scenario(
    services: &SessionServices,
    command: &AddScenario,
) -> Result<Scenario, DomainError> {
    let scenario = Scenario::new(command.name.trim(), command.roles.clone())?;
    services.profiles.upsert_scenario(scenario.clone()).await;
    info!(headcount = scenario.headcount(), "scenario stored");
    Ok(scenario)
}

/// Handles the `RemoveScenario` command.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if no scenario has that name.
#[instrument(skip(services, command), fields(scenario = %command.name, command_type = command.command_type()))]
pub async fn handle_remove_scenario(
    services: &SessionServices,
    command: &RemoveScenario,
) -> Result<(), DomainError> {
    if services.profiles.remove_scenario(&command.name).await {
        info!("scenario removed");
        Ok(())
    } else {
        Err(DomainError::NotFound(format!(
            "no scenario named {}",
            command.name
        )))
    }
}

/// Re-arms the close timer of every ballot window that was open when the
/// process stopped. Windows already past their deadline close at once.
pub async fn resume_ballot_timers(services: &Arc<SessionServices>) {
    let now = services.clock.now();
    for chat_id in services.directory.chat_ids() {
        let Some(handle) = services.directory.get(chat_id) else {
            continue;
        };
        let open = handle.lock().await.open_window();
        if let Some((round_id, window)) = open {
            let delay = (window.closes_at - now).to_std().unwrap_or_default();
            info!(%chat_id, target = window.target, ?delay, "resuming ballot window");
            schedule_window_close(services, chat_id, round_id, window.target, delay);
        }
    }
}

// ----- intent dispatch -----

async fn dispatch(
    services: &Arc<SessionServices>,
    session: &mut Session,
    command: &HandleIntent,
) -> Result<Option<String>, DomainError> {
    let actor = &command.actor;
    let cid = command.correlation_id;
    match &command.intent {
        Intent::Choice { choice_id, .. } => {
            let Some(action) = Action::parse(choice_id) else {
                debug!(choice_id, "unknown choice ignored");
                return Ok(None);
            };
            authorize(session, actor.user_id, action.requirement())?;
            perform(services, session, actor, action, cid).await
        }
        Intent::Text {
            text,
            reply_to,
            sent_at,
        } => {
            match route_text(session, actor.user_id, text, *reply_to) {
                TextRoute::Prompt(prompt) => {
                    answer_prompt(services, session, actor.user_id, prompt, text, cid).await
                }
                TextRoute::TakeSeat(seat) => seat_actor(services, session, actor, seat, cid).await,
                TextRoute::Timer(secs) => {
                    let age = sent_at.map(|sent| services.clock.now() - sent);
                    if age.is_some_and(|age| age > chrono::Duration::seconds(STALE_COMMAND_SECS)) {
                        debug!(secs, "stale timer command ignored");
                        return Ok(None);
                    }
                    authorize(session, actor.user_id, Requirement::Narrator)?;
                    start_timer(services, session.chat_id(), secs).await?;
                    Ok(None)
                }
                TextRoute::Ballot => {
                    let clock = services.clock.as_ref();
                    let at = sent_at.unwrap_or_else(|| clock.now());
                    let outcome = session.cast_ballot(actor.user_id, at, cid, clock);
                    debug!(?outcome, "ballot");
                    Ok(None)
                }
                TextRoute::Ignore => Ok(None),
            }
        }
    }
}

#[allow(clippy::too_many_lines)]
async fn perform(
    services: &Arc<SessionServices>,
    session: &mut Session,
    actor: &Actor,
    action: Action,
    cid: Uuid,
) -> Result<Option<String>, DomainError> {
    let clock = services.clock.as_ref();
    let config = &services.config;
    let chat_id = session.chat_id();

    match action {
        Action::RegisterNarrator => {
            if session.is_narrator(actor.user_id) {
                return Ok(Some(ask(session, actor.user_id, Prompt::NarratorName)));
            }
            let name = resolve_name(services, actor).await;
            let known = name.is_some();
            session.register_narrator(actor.user_id, name, cid, clock)?;
            if !known {
                return Ok(Some(ask(session, actor.user_id, Prompt::NarratorName)));
            }
        }
        Action::SetEventTime => {
            if !matches!(session.phase(), Phase::Seating | Phase::RolePreview { .. }) {
                return Err(invalid_phase(session, "seating or role_preview"));
            }
            return Ok(Some(ask(session, actor.user_id, Prompt::EventTime)));
        }
        Action::TakeSeat(seat) => return seat_actor(services, session, actor, seat, cid).await,
        Action::CancelSeat => session.cancel_seat(actor.user_id, cid, clock)?,
        Action::Rename => {
            if !matches!(session.phase(), Phase::Seating | Phase::RolePreview { .. }) {
                return Err(invalid_phase(session, "seating or role_preview"));
            }
            return Ok(Some(ask(session, actor.user_id, Prompt::Rename)));
        }
        Action::BeginEdit(field) => session.begin_edit(field, cid, clock)?,
        Action::Toggle(seat) => session.toggle_edit(seat, config.max_warnings, cid, clock)?,
        Action::ConfirmEdit => session.confirm_edit(cid, clock)?,
        Action::CancelEdit => session.cancel_edit(cid, clock)?,
        Action::StartGame => {
            if session.scenario().is_some() {
                session.open_role_preview(cid, clock)?;
            } else {
                check_ready_for_scenario(session)?;
                let scenarios = services.profiles.scenarios().await;
                let view = scenario_menu(session.max_seats(), &scenarios);
                with_throttle_retry(|| {
                    services.transport.send_message(chat_id, &view.text, &view.menu)
                })
                .await?;
            }
        }
        Action::CallPlayers => {
            if session.seats().is_empty() {
                return Err(DomainError::Validation("nobody is seated yet".to_owned()));
            }
            let lines = services.profiles.flavor_lines().await;
            let flavor = if lines.is_empty() {
                None
            } else {
                let max = u32::try_from(lines.len() - 1).unwrap_or(u32::MAX);
                let pick = services.with_rng(|rng| rng.next_u32_range(0, max));
                lines.get(pick as usize).map(String::as_str)
            };
            let names: Vec<(SeatNo, String)> = session
                .seats()
                .iter()
                .map(|(seat, occupant)| (*seat, occupant.name.clone()))
                .collect();
            announce(services, chat_id, &call_players(flavor, &names)).await;
        }
        Action::EndGame => session.end_game(cid, clock)?,
        Action::PickScenario(name) => {
            let scenario = find_scenario(services, &name).await?;
            session.select_scenario(scenario, cid, clock)?;
            if session.can_open_role_preview() {
                session.open_role_preview(cid, clock)?;
            }
        }
        Action::PreviewRoles => {
            let repeats = config.shuffle_repeats;
            let assignment =
                services.with_rng(|rng| session.preview_roles(rng, repeats, cid, clock))?;
            let factions = services.profiles.factions().await;
            let rows = role_rows(
                session,
                session.seats().iter().filter_map(|(seat, occupant)| {
                    assignment.role_of(occupant.user_id).map(|role| (*seat, role))
                }),
                &factions,
            );
            tell_narrator(services, session, &preview_summary(&rows)).await;
        }
        Action::CommitRoles { shuffle_seats } => {
            let repeats = config.shuffle_repeats;
            services
                .with_rng(|rng| session.commit_roles(rng, repeats, shuffle_seats, cid, clock))?;
            deliver_roles(services, session).await;
        }
        Action::Back => {
            let menu = secondary_view(session);
            session.rewind(cid, clock)?;
            discard_view(services, chat_id, menu).await;
        }
        Action::StartVote(VoteStage::Initial) => {
            session.start_vote(VoteStage::Initial, Vec::new(), cid, clock)?;
        }
        Action::StartVote(VoteStage::Final) => {
            if !matches!(session.phase(), Phase::Playing | Phase::Voting(_)) {
                return Err(invalid_phase(session, "playing or voting"));
            }
            return Ok(Some(ask(session, actor.user_id, Prompt::DefenseSeats)));
        }
        Action::VoteBack => match session.vote_round().map(VoteRound::stage) {
            Some(VoteStage::Initial) => {
                session.start_vote(VoteStage::Initial, Vec::new(), cid, clock)?;
            }
            Some(VoteStage::Final) => {
                return Ok(Some(ask(session, actor.user_id, Prompt::DefenseSeats)));
            }
            None => return Err(invalid_phase(session, "voting")),
        },
        Action::OpenBallot(target) => {
            let length = chrono::Duration::from_std(config.ballot_window)
                .unwrap_or_else(|_| chrono::Duration::seconds(5));
            let (round_id, _window) = session.open_ballot_window(target, length, cid, clock)?;
            let name = seat_name(session, target);
            announce(
                services,
                chat_id,
                &window_opened(target, &name, config.ballot_window.as_secs()),
            )
            .await;
            schedule_window_close(services, chat_id, round_id, target, config.ballot_window);
        }
        Action::FinishVote => {
            let menu = secondary_view(session);
            let round = session.finish_vote(cid, clock)?;
            info!(%chat_id, tally = ?round.tally(), "vote finished");
            discard_view(services, chat_id, menu).await;
        }
        Action::Purchase(seat) => session.set_purchased(seat, cid, clock)?,
        Action::Chaos(seat) => session.toggle_chaos(seat, cid, clock)?,
        Action::CleanSweep => session.toggle_clean_sweep(cid, clock)?,
        Action::Winner(faction) => declare_winner(services, session, faction, cid).await?,
        Action::StartTimer(secs) => start_timer(services, chat_id, secs).await?,
        Action::CleanupBelowRoster => cleanup_below_roster(services, session).await?,
    }
    Ok(None)
}

/// Applies the answer to a prompt the actor owed. A malformed answer keeps
/// the prompt open so the actor can try again.
async fn answer_prompt(
    services: &Arc<SessionServices>,
    session: &mut Session,
    user_id: UserId,
    prompt: Prompt,
    text: &str,
    cid: Uuid,
) -> Result<Option<String>, DomainError> {
    let clock = services.clock.as_ref();
    let max_chars = services.config.name_max_chars;
    session.take_prompt(user_id);
    authorize(session, user_id, prompt_requirement(prompt))?;

    let applied = match prompt {
        Prompt::SeatName { seat } => validate_name(text, max_chars)
            .and_then(|name| session.take_seat(seat, user_id, name, cid, clock)),
        Prompt::Rename => validate_name(text, max_chars)
            .and_then(|name| session.rename(user_id, name, cid, clock)),
        Prompt::NarratorName => validate_name(text, max_chars)
            .and_then(|name| session.register_narrator(user_id, Some(name), cid, clock)),
        Prompt::EventTime => session.set_event_time(text, cid, clock),
        Prompt::DefenseSeats => parse_defense_seats(text, |seat| session.is_alive(seat))
            .and_then(|seats| {
                session
                    .start_vote(VoteStage::Final, seats, cid, clock)
                    .map(|_| ())
            }),
        Prompt::ProxyName { seat, user_id: guest } => validate_name(text, max_chars)
            .and_then(|name| session.assign_seat(seat, guest, name, cid, clock)),
    };

    if let Err(DomainError::Validation(_)) = &applied {
        session.set_prompt(user_id, prompt);
    }
    applied.map(|()| None)
}

/// Seats the actor: moves a seated player, or takes the seat under the
/// remembered (or platform) name, or asks for a name first.
async fn seat_actor(
    services: &Arc<SessionServices>,
    session: &mut Session,
    actor: &Actor,
    seat: SeatNo,
    cid: Uuid,
) -> Result<Option<String>, DomainError> {
    let clock = services.clock.as_ref();
    if session.phase() == &Phase::Seating && session.seat_of(actor.user_id).is_some() {
        session.relocate(actor.user_id, seat, cid, clock)?;
        return Ok(None);
    }
    if let Some(name) = resolve_name(services, actor).await {
        session.take_seat(seat, actor.user_id, name, cid, clock)?;
        return Ok(None);
    }
    check_seat_claimable(session, seat)?;
    Ok(Some(ask(session, actor.user_id, Prompt::SeatName { seat })))
}

async fn declare_winner(
    services: &Arc<SessionServices>,
    session: &mut Session,
    winner: Faction,
    cid: Uuid,
) -> Result<(), DomainError> {
    let clock = services.clock.as_ref();
    let chat_id = session.chat_id();
    let menu = secondary_view(session);
    let outcome = session.declare_winner(winner, cid, clock)?;

    let event_counter = services.profiles.increment_counter(chat_id).await;
    let factions = services.profiles.factions().await;
    let text = announcement(&Announcement {
        chat_label: SessionServices::chat_label(session),
        date: session.opened_on().unwrap_or_else(|| clock.today()),
        narrator: session.narrator().and_then(|n| n.name.clone()),
        scenario: session.scenario().map(|s| s.name.clone()),
        rows: role_rows(
            session,
            outcome.roles.iter().map(|(seat, role)| (*seat, role.as_str())),
            &factions,
        ),
        winner: outcome.winner,
        purchased: outcome.purchased,
        chaos: outcome.chaos.iter().copied().collect(),
        clean_sweep: outcome.clean_sweep,
        event_counter,
    });
    discard_view(services, chat_id, menu).await;
    announce(services, chat_id, &text).await;
    info!(%chat_id, %winner, event_counter, "game finished");

    session.reset(cid, clock);
    Ok(())
}

/// Sends every occupant their role privately and the narrator the full
/// table, naming the players that could not be reached.
async fn deliver_roles(services: &SessionServices, session: &Session) {
    let mut unreachable = Vec::new();
    for (seat, role) in session.roles() {
        let Some(occupant) = session.seats().get(seat) else {
            continue;
        };
        let media = services.profiles.role_media(role).await;
        let text = role_delivery(role, media.as_deref());
        match with_throttle_retry(|| services.transport.send_private(occupant.user_id, &text)).await
        {
            Ok(()) => {}
            Err(TransportError::Unreachable) => unreachable.push(occupant.name.clone()),
            Err(err) => {
                warn!(seat, user_id = %occupant.user_id, error = %err, "role delivery failed");
                unreachable.push(occupant.name.clone());
            }
        }
    }

    let factions = services.profiles.factions().await;
    let rows = role_rows(
        session,
        session.roles().iter().map(|(seat, role)| (*seat, role.as_str())),
        &factions,
    );
    tell_narrator(services, session, &role_summary(&rows, &unreachable)).await;
}

// ----- ballot timers -----

fn schedule_window_close(
    services: &Arc<SessionServices>,
    chat_id: ChatId,
    round_id: Uuid,
    target: SeatNo,
    delay: std::time::Duration,
) {
    let services = Arc::clone(services);
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        close_window(&services, chat_id, round_id, target).await;
    });
}

/// Posts the start notice and schedules the time's-up notice.
async fn start_timer(
    services: &Arc<SessionServices>,
    chat_id: ChatId,
    secs: u32,
) -> Result<(), DomainError> {
    let max = services.config.max_timer.as_secs();
    if secs == 0 || u64::from(secs) > max {
        return Err(DomainError::Validation(format!(
            "a timer runs between 1 and {max} seconds"
        )));
    }
    announce(services, chat_id, &timer_started(secs)).await;
    info!(%chat_id, secs, "timer started");
    let services = Arc::clone(services);
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(u64::from(secs))).await;
        announce(&services, chat_id, TIMER_DONE).await;
    });
    Ok(())
}

/// Deletes the messages posted after the live roster, sparing the session's
/// own views. Ids that are already gone or not deletable are skipped.
async fn cleanup_below_roster(
    services: &SessionServices,
    session: &Session,
) -> Result<(), DomainError> {
    let roster = session.roster_view().ok_or_else(|| {
        DomainError::Validation("there is no roster to clean up below".to_owned())
    })?;
    let chat_id = session.chat_id();
    let keep: Vec<MessageId> = [
        session.role_list_view().map(|view| view.message_id),
        secondary_view(session),
    ]
    .into_iter()
    .flatten()
    .collect();

    let mut deleted = 0;
    for offset in 1..=i64::from(services.config.cleanup_span) {
        let message_id = MessageId(roster.0 + offset);
        if keep.contains(&message_id) {
            continue;
        }
        match services.transport.delete_message(chat_id, message_id).await {
            Ok(()) => deleted += 1,
            Err(err) => debug!(%chat_id, %message_id, error = %err, "nothing to delete"),
        }
    }
    info!(%chat_id, deleted, "cleaned up below the roster");
    announce(services, chat_id, &cleanup_done(deleted)).await;
    Ok(())
}

/// Closes the window on `target` if it is still the open one. A window that
/// was superseded (a new round, a rewind, a reset) is left alone.
async fn close_window(services: &Arc<SessionServices>, chat_id: ChatId, round_id: Uuid, target: SeatNo) {
    let Some(handle) = services.directory.get(chat_id) else {
        return;
    };
    let mut session = handle.lock().await;
    let cid = Uuid::new_v4();
    let Some(ballots) =
        session.close_ballot_window(round_id, target, cid, services.clock.as_ref())
    else {
        debug!(%chat_id, target, "ballot window already superseded");
        return;
    };
    let name = seat_name(&session, target);
    announce(services, chat_id, &window_closed(target, &name, ballots)).await;
    settle(services, &mut session).await;
}

// ----- settling -----

/// Drains the session's events, remembers the names they carry, pushes the
/// views when anything changed, and persists.
async fn settle(services: &SessionServices, session: &mut Session) -> Vec<SessionEvent> {
    let events = session.take_uncommitted_events();
    for event in &events {
        info!(
            chat_id = %event.metadata.chat_id,
            event_type = event.event_type(),
            sequence_number = event.metadata.sequence_number,
            correlation_id = %event.metadata.correlation_id,
            "event recorded"
        );
        match &event.kind {
            SessionEventKind::SeatTaken { user_id, name, .. }
            | SessionEventKind::SeatRenamed { user_id, name, .. }
            | SessionEventKind::NarratorRegistered {
                user_id,
                name: Some(name),
            } => services.profiles.remember_name(*user_id, name).await,
            _ => {}
        }
    }
    if !events.is_empty() {
        refresh_views(services, session).await;
    }
    services.persist(session).await;
    events
}

/// Shows the outcome to the actor: an alert (or chat notice for text) for a
/// rejection, a plain acknowledgement otherwise.
async fn acknowledge(
    services: &SessionServices,
    command: &HandleIntent,
    outcome: &Result<Option<String>, DomainError>,
) {
    let (text, alert) = match outcome {
        Ok(notice) => (notice.clone(), false),
        Err(err) if err.is_user_facing() => (Some(format!("⛔ {err}")), true),
        Err(err) => {
            error!(error = %err, "intent failed");
            (None, false)
        }
    };
    let sent = match &command.intent {
        Intent::Choice { callback_id, .. } => {
            let text = text.unwrap_or_default();
            with_throttle_retry(|| services.transport.answer_choice(callback_id, &text, alert))
                .await
        }
        Intent::Text { .. } => match text {
            Some(text) => {
                let menu = Menu::empty();
                with_throttle_retry(|| {
                    services.transport.send_message(command.chat_id, &text, &menu)
                })
                .await
                .map(|_| ())
            }
            None => Ok(()),
        },
    };
    if let Err(err) = sent {
        debug!(error = %err, "acknowledgement not delivered");
    }
}

// ----- helpers -----

async fn find_scenario(services: &SessionServices, name: &str) -> Result<Scenario, DomainError> {
    services
        .profiles
        .scenario(name)
        .await
        .ok_or_else(|| DomainError::NotFound(format!("no scenario named {name}")))
}

/// The remembered display name of `actor`, else their platform name when it
/// passes validation.
async fn resolve_name(services: &SessionServices, actor: &Actor) -> Option<String> {
    if let Some(name) = services.profiles.display_name(actor.user_id).await {
        return Some(name);
    }
    validate_name(&actor.full_name, services.config.name_max_chars).ok()
}

fn ask(session: &mut Session, user_id: UserId, prompt: Prompt) -> String {
    session.set_prompt(user_id, prompt);
    prompt_notice(prompt)
}

fn prompt_notice(prompt: Prompt) -> String {
    match prompt {
        Prompt::SeatName { seat } => format!("✍️ Send the name to show on seat {seat}."),
        Prompt::Rename => "✍️ Send your new name.".to_owned(),
        Prompt::NarratorName => "✍️ Send the narrator name.".to_owned(),
        Prompt::EventTime => "🕰 Send the start time.".to_owned(),
        Prompt::DefenseSeats => "🛡 Send the defense seat numbers, separated by spaces.".to_owned(),
        Prompt::ProxyName { seat, .. } => format!("✍️ Send the name for seat {seat}."),
    }
}

fn invalid_phase(session: &Session, expected: &'static str) -> DomainError {
    DomainError::InvalidPhase {
        expected,
        actual: session.phase().name(),
    }
}

fn check_ready_for_scenario(session: &Session) -> Result<(), DomainError> {
    if session.phase() != &Phase::Seating {
        return Err(invalid_phase(session, "seating"));
    }
    if session.narrator().is_none() {
        return Err(DomainError::Validation("register a narrator first".to_owned()));
    }
    if !session.is_full() {
        return Err(DomainError::Validation("the roster is not full yet".to_owned()));
    }
    Ok(())
}

fn check_seat_claimable(session: &Session, seat: SeatNo) -> Result<(), DomainError> {
    if session.phase() != &Phase::Seating {
        return Err(invalid_phase(session, "seating"));
    }
    if seat == 0 || seat > session.max_seats() {
        return Err(DomainError::Validation(format!(
            "seat {seat} is out of range"
        )));
    }
    if session.seats().contains_key(&seat) {
        return Err(DomainError::Validation(format!("seat {seat} is taken")));
    }
    Ok(())
}

/// The vote or endgame menu currently live, if any.
fn secondary_view(session: &Session) -> Option<MessageId> {
    match session.phase() {
        Phase::Voting(round) => round.vote_view(),
        Phase::AwaitingWinner(draft) => draft.view,
        _ => None,
    }
}

async fn discard_view(services: &SessionServices, chat_id: ChatId, view: Option<MessageId>) {
    let Some(message_id) = view else {
        return;
    };
    if let Err(err) = services.transport.delete_message(chat_id, message_id).await {
        debug!(%chat_id, %message_id, error = %err, "menu already gone");
    }
}

async fn announce(services: &SessionServices, chat_id: ChatId, text: &str) {
    let menu = Menu::empty();
    if let Err(err) =
        with_throttle_retry(|| services.transport.send_message(chat_id, text, &menu)).await
    {
        warn!(%chat_id, error = %err, "notice not delivered");
    }
}

async fn tell_narrator(services: &SessionServices, session: &Session, text: &str) {
    let Some(narrator) = session.narrator().map(|n| n.user_id) else {
        return;
    };
    match with_throttle_retry(|| services.transport.send_private(narrator, text)).await {
        Ok(()) => {}
        Err(TransportError::Unreachable) => {
            announce(
                services,
                session.chat_id(),
                "⚠️ The narrator has not opened a private chat with the bot yet.",
            )
            .await;
        }
        Err(err) => warn!(user_id = %narrator, error = %err, "narrator message not delivered"),
    }
}
