//! Builds render inputs from a session and keeps the live views in sync.

use narrator_core::ids::SeatNo;
use narrator_roles::FactionTable;
use narrator_roster::menus::{EndgameMenu, VoteCandidate, endgame_menu, vote_menu};
use narrator_roster::texts::RoleRow;
use narrator_roster::{
    RenderedView, RosterMode, RosterSnapshot, SeatLine, SeatOccupant, reconcile_role_list,
    reconcile_view, render_roster,
};
use narrator_voting::VoteStage;
use tracing::{debug, warn};

use crate::domain::aggregates::Session;
use crate::domain::edits::EditField;
use crate::domain::phase::Phase;

use super::services::SessionServices;

/// Detaches the roster contents from `session`. A pending edit is shown as
/// its draft, with changed seats flagged as provisional.
#[must_use]
pub fn roster_snapshot(session: &Session, chat_label: String, event_counter: u64) -> RosterSnapshot {
    let edit = session.pending_edit();
    let seats = (1..=session.max_seats())
        .map(|seat| SeatLine {
            seat,
            occupant: session.seats().get(&seat).map(|occupant| {
                let eliminated = match edit {
                    Some(e) if e.field() == EditField::Elimination => {
                        e.seats_draft().is_some_and(|d| d.contains(&seat))
                    }
                    _ => session.eliminated().contains(&seat),
                };
                let warnings = edit
                    .and_then(|e| e.warnings_draft())
                    .unwrap_or(session.warnings())
                    .get(&seat)
                    .copied()
                    .unwrap_or(0);
                let removing = match edit {
                    Some(e) if e.field() == EditField::Deletion => {
                        e.seats_draft().is_some_and(|d| d.contains(&seat))
                    }
                    _ => false,
                };
                SeatOccupant {
                    user_id: occupant.user_id,
                    name: occupant.name.clone(),
                    eliminated,
                    warnings,
                    removing,
                    provisional: edit.is_some_and(|e| e.is_provisional(seat)),
                }
            }),
        })
        .collect();

    let mode = match (edit, session.phase()) {
        (Some(e), _) => RosterMode::Editing {
            prompt: e.field().prompt().to_owned(),
            toggles: session.seats().keys().copied().collect(),
        },
        (None, Phase::Seating) => RosterMode::Registration,
        (None, Phase::RolePreview { preview }) => RosterMode::RolePreview {
            previewed: preview.is_some(),
        },
        (None, Phase::Playing | Phase::Voting(_)) => RosterMode::Controls,
        (None, Phase::Idle | Phase::AwaitingWinner(_) | Phase::Ended(_)) => RosterMode::Closed,
    };

    RosterSnapshot {
        chat_label,
        date: session.opened_on().unwrap_or_default(),
        event_time: session.event_time().map(str::to_owned),
        narrator: session
            .narrator()
            .map(|n| n.name.clone().unwrap_or_else(|| "❓".to_owned())),
        event_counter,
        scenario: session
            .scenario()
            .map(|s| (s.name.clone(), s.headcount())),
        seats,
        mode,
    }
}

/// The vote menu of the running round, if voting.
#[must_use]
pub fn vote_view(session: &Session) -> Option<RenderedView> {
    let round = session.vote_round()?;
    let candidates: Vec<VoteCandidate> = round
        .candidates()
        .iter()
        .map(|seat| VoteCandidate {
            seat: *seat,
            name: seat_name(session, *seat),
            finalized: round.is_finalized(*seat),
            ballots: round.ballots_for(*seat).map_or(0, std::collections::BTreeSet::len),
        })
        .collect();
    Some(vote_menu(round.stage() == VoteStage::Final, &candidates))
}

/// The winner picker, if awaiting the winner.
#[must_use]
pub fn endgame_view(session: &Session) -> Option<RenderedView> {
    let Phase::AwaitingWinner(draft) = session.phase() else {
        return None;
    };
    Some(endgame_menu(&EndgameMenu {
        seats: session.seats().keys().copied().collect(),
        purchased: draft.purchased,
        chaos: draft.chaos.clone(),
        clean_sweep: draft.clean_sweep,
    }))
}

/// Display name of the occupant of `seat`, or a placeholder.
#[must_use]
pub fn seat_name(session: &Session, seat: SeatNo) -> String {
    session
        .seats()
        .get(&seat)
        .map_or_else(|| "⬜".to_owned(), |s| s.name.clone())
}

/// Seat, name, role and faction for every seat in `roles`.
#[must_use]
pub fn role_rows<'a>(
    session: &Session,
    roles: impl IntoIterator<Item = (SeatNo, &'a str)>,
    factions: &FactionTable,
) -> Vec<RoleRow> {
    roles
        .into_iter()
        .map(|(seat, role)| RoleRow {
            seat,
            name: seat_name(session, seat),
            role: role.to_owned(),
            faction: factions.classify(role),
        })
        .collect()
}

/// Pushes every view the session's phase calls for: the roster, the role
/// list, and the vote or endgame menu. Failures are logged; the next
/// mutation retries.
pub async fn refresh_views(services: &SessionServices, session: &mut Session) {
    if session.phase() == &Phase::Idle {
        return;
    }
    let chat_id = session.chat_id();
    let transport = services.transport.as_ref();

    let counter = services.profiles.event_counter(chat_id).await;
    let roster = render_roster(&roster_snapshot(
        session,
        SessionServices::chat_label(session),
        counter,
    ));
    match reconcile_view(transport, chat_id, session.roster_view(), &roster).await {
        Ok(message_id) => session.set_roster_view(Some(message_id)),
        Err(err) => warn!(%chat_id, error = %err, "roster view not reconciled"),
    }

    if let Some(scenario) = session.scenario().cloned() {
        match reconcile_role_list(transport, chat_id, session.role_list_view().cloned(), &scenario)
            .await
        {
            Ok(view) => session.set_role_list_view(Some(view)),
            Err(err) => warn!(%chat_id, error = %err, "role list not reconciled"),
        }
    }

    if let Some(view) = vote_view(session) {
        let live = session.vote_round().and_then(|r| r.vote_view());
        match reconcile_view(transport, chat_id, live, &view).await {
            Ok(message_id) => session.set_vote_view(Some(message_id)),
            Err(err) => warn!(%chat_id, error = %err, "vote menu not reconciled"),
        }
    }

    if let Some(view) = endgame_view(session) {
        let live = match session.phase() {
            Phase::AwaitingWinner(draft) => draft.view,
            _ => None,
        };
        match reconcile_view(transport, chat_id, live, &view).await {
            Ok(message_id) => session.set_endgame_view(Some(message_id)),
            Err(err) => warn!(%chat_id, error = %err, "endgame menu not reconciled"),
        }
    }
    debug!(%chat_id, phase = session.phase().name(), "views refreshed");
}
