//! Callback router: parses inbound intent into an action and authorizes it
//! against one table of requirements.

use narrator_core::error::DomainError;
use narrator_core::ids::{MessageId, SeatNo, UserId};
use narrator_roles::Faction;
use narrator_roster::choice;
use narrator_voting::VoteStage;

use crate::domain::aggregates::{Prompt, Session};
use crate::domain::edits::EditField;
use crate::domain::phase::Phase;

/// Who may perform an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Any participant.
    Anyone,
    /// The narrator only.
    Narrator,
    /// The narrator, or anyone while the chair is vacant.
    NarratorOrVacant,
    /// A seated player.
    Occupant,
}

/// A parsed choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Claim the narrator chair or set the narrator name.
    RegisterNarrator,
    /// Ask for the header start time.
    SetEventTime,
    /// Take (or move to) a seat.
    TakeSeat(SeatNo),
    /// Leave the seat.
    CancelSeat,
    /// Ask for a new display name.
    Rename,
    /// Open a pending edit.
    BeginEdit(EditField),
    /// Tap a seat in the pending edit.
    Toggle(SeatNo),
    /// Apply the pending edit.
    ConfirmEdit,
    /// Discard the pending edit.
    CancelEdit,
    /// Move towards role preview (or ask for a scenario first).
    StartGame,
    /// Call every seated player.
    CallPlayers,
    /// End the game.
    EndGame,
    /// Select a stored scenario by name.
    PickScenario(String),
    /// Draw a preview assignment.
    PreviewRoles,
    /// Commit roles, optionally permuting seats.
    CommitRoles {
        /// Permute occupants across seats too.
        shuffle_seats: bool,
    },
    /// Step back one phase.
    Back,
    /// Start a vote stage.
    StartVote(VoteStage),
    /// Open the ballot window for a candidate.
    OpenBallot(SeatNo),
    /// Finish the vote round.
    FinishVote,
    /// Restart the initial stage, or re-ask for defense seats.
    VoteBack,
    /// Toggle the purchased seat.
    Purchase(SeatNo),
    /// Toggle a chaos seat.
    Chaos(SeatNo),
    /// Toggle the clean sweep flag.
    CleanSweep,
    /// Declare the winner.
    Winner(Faction),
    /// Start a countdown of this many seconds.
    StartTimer(u32),
    /// Delete what was posted below the roster.
    CleanupBelowRoster,
}

impl Action {
    /// Parses a choice identifier.
    #[must_use]
    pub fn parse(choice_id: &str) -> Option<Self> {
        let fixed = match choice_id {
            choice::NARRATOR_REGISTER => Some(Self::RegisterNarrator),
            choice::NARRATOR_TIME => Some(Self::SetEventTime),
            choice::SEAT_CANCEL => Some(Self::CancelSeat),
            choice::SEAT_RENAME => Some(Self::Rename),
            choice::EDIT_CONFIRM => Some(Self::ConfirmEdit),
            choice::EDIT_CANCEL => Some(Self::CancelEdit),
            choice::GAME_START => Some(Self::StartGame),
            choice::GAME_CALL => Some(Self::CallPlayers),
            choice::GAME_END => Some(Self::EndGame),
            choice::ROLES_PREVIEW => Some(Self::PreviewRoles),
            choice::ROLES_COMMIT => Some(Self::CommitRoles {
                shuffle_seats: false,
            }),
            choice::ROLES_COMMIT_SHUFFLE => Some(Self::CommitRoles {
                shuffle_seats: true,
            }),
            choice::PHASE_BACK => Some(Self::Back),
            choice::VOTE_START_INITIAL => Some(Self::StartVote(VoteStage::Initial)),
            choice::VOTE_START_FINAL => Some(Self::StartVote(VoteStage::Final)),
            choice::VOTE_FINISH => Some(Self::FinishVote),
            choice::VOTE_BACK => Some(Self::VoteBack),
            choice::ENDGAME_SWEEP => Some(Self::CleanSweep),
            choice::ROSTER_CLEANUP => Some(Self::CleanupBelowRoster),
            _ => None,
        };
        if fixed.is_some() {
            return fixed;
        }

        let (prefix, arg) = choice_id.rsplit_once(':')?;
        let seat = || arg.parse::<SeatNo>().ok();
        match prefix {
            "seat:take" => seat().map(Self::TakeSeat),
            "edit:begin" => EditField::parse(arg).map(Self::BeginEdit),
            "edit:toggle" => seat().map(Self::Toggle),
            "vote:open" => seat().map(Self::OpenBallot),
            "endgame:purchase" => seat().map(Self::Purchase),
            "endgame:chaos" => seat().map(Self::Chaos),
            "game:winner" => Faction::parse(arg).map(Self::Winner),
            "game:timer" => arg.parse().ok().map(Self::StartTimer),
            _ => choice_id
                .strip_prefix("scenario:pick:")
                .filter(|name| !name.is_empty())
                .map(|name| Self::PickScenario(name.to_owned())),
        }
    }

    /// Who may perform this action.
    #[must_use]
    pub fn requirement(&self) -> Requirement {
        match self {
            Self::RegisterNarrator => Requirement::NarratorOrVacant,
            Self::TakeSeat(_) => Requirement::Anyone,
            Self::CancelSeat | Self::Rename => Requirement::Occupant,
            _ => Requirement::Narrator,
        }
    }
}

/// Who may answer a prompt. Re-checked when the answer arrives, since the
/// narrator chair can change hands in between.
#[must_use]
pub fn prompt_requirement(prompt: Prompt) -> Requirement {
    match prompt {
        Prompt::SeatName { .. } => Requirement::Anyone,
        Prompt::Rename => Requirement::Occupant,
        Prompt::NarratorName
        | Prompt::EventTime
        | Prompt::DefenseSeats
        | Prompt::ProxyName { .. } => Requirement::Narrator,
    }
}

/// Checks `actor` against `requirement` on `session`.
///
/// # Errors
///
/// Returns `DomainError::Unauthorized` when the actor lacks the right.
pub fn authorize(
    session: &Session,
    actor: UserId,
    requirement: Requirement,
) -> Result<(), DomainError> {
    let allowed = match requirement {
        Requirement::Anyone => true,
        Requirement::Narrator => session.is_narrator(actor),
        Requirement::NarratorOrVacant => {
            session.narrator().is_none() || session.is_narrator(actor)
        }
        Requirement::Occupant => session.seat_of(actor).is_some(),
    };
    if allowed {
        Ok(())
    } else {
        Err(DomainError::Unauthorized(
            match requirement {
                Requirement::Occupant => "only seated players can do that",
                _ => "only the narrator can do that",
            }
            .to_owned(),
        ))
    }
}

/// Where a free-text message goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRoute {
    /// Answers a prompt the sender owes.
    Prompt(Prompt),
    /// A seat number sent in reply to the roster.
    TakeSeat(SeatNo),
    /// A `/20s` style countdown command.
    Timer(u32),
    /// A ballot in the open window.
    Ballot,
    /// Chatter.
    Ignore,
}

/// Reads a `/<seconds>s` countdown command.
#[must_use]
pub fn parse_timer_command(text: &str) -> Option<u32> {
    let digits = text.trim().strip_prefix('/')?.strip_suffix('s')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Decides where `text` from `actor` goes: an owed prompt first, then a
/// seat number replying to the roster, then a countdown command, then a
/// ballot while a window is open.
#[must_use]
pub fn route_text(
    session: &Session,
    actor: UserId,
    text: &str,
    reply_to: Option<MessageId>,
) -> TextRoute {
    if let Some(prompt) = session.prompt(actor) {
        return TextRoute::Prompt(prompt);
    }
    if session.phase() == &Phase::Seating && reply_to.is_some() && reply_to == session.roster_view()
    {
        if let Ok(seat) = text.trim().parse::<SeatNo>() {
            return TextRoute::TakeSeat(seat);
        }
    }
    if let Some(secs) = parse_timer_command(text) {
        return TextRoute::Timer(secs);
    }
    if session.open_window().is_some() {
        return TextRoute::Ballot;
    }
    TextRoute::Ignore
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use narrator_core::ids::ChatId;
    use narrator_test_support::FixedClock;
    use uuid::Uuid;

    fn seating() -> Session {
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        let cid = Uuid::new_v4();
        let mut session = Session::new(ChatId(1));
        session.open(4, 30, None, None, cid, &clock).unwrap();
        session.register_narrator(UserId(100), None, cid, &clock).unwrap();
        session.take_seat(1, UserId(1), "Ana".into(), cid, &clock).unwrap();
        session.set_roster_view(Some(MessageId(50)));
        session
    }

    #[test]
    fn test_parse_every_fixed_choice() {
        assert_eq!(Action::parse("narrator:register"), Some(Action::RegisterNarrator));
        assert_eq!(
            Action::parse("roles:commit_shuffle"),
            Some(Action::CommitRoles {
                shuffle_seats: true
            })
        );
        assert_eq!(
            Action::parse("vote:start:final"),
            Some(Action::StartVote(VoteStage::Final))
        );
        assert_eq!(Action::parse("endgame:sweep"), Some(Action::CleanSweep));
        assert_eq!(Action::parse("roster:cleanup"), Some(Action::CleanupBelowRoster));
    }

    #[test]
    fn test_parse_parameterised_choices() {
        assert_eq!(Action::parse("seat:take:3"), Some(Action::TakeSeat(3)));
        assert_eq!(Action::parse("edit:toggle:12"), Some(Action::Toggle(12)));
        assert_eq!(
            Action::parse("edit:begin:warnings"),
            Some(Action::BeginEdit(EditField::Warnings))
        );
        assert_eq!(Action::parse("vote:open:2"), Some(Action::OpenBallot(2)));
        assert_eq!(
            Action::parse("game:winner:mafia"),
            Some(Action::Winner(Faction::Mafia))
        );
        assert_eq!(Action::parse("game:timer:45"), Some(Action::StartTimer(45)));
        assert_eq!(
            Action::parse("scenario:pick:big: night"),
            Some(Action::PickScenario("big: night".to_owned()))
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(Action::parse("seat:take:x"), None);
        assert_eq!(Action::parse("edit:begin:roles"), None);
        assert_eq!(Action::parse("scenario:pick:"), None);
        assert_eq!(Action::parse("game:timer:-5"), None);
        assert_eq!(Action::parse("hello"), None);
    }

    #[test]
    fn test_authorization_table() {
        let session = seating();

        assert!(authorize(&session, UserId(100), Requirement::Narrator).is_ok());
        assert!(authorize(&session, UserId(1), Requirement::Narrator).is_err());
        assert!(authorize(&session, UserId(1), Requirement::Occupant).is_ok());
        assert!(authorize(&session, UserId(2), Requirement::Occupant).is_err());
        assert!(authorize(&session, UserId(2), Requirement::NarratorOrVacant).is_err());
        assert!(authorize(&Session::new(ChatId(2)), UserId(2), Requirement::NarratorOrVacant).is_ok());
    }

    #[test]
    fn test_narrator_only_actions() {
        for id in [
            "game:start",
            "edit:toggle:1",
            "vote:open:1",
            "game:winner:town",
            "game:timer:20",
            "roster:cleanup",
        ] {
            assert_eq!(
                Action::parse(id).unwrap().requirement(),
                Requirement::Narrator,
                "{id}"
            );
        }
        assert_eq!(Action::parse("seat:take:1").unwrap().requirement(), Requirement::Anyone);
    }

    #[test]
    fn test_text_routing_order() {
        let mut session = seating();

        assert_eq!(
            route_text(&session, UserId(2), " 3 ", Some(MessageId(50))),
            TextRoute::TakeSeat(3)
        );
        assert_eq!(
            route_text(&session, UserId(2), "3", Some(MessageId(49))),
            TextRoute::Ignore
        );
        session.set_prompt(UserId(2), Prompt::SeatName { seat: 2 });
        assert_eq!(
            route_text(&session, UserId(2), "3", Some(MessageId(50))),
            TextRoute::Prompt(Prompt::SeatName { seat: 2 })
        );
    }

    #[test]
    fn test_timer_command_is_read_before_ballots() {
        let session = seating();

        assert_eq!(route_text(&session, UserId(100), "/20s", None), TextRoute::Timer(20));
        assert_eq!(route_text(&session, UserId(1), " /5s ", None), TextRoute::Timer(5));
        assert_eq!(route_text(&session, UserId(1), "/s", None), TextRoute::Ignore);
        assert_eq!(route_text(&session, UserId(1), "/2m", None), TextRoute::Ignore);
        assert_eq!(route_text(&session, UserId(1), "/+3s", None), TextRoute::Ignore);
    }
}
