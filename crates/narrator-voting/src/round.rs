//! Vote rounds and ballot windows.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use narrator_core::error::DomainError;
use narrator_core::ids::{MessageId, SeatNo, UserId};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Which vote is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteStage {
    /// Every non-eliminated occupied seat is a candidate.
    Initial,
    /// Only the narrator-chosen defense seats are candidates.
    Final,
}

impl VoteStage {
    /// Stable name used in logs and views.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Final => "final",
        }
    }
}

/// A fixed, absolute ballot-collection interval tied to one target seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotWindow {
    /// The nominated seat.
    pub target: SeatNo,
    /// Start of the interval (inclusive).
    pub opens_at: DateTime<Utc>,
    /// End of the interval (inclusive).
    pub closes_at: DateTime<Utc>,
}

impl BallotWindow {
    /// Whether `at` falls inside the interval.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.opens_at <= at && at <= self.closes_at
    }
}

/// Result of a ballot attempt. Ballots are free text, so rejected ballots are
/// reported rather than raised as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BallotOutcome {
    /// First ballot of this identity for the open target.
    Recorded,
    /// The identity already voted for this target; nothing changed.
    Duplicate,
    /// No window is open, or `at` lies outside it.
    NoOpenWindow,
    /// The target cannot vote on itself.
    OwnSeat,
    /// The voter holds no seat or is eliminated.
    Ineligible,
}

/// One instance of a voting stage.
///
/// Starting a stage (or restarting it through "back") always creates a new
/// round with a fresh `round_id`, so expiries scheduled for an older round
/// can be recognised and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRound {
    round_id: Uuid,
    stage: VoteStage,
    candidates: Vec<SeatNo>,
    ballots: BTreeMap<SeatNo, BTreeSet<UserId>>,
    finalized: BTreeSet<SeatNo>,
    window: Option<BallotWindow>,
    vote_view: Option<MessageId>,
}

impl VoteRound {
    /// Starts a round over `candidates`, keeping their order and dropping
    /// repeats.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if no candidate remains.
    pub fn start(stage: VoteStage, candidates: Vec<SeatNo>) -> Result<Self, DomainError> {
        let mut seen = BTreeSet::new();
        let candidates: Vec<SeatNo> = candidates
            .into_iter()
            .filter(|seat| seen.insert(*seat))
            .collect();
        if candidates.is_empty() {
            return Err(DomainError::Validation(format!(
                "{} vote has no candidates",
                stage.as_str()
            )));
        }
        Ok(Self {
            round_id: Uuid::new_v4(),
            stage,
            candidates,
            ballots: BTreeMap::new(),
            finalized: BTreeSet::new(),
            window: None,
            vote_view: None,
        })
    }

    /// Identifier of this stage instance.
    #[must_use]
    pub fn round_id(&self) -> Uuid {
        self.round_id
    }

    /// The stage this round runs.
    #[must_use]
    pub fn stage(&self) -> VoteStage {
        self.stage
    }

    /// Candidates in menu order.
    #[must_use]
    pub fn candidates(&self) -> &[SeatNo] {
        &self.candidates
    }

    /// Whether `seat`'s window already expired in this round.
    #[must_use]
    pub fn is_finalized(&self, seat: SeatNo) -> bool {
        self.finalized.contains(&seat)
    }

    /// The currently open window, if any.
    #[must_use]
    pub fn window(&self) -> Option<&BallotWindow> {
        self.window.as_ref()
    }

    /// Distinct voters recorded against `seat`.
    #[must_use]
    pub fn ballots_for(&self, seat: SeatNo) -> Option<&BTreeSet<UserId>> {
        self.ballots.get(&seat)
    }

    /// Message id of the running vote menu.
    #[must_use]
    pub fn vote_view(&self) -> Option<MessageId> {
        self.vote_view
    }

    /// Records the message id of the running vote menu.
    pub fn set_vote_view(&mut self, message_id: Option<MessageId>) {
        self.vote_view = message_id;
    }

    /// Advisory tally in candidate order.
    #[must_use]
    pub fn tally(&self) -> Vec<(SeatNo, usize)> {
        self.candidates
            .iter()
            .map(|seat| (*seat, self.ballots.get(seat).map_or(0, BTreeSet::len)))
            .collect()
    }

    /// Opens a ballot window of `duration` for `target`, starting at `now`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `target` is not a candidate, was
    /// already processed, or another window is still open.
    pub fn open_window(
        &mut self,
        target: SeatNo,
        now: DateTime<Utc>,
        duration: Duration,
    ) -> Result<BallotWindow, DomainError> {
        if !self.candidates.contains(&target) {
            return Err(DomainError::Validation(format!(
                "seat {target} is not a candidate in this vote"
            )));
        }
        if self.finalized.contains(&target) {
            return Err(DomainError::Validation(format!(
                "seat {target} was already voted on"
            )));
        }
        if let Some(open) = &self.window {
            return Err(DomainError::Validation(format!(
                "the ballot window for seat {} is still open",
                open.target
            )));
        }

        let window = BallotWindow {
            target,
            opens_at: now,
            closes_at: now + duration,
        };
        self.window = Some(window);
        self.ballots.entry(target).or_default();
        debug!(round_id = %self.round_id, target, "ballot window opened");
        Ok(window)
    }

    /// Records a ballot from `voter`, sitting in `voter_seat`, at `at`.
    ///
    /// The caller has already checked that the voter is an occupant who is
    /// not eliminated.
    pub fn cast_ballot(
        &mut self,
        voter: UserId,
        voter_seat: SeatNo,
        at: DateTime<Utc>,
    ) -> BallotOutcome {
        let Some(window) = self.window.filter(|w| w.contains(at)) else {
            return BallotOutcome::NoOpenWindow;
        };
        if window.target == voter_seat {
            return BallotOutcome::OwnSeat;
        }
        if self.ballots.entry(window.target).or_default().insert(voter) {
            BallotOutcome::Recorded
        } else {
            BallotOutcome::Duplicate
        }
    }

    /// Closes the window for `target` if it belongs to round `round_id`,
    /// marking the target finalized. Returns the number of ballots recorded
    /// for it, or `None` when the expiry is stale.
    pub fn close_window(&mut self, round_id: Uuid, target: SeatNo) -> Option<usize> {
        if round_id != self.round_id {
            return None;
        }
        match self.window {
            Some(open) if open.target == target => {
                self.window = None;
                self.finalized.insert(target);
                let count = self.ballots.get(&target).map_or(0, BTreeSet::len);
                debug!(round_id = %self.round_id, target, ballots = count, "ballot window closed");
                Some(count)
            }
            _ => None,
        }
    }
}
