//! Pending edit sets: toggle a draft, then confirm or cancel.

use std::collections::{BTreeMap, BTreeSet};

use narrator_core::ids::SeatNo;
use serde::{Deserialize, Serialize};

/// The session field a pending edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditField {
    /// The elimination set.
    Elimination,
    /// Seats to remove from the roster.
    Deletion,
    /// Per-seat warning counts.
    Warnings,
}

impl EditField {
    /// Stable lowercase name, as used in choice ids.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Elimination => "elimination",
            Self::Deletion => "deletion",
            Self::Warnings => "warnings",
        }
    }

    /// Parses the lowercase name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "elimination" => Some(Self::Elimination),
            "deletion" => Some(Self::Deletion),
            "warnings" => Some(Self::Warnings),
            _ => None,
        }
    }

    /// Hint shown on the roster while the edit is open.
    #[must_use]
    pub fn prompt(self) -> &'static str {
        match self {
            Self::Elimination => "Tap seats to eliminate or restore",
            Self::Deletion => "Tap seats to remove from the roster",
            Self::Warnings => "Tap seats to cycle their warnings",
        }
    }
}

/// A value that can be edited one seat at a time.
pub trait SeatToggle: Clone + PartialEq {
    /// Applies one tap on `seat`.
    fn toggle(&mut self, seat: SeatNo, max_warnings: u32);

    /// Whether `self` and `other` differ at `seat`.
    fn differs_at(&self, other: &Self, seat: SeatNo) -> bool;
}

impl SeatToggle for BTreeSet<SeatNo> {
    fn toggle(&mut self, seat: SeatNo, _max_warnings: u32) {
        if !self.remove(&seat) {
            self.insert(seat);
        }
    }

    fn differs_at(&self, other: &Self, seat: SeatNo) -> bool {
        self.contains(&seat) != other.contains(&seat)
    }
}

impl SeatToggle for BTreeMap<SeatNo, u32> {
    fn toggle(&mut self, seat: SeatNo, max_warnings: u32) {
        let next = self.get(&seat).map_or(1, |n| n + 1);
        if next > max_warnings {
            self.remove(&seat);
        } else {
            self.insert(seat, next);
        }
    }

    fn differs_at(&self, other: &Self, seat: SeatNo) -> bool {
        self.get(&seat) != other.get(&seat)
    }
}

/// A draft of one field plus the value it started from. Leaves only through
/// [`confirm`](Self::confirm) or [`cancel`](Self::cancel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEditSet<T> {
    field: EditField,
    baseline: T,
    draft: T,
}

impl<T: SeatToggle> PendingEditSet<T> {
    /// Opens an edit of `field` starting from `current`.
    #[must_use]
    pub fn begin(field: EditField, current: T) -> Self {
        Self {
            field,
            baseline: current.clone(),
            draft: current,
        }
    }

    /// The field being edited.
    #[must_use]
    pub fn field(&self) -> EditField {
        self.field
    }

    /// The draft value.
    #[must_use]
    pub fn draft(&self) -> &T {
        &self.draft
    }

    /// Applies one tap on `seat` to the draft.
    pub fn toggle(&mut self, seat: SeatNo, max_warnings: u32) {
        self.draft.toggle(seat, max_warnings);
    }

    /// Whether the draft differs from the baseline at `seat`.
    #[must_use]
    pub fn is_provisional(&self, seat: SeatNo) -> bool {
        self.draft.differs_at(&self.baseline, seat)
    }

    /// Ends the edit, yielding the draft.
    #[must_use]
    pub fn confirm(self) -> T {
        self.draft
    }

    /// Ends the edit, yielding the untouched baseline.
    #[must_use]
    pub fn cancel(self) -> T {
        self.baseline
    }
}

/// The pending edit of a session, whichever field it targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingEdit {
    /// Elimination or deletion: a set of seats.
    Seats(PendingEditSet<BTreeSet<SeatNo>>),
    /// Warning counts per seat.
    Warnings(PendingEditSet<BTreeMap<SeatNo, u32>>),
}

impl PendingEdit {
    /// The field being edited.
    #[must_use]
    pub fn field(&self) -> EditField {
        match self {
            Self::Seats(set) => set.field(),
            Self::Warnings(set) => set.field(),
        }
    }

    /// Applies one tap on `seat`.
    pub fn toggle(&mut self, seat: SeatNo, max_warnings: u32) {
        match self {
            Self::Seats(set) => set.toggle(seat, max_warnings),
            Self::Warnings(set) => set.toggle(seat, max_warnings),
        }
    }

    /// Whether `seat` carries an unconfirmed change.
    #[must_use]
    pub fn is_provisional(&self, seat: SeatNo) -> bool {
        match self {
            Self::Seats(set) => set.is_provisional(seat),
            Self::Warnings(set) => set.is_provisional(seat),
        }
    }

    /// The draft seat set of an elimination or deletion edit.
    #[must_use]
    pub fn seats_draft(&self) -> Option<&BTreeSet<SeatNo>> {
        match self {
            Self::Seats(set) => Some(set.draft()),
            Self::Warnings(_) => None,
        }
    }

    /// The draft warning counts of a warnings edit.
    #[must_use]
    pub fn warnings_draft(&self) -> Option<&BTreeMap<SeatNo, u32>> {
        match self {
            Self::Warnings(set) => Some(set.draft()),
            Self::Seats(_) => None,
        }
    }
}
