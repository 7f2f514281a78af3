//! The roster view: header, seat lines and a mode-dependent trailer.

use std::fmt::Write as _;

use chrono::NaiveDate;
use narrator_core::ids::{SeatNo, UserId};
use narrator_core::transport::{Choice, Menu};

use crate::choice;

/// Seats per row in seat-number menus.
const SEATS_PER_ROW: usize = 5;

/// Text plus menu, ready to be sent or edited in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedView {
    /// Message text.
    pub text: String,
    /// Attached choices.
    pub menu: Menu,
}

/// Occupant of one seat, with decorations already resolved against any
/// pending edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatOccupant {
    /// Occupant identity.
    pub user_id: UserId,
    /// Display name.
    pub name: String,
    /// Eliminated (or provisionally eliminated).
    pub eliminated: bool,
    /// Warning count (or provisional warning count).
    pub warnings: u32,
    /// Marked for removal by a pending deletion.
    pub removing: bool,
    /// Differs from the confirmed state because of a pending edit.
    pub provisional: bool,
}

/// One numbered seat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatLine {
    /// Seat number, 1-based.
    pub seat: SeatNo,
    /// `None` for an empty seat.
    pub occupant: Option<SeatOccupant>,
}

/// Which menu the roster carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterMode {
    /// Seats are open.
    Registration,
    /// Scenario chosen and seats full; roles are being drawn.
    RolePreview {
        /// Whether a preview was already delivered to the narrator.
        previewed: bool,
    },
    /// Roles committed; narrator controls.
    Controls,
    /// A pending edit is open; `toggles` are the seats that can be tapped.
    Editing {
        /// Hint naming the field being edited.
        prompt: String,
        /// Toggleable seats.
        toggles: Vec<SeatNo>,
    },
    /// No menu (winner pending or game over).
    Closed,
}

/// Everything the roster shows, detached from the session aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterSnapshot {
    /// Group title or id line.
    pub chat_label: String,
    /// Date the session was opened.
    pub date: NaiveDate,
    /// Free-text start time.
    pub event_time: Option<String>,
    /// Narrator display name, if a narrator is registered.
    pub narrator: Option<String>,
    /// Number of games finished in this chat.
    pub event_counter: u64,
    /// Scenario name and headcount.
    pub scenario: Option<(String, u32)>,
    /// Seats `1..=max`, in order.
    pub seats: Vec<SeatLine>,
    /// Menu mode.
    pub mode: RosterMode,
}

impl RosterSnapshot {
    fn is_full(&self) -> bool {
        self.seats.iter().all(|line| line.occupant.is_some())
    }

    fn empty_seats(&self) -> Vec<SeatNo> {
        self.seats
            .iter()
            .filter(|line| line.occupant.is_none())
            .map(|line| line.seat)
            .collect()
    }
}

/// Renders the roster. Identical snapshots render identical views.
#[must_use]
pub fn render_roster(snapshot: &RosterSnapshot) -> RenderedView {
    let mut text = String::new();
    let _ = writeln!(text, "🆔 {}", snapshot.chat_label);
    let _ = writeln!(text, "📅 {}", snapshot.date.format("%Y/%m/%d"));
    let _ = writeln!(
        text,
        "⏰ {}",
        snapshot.event_time.as_deref().unwrap_or("---")
    );
    let _ = writeln!(text, "#️⃣ Game {}", snapshot.event_counter + 1);
    if let Some((name, headcount)) = &snapshot.scenario {
        let _ = writeln!(text, "🎭 Scenario: {name} | 👥 {headcount}");
    }
    let _ = writeln!(
        text,
        "⚪️ Narrator: {}",
        snapshot.narrator.as_deref().unwrap_or("❓")
    );
    text.push('\n');

    for line in &snapshot.seats {
        let _ = writeln!(text, "{}", seat_line(line));
    }
    text.push('\n');
    text.push_str(&trailer(snapshot));

    RenderedView {
        text,
        menu: roster_menu(snapshot),
    }
}

fn seat_line(line: &SeatLine) -> String {
    let Some(occupant) = &line.occupant else {
        return format!("{}. ⬜", line.seat);
    };
    let mut out = format!("{}. {}", line.seat, occupant.name);
    if occupant.eliminated {
        out.push_str(" ☠️");
    }
    if occupant.warnings > 0 {
        out.push(' ');
        for _ in 0..occupant.warnings {
            out.push('⚠');
        }
    }
    if occupant.removing {
        out.push_str(" ❌");
    }
    if occupant.provisional {
        out.push_str(" ✏️");
    }
    out
}

fn trailer(snapshot: &RosterSnapshot) -> String {
    let filled = snapshot
        .seats
        .iter()
        .filter(|line| line.occupant.is_some())
        .count();
    match &snapshot.mode {
        RosterMode::Registration => format!(
            "👥 {filled}/{}\n📝 Reply to this list with a seat number or tap a seat to register.",
            snapshot.seats.len()
        ),
        RosterMode::RolePreview { previewed } => {
            if *previewed {
                "🎲 Preview sent to the narrator. Draw again or commit.".to_owned()
            } else {
                "🎲 Waiting for the narrator to draw roles.".to_owned()
            }
        }
        RosterMode::Controls | RosterMode::Closed => {
            let eliminated = snapshot
                .seats
                .iter()
                .filter(|line| line.occupant.as_ref().is_some_and(|o| o.eliminated))
                .count();
            format!("🟢 Alive: {} | ☠️ Out: {eliminated}", filled - eliminated)
        }
        RosterMode::Editing { prompt, .. } => {
            format!("✏️ {prompt}\n(provisional until confirmed)")
        }
    }
}

fn seat_rows(
    seats: &[SeatNo],
    label: impl Fn(SeatNo) -> String,
    id: impl Fn(SeatNo) -> String,
) -> Vec<Vec<Choice>> {
    seats
        .chunks(SEATS_PER_ROW)
        .map(|chunk| {
            chunk
                .iter()
                .map(|seat| Choice::new(label(*seat), id(*seat)))
                .collect()
        })
        .collect()
}

fn roster_menu(snapshot: &RosterSnapshot) -> Menu {
    let mut menu = Menu::empty();
    match &snapshot.mode {
        RosterMode::Registration => {
            menu.push_row(vec![
                Choice::new("✏️ Narrator", choice::NARRATOR_REGISTER),
                Choice::new("⏰ Time", choice::NARRATOR_TIME),
            ]);
            menu.push_row(vec![
                Choice::new("❌ Remove player", choice::EDIT_BEGIN_DELETION),
                Choice::new("🧹 Clean up below", choice::ROSTER_CLEANUP),
            ]);
            menu.push_row(vec![
                Choice::new("↩️ Leave", choice::SEAT_CANCEL),
                Choice::new("✏️ Rename", choice::SEAT_RENAME),
            ]);
            let empty = snapshot.empty_seats();
            for row in seat_rows(&empty, |s| format!("🪑 {s}"), choice::take_seat) {
                menu.push_row(row);
            }
            if snapshot.is_full() && snapshot.narrator.is_some() {
                menu.push_row(vec![
                    Choice::new("▶️ Start", choice::GAME_START),
                    Choice::new("🔊 Call players", choice::GAME_CALL),
                ]);
            }
        }
        RosterMode::RolePreview { previewed } => {
            menu.push_row(vec![Choice::new("🎲 Preview roles", choice::ROLES_PREVIEW)]);
            let commit_label = if *previewed {
                "✅ Commit preview"
            } else {
                "✅ Commit"
            };
            menu.push_row(vec![
                Choice::new(commit_label, choice::ROLES_COMMIT),
                Choice::new("🔀 Commit + shuffle seats", choice::ROLES_COMMIT_SHUFFLE),
            ]);
            menu.push_row(vec![
                Choice::new("❌ Remove player", choice::EDIT_BEGIN_DELETION),
                Choice::new("⬅️ Back", choice::PHASE_BACK),
            ]);
        }
        RosterMode::Controls => {
            menu.push_row(vec![
                Choice::new("✂️ Eliminate", choice::EDIT_BEGIN_ELIMINATION),
                Choice::new("⚠️ Warnings", choice::EDIT_BEGIN_WARNINGS),
            ]);
            menu.push_row(vec![
                Choice::new("🗳 Initial vote", choice::VOTE_START_INITIAL),
                Choice::new("🗳 Final vote", choice::VOTE_START_FINAL),
            ]);
            menu.push_row(vec![
                Choice::new("⏱ 30s", choice::timer(30)),
                Choice::new("⏱ 60s", choice::timer(60)),
            ]);
            menu.push_row(vec![Choice::new("🏁 End game", choice::GAME_END)]);
        }
        RosterMode::Editing { toggles, .. } => {
            for row in seat_rows(toggles, |s| s.to_string(), choice::toggle) {
                menu.push_row(row);
            }
            menu.push_row(vec![
                Choice::new("✅ Confirm", choice::EDIT_CONFIRM),
                Choice::new("🔙 Cancel", choice::EDIT_CANCEL),
            ]);
        }
        RosterMode::Closed => {}
    }
    menu
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occupant(id: i64, name: &str) -> Option<SeatOccupant> {
        Some(SeatOccupant {
            user_id: UserId(id),
            name: name.to_owned(),
            eliminated: false,
            warnings: 0,
            removing: false,
            provisional: false,
        })
    }

    fn snapshot(mode: RosterMode) -> RosterSnapshot {
        RosterSnapshot {
            chat_label: "Friday Night Mafia".to_owned(),
            date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            event_time: Some("21:30".to_owned()),
            narrator: Some("Sam".to_owned()),
            event_counter: 4,
            scenario: None,
            seats: vec![
                SeatLine { seat: 1, occupant: occupant(11, "Ana") },
                SeatLine { seat: 2, occupant: None },
                SeatLine { seat: 3, occupant: occupant(13, "Bo") },
            ],
            mode,
        }
    }

    #[test]
    fn test_render_header_and_seat_lines() {
        let view = render_roster(&snapshot(RosterMode::Registration));

        assert!(view.text.starts_with("🆔 Friday Night Mafia\n📅 2026/03/01\n⏰ 21:30\n#️⃣ Game 5\n"));
        assert!(view.text.contains("⚪️ Narrator: Sam"));
        assert!(view.text.contains("1. Ana\n2. ⬜\n3. Bo\n"));
        assert!(view.text.contains("👥 2/3"));
    }

    #[test]
    fn test_registration_menu_offers_only_empty_seats_until_full() {
        let view = render_roster(&snapshot(RosterMode::Registration));

        assert!(view.menu.find("seat:take:2").is_some());
        assert!(view.menu.find("seat:take:1").is_none());
        assert!(view.menu.find(choice::GAME_START).is_none());

        let mut full = snapshot(RosterMode::Registration);
        full.seats[1].occupant = occupant(12, "Cy");
        let view = render_roster(&full);

        assert!(view.menu.find(choice::GAME_START).is_some());
        assert!(view.menu.find(choice::GAME_CALL).is_some());
        assert!(view.menu.find(choice::ROSTER_CLEANUP).is_some());
    }

    #[test]
    fn test_controls_menu_offers_timers() {
        let view = render_roster(&snapshot(RosterMode::Controls));

        assert!(view.menu.find("game:timer:30").is_some());
        assert!(view.menu.find("game:timer:60").is_some());
        assert!(view.menu.find(choice::ROSTER_CLEANUP).is_none());
    }

    #[test]
    fn test_decorations_and_provisional_marker() {
        let mut snap = snapshot(RosterMode::Editing {
            prompt: "Tap seats to eliminate".to_owned(),
            toggles: vec![1, 3],
        });
        if let Some(o) = snap.seats[0].occupant.as_mut() {
            o.eliminated = true;
            o.provisional = true;
        }
        if let Some(o) = snap.seats[2].occupant.as_mut() {
            o.warnings = 2;
        }

        let view = render_roster(&snap);

        assert!(view.text.contains("1. Ana ☠️ ✏️"));
        assert!(view.text.contains("3. Bo ⚠⚠"));
        assert!(view.text.contains("(provisional until confirmed)"));
        assert!(view.menu.find("edit:toggle:3").is_some());
        assert!(view.menu.find(choice::EDIT_CONFIRM).is_some());
        assert!(view.menu.find(choice::EDIT_CANCEL).is_some());
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let snap = snapshot(RosterMode::Controls);

        assert_eq!(render_roster(&snap), render_roster(&snap.clone()));
    }

    #[test]
    fn test_closed_mode_has_no_menu() {
        let view = render_roster(&snapshot(RosterMode::Closed));

        assert!(view.menu.is_empty());
    }
}
