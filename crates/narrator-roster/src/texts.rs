//! Plain-text messages: announcements, role summaries, calls.

use std::fmt::Write as _;

use chrono::NaiveDate;
use narrator_core::ids::SeatNo;
use narrator_roles::Faction;

/// One row of a role table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRow {
    /// Seat number.
    pub seat: SeatNo,
    /// Occupant display name.
    pub name: String,
    /// Role label.
    pub role: String,
    /// Faction of the role.
    pub faction: Faction,
}

/// Final result of a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    /// Group title or id line.
    pub chat_label: String,
    /// Session date.
    pub date: NaiveDate,
    /// Narrator display name.
    pub narrator: Option<String>,
    /// Scenario name.
    pub scenario: Option<String>,
    /// Every seat with its role.
    pub rows: Vec<RoleRow>,
    /// Winning faction.
    pub winner: Faction,
    /// Seat whose role was purchased.
    pub purchased: Option<SeatNo>,
    /// Seats picked by chaos.
    pub chaos: Vec<SeatNo>,
    /// Clean sweep flag.
    pub clean_sweep: bool,
    /// Counter value after this game.
    pub event_counter: u64,
}

/// Renders the end-of-game announcement.
#[must_use]
pub fn announcement(a: &Announcement) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "🎮 {}", a.chat_label);
    let _ = writeln!(text, "📅 {}", a.date.format("%Y/%m/%d"));
    let _ = writeln!(text, "🧠 Narrator: {}", a.narrator.as_deref().unwrap_or("—"));
    let _ = writeln!(text, "🧩 Scenario: {}", a.scenario.as_deref().unwrap_or("—"));
    let _ = writeln!(text, "#️⃣ Game {}", a.event_counter);
    text.push_str("\n♣️ Players ♣️\n\n");
    for row in &a.rows {
        let mut line = format!(
            "{}{}. {} ⇦ {}",
            row.faction.marker(),
            row.seat,
            row.name,
            row.role
        );
        if a.purchased == Some(row.seat) {
            line.push_str(" 💰");
        }
        if a.chaos.contains(&row.seat) {
            line.push_str(" 🌀");
        }
        let _ = writeln!(text, "{line}");
    }
    text.push('\n');
    let _ = write!(text, "🏆 Winner: {} {}", a.winner.marker(), a.winner);
    if a.clean_sweep {
        text.push_str(" (clean sweep)");
    }
    text
}

/// Summary delivered privately to the narrator after a commit.
#[must_use]
pub fn role_summary(rows: &[RoleRow], unreachable: &[String]) -> String {
    let mut text = String::from("👑 Roles:\n");
    for row in rows {
        let _ = writeln!(text, "{}. {} → {}", row.seat, row.name, row.role);
    }
    if !unreachable.is_empty() {
        let _ = write!(
            text,
            "\n⚠️ Could not reach privately: {}",
            unreachable.join(", ")
        );
    }
    text.trim_end().to_owned()
}

/// Preview delivered privately to the narrator. Seat numbers are shown but
/// nothing is committed yet.
#[must_use]
pub fn preview_summary(rows: &[RoleRow]) -> String {
    let mut text = String::from("🎲 Preview (not committed):\n");
    for row in rows {
        let _ = writeln!(text, "{}. {} → {}", row.seat, row.name, row.role);
    }
    text.trim_end().to_owned()
}

/// A player's private role message.
#[must_use]
pub fn role_delivery(role: &str, media: Option<&str>) -> String {
    match media {
        Some(media) => format!("🎭 Your role: {role}\n{media}"),
        None => format!("🎭 Your role: {role}"),
    }
}

/// Calls every seated player, optionally prefixed with a flavor line.
#[must_use]
pub fn call_players(flavor: Option<&str>, names: &[(SeatNo, String)]) -> String {
    let mut text = String::new();
    if let Some(flavor) = flavor {
        let _ = writeln!(text, "{flavor}\n");
    }
    text.push_str("🔊 Game is about to start:\n");
    for (seat, name) in names {
        let _ = write!(text, "\n{seat}. {name}");
    }
    text
}

/// Notice posted when a ballot window opens.
#[must_use]
pub fn window_opened(seat: SeatNo, name: &str, secs: u64) -> String {
    format!("⏳ Voting on {seat}. {name} is open for {secs} seconds. Reply to vote.")
}

/// Notice posted when a ballot window closes.
#[must_use]
pub fn window_closed(seat: SeatNo, name: &str, ballots: usize) -> String {
    format!("🛑 Voting on {seat}. {name} closed with {ballots} vote(s).")
}

/// Notice posted when the narrator starts a countdown.
#[must_use]
pub fn timer_started(secs: u32) -> String {
    format!("⏳ {secs}-second timer started.")
}

/// Notice posted when a countdown runs out.
pub const TIMER_DONE: &str = "⏰ Time's up!";

/// Notice posted after clearing the messages below the roster.
#[must_use]
pub fn cleanup_done(deleted: usize) -> String {
    format!("🧹 Removed {deleted} message(s) below the roster.")
}
