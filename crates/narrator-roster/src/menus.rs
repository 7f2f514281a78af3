//! Secondary views: vote menu, endgame menu, scenario picker, role list.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use narrator_core::ids::SeatNo;
use narrator_core::transport::{Choice, Menu};
use narrator_roles::{Faction, Scenario};

use crate::choice;
use crate::view::RenderedView;

/// A vote candidate as shown in the running vote menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteCandidate {
    /// Candidate seat.
    pub seat: SeatNo,
    /// Occupant display name.
    pub name: String,
    /// Window already expired for this seat.
    pub finalized: bool,
    /// Ballots recorded so far.
    pub ballots: usize,
}

/// Renders the running vote menu. Processed candidates keep their entry but
/// carry a marker and their advisory ballot count.
#[must_use]
pub fn vote_menu(final_stage: bool, candidates: &[VoteCandidate]) -> RenderedView {
    let title = if final_stage {
        "🗳 Final vote: pick a defendant"
    } else {
        "🗳 Initial vote: pick a target"
    };
    let mut menu = Menu::empty();
    for candidate in candidates {
        let label = if candidate.finalized {
            format!(
                "✔️ {}. {} ({})",
                candidate.seat, candidate.name, candidate.ballots
            )
        } else {
            format!("{}. {}", candidate.seat, candidate.name)
        };
        menu.push_row(vec![Choice::new(label, choice::open_ballot(candidate.seat))]);
    }
    menu.push_row(vec![
        Choice::new("✅ Finish", choice::VOTE_FINISH),
        Choice::new("⬅️ Back", choice::VOTE_BACK),
    ]);
    RenderedView {
        text: title.to_owned(),
        menu,
    }
}

/// Endgame modifiers and the seats they can target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndgameMenu {
    /// Occupied seats.
    pub seats: Vec<SeatNo>,
    /// Seat whose role was purchased.
    pub purchased: Option<SeatNo>,
    /// Seats picked by chaos.
    pub chaos: BTreeSet<SeatNo>,
    /// Clean sweep flag.
    pub clean_sweep: bool,
}

/// Renders the winner picker with its modifier toggles.
#[must_use]
pub fn endgame_menu(draft: &EndgameMenu) -> RenderedView {
    let mut menu = Menu::empty();
    menu.push_row(
        [Faction::Town, Faction::Mafia, Faction::Independent]
            .into_iter()
            .map(|f| Choice::new(format!("🏆 {} {f}", f.marker()), choice::winner(f)))
            .collect(),
    );
    let sweep = if draft.clean_sweep { "✅" } else { "⬜" };
    menu.push_row(vec![Choice::new(
        format!("{sweep} Clean sweep"),
        choice::ENDGAME_SWEEP,
    )]);
    for chunk in draft.seats.chunks(5) {
        menu.push_row(
            chunk
                .iter()
                .map(|seat| {
                    let mark = if draft.purchased == Some(*seat) { "✅" } else { "💰" };
                    Choice::new(format!("{mark} {seat}"), choice::purchase(*seat))
                })
                .collect(),
        );
    }
    for chunk in draft.seats.chunks(5) {
        menu.push_row(
            chunk
                .iter()
                .map(|seat| {
                    let mark = if draft.chaos.contains(seat) { "✅" } else { "🌀" };
                    Choice::new(format!("{mark} {seat}"), choice::chaos(*seat))
                })
                .collect(),
        );
    }
    menu.push_row(vec![Choice::new("⬅️ Back", choice::PHASE_BACK)]);
    RenderedView {
        text: "🏁 Game over. Set 💰 purchased / 🌀 chaos seats, then pick the winner.".to_owned(),
        menu,
    }
}

/// Renders the scenario picker for a roster of `seats`.
#[must_use]
pub fn scenario_menu(seats: u32, scenarios: &[Scenario]) -> RenderedView {
    let mut menu = Menu::empty();
    for scenario in scenarios.iter().filter(|s| s.fits(seats)) {
        menu.push_row(vec![Choice::new(
            format!("🎭 {}", scenario.name),
            choice::pick_scenario(&scenario.name),
        )]);
    }
    let text = if menu.is_empty() {
        format!("No scenario fits {seats} players. Add one first.")
    } else {
        format!("Pick a scenario for {seats} players:")
    };
    RenderedView { text, menu }
}

/// Renders the role list shown next to the roster.
#[must_use]
pub fn role_list(scenario: &Scenario) -> RenderedView {
    let mut text = format!("🎭 {} | 👥 {}\n", scenario.name, scenario.headcount());
    for (label, count) in &scenario.roles {
        let _ = write!(text, "\n• {label}");
        if *count > 1 {
            let _ = write!(text, " ×{count}");
        }
    }
    RenderedView {
        text,
        menu: Menu::empty(),
    }
}
