//! Choice identifiers carried by menu entries.
//!
//! Identifiers are short colon-separated tokens. The session router parses
//! them back into actions; this module is the single place that spells them.

use narrator_core::ids::SeatNo;
use narrator_roles::Faction;

pub const NARRATOR_REGISTER: &str = "narrator:register";
pub const NARRATOR_TIME: &str = "narrator:time";
pub const SEAT_CANCEL: &str = "seat:cancel";
pub const SEAT_RENAME: &str = "seat:rename";
pub const EDIT_BEGIN_ELIMINATION: &str = "edit:begin:elimination";
pub const EDIT_BEGIN_DELETION: &str = "edit:begin:deletion";
pub const EDIT_BEGIN_WARNINGS: &str = "edit:begin:warnings";
pub const EDIT_CONFIRM: &str = "edit:confirm";
pub const EDIT_CANCEL: &str = "edit:cancel";
pub const GAME_START: &str = "game:start";
pub const GAME_CALL: &str = "game:call";
pub const GAME_END: &str = "game:end";
pub const ROLES_PREVIEW: &str = "roles:preview";
pub const ROLES_COMMIT: &str = "roles:commit";
pub const ROLES_COMMIT_SHUFFLE: &str = "roles:commit_shuffle";
pub const PHASE_BACK: &str = "phase:back";
pub const VOTE_START_INITIAL: &str = "vote:start:initial";
pub const VOTE_START_FINAL: &str = "vote:start:final";
pub const VOTE_FINISH: &str = "vote:finish";
pub const VOTE_BACK: &str = "vote:back";
pub const ENDGAME_SWEEP: &str = "endgame:sweep";
pub const ROSTER_CLEANUP: &str = "roster:cleanup";

#[must_use]
pub fn take_seat(seat: SeatNo) -> String {
    format!("seat:take:{seat}")
}

#[must_use]
pub fn toggle(seat: SeatNo) -> String {
    format!("edit:toggle:{seat}")
}

#[must_use]
pub fn pick_scenario(name: &str) -> String {
    format!("scenario:pick:{name}")
}

#[must_use]
pub fn open_ballot(seat: SeatNo) -> String {
    format!("vote:open:{seat}")
}

#[must_use]
pub fn purchase(seat: SeatNo) -> String {
    format!("endgame:purchase:{seat}")
}

#[must_use]
pub fn chaos(seat: SeatNo) -> String {
    format!("endgame:chaos:{seat}")
}

#[must_use]
pub fn timer(secs: u32) -> String {
    format!("game:timer:{secs}")
}

#[must_use]
pub fn winner(faction: Faction) -> String {
    format!("game:winner:{}", faction.as_str())
}
