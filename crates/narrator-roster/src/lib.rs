//! Narrator — Roster Renderer.
//!
//! Rendering is pure: a snapshot of session data goes in, text plus a choice
//! menu comes out. Reconciliation pushes a rendered view to the one live
//! message of a chat, healing stale references by sending a fresh view.

pub mod choice;
pub mod menus;
pub mod reconcile;
pub mod texts;
pub mod view;

pub use reconcile::{RoleListView, reconcile_role_list, reconcile_view, with_throttle_retry};
pub use view::{RenderedView, RosterMode, RosterSnapshot, SeatLine, SeatOccupant, render_roster};
