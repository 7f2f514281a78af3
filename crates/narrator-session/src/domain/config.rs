//! Game knobs.

use std::time::Duration;

/// Tunables shared by every session in the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    /// Length of one ballot window.
    pub ballot_window: Duration,
    /// Permutation passes per shuffle (at least one is always made).
    pub shuffle_repeats: u32,
    /// Warning counts cycle through `0..=max_warnings`.
    pub max_warnings: u32,
    /// Longest accepted display name, in characters.
    pub name_max_chars: usize,
    /// Largest roster a session can open with.
    pub max_seats: u32,
    /// Longest countdown the narrator can start.
    pub max_timer: Duration,
    /// How many message ids after the roster a cleanup sweeps.
    pub cleanup_span: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            ballot_window: Duration::from_secs(5),
            shuffle_repeats: 1,
            max_warnings: 3,
            name_max_chars: 32,
            max_seats: 30,
            max_timer: Duration::from_secs(600),
            cleanup_span: 99,
        }
    }
}
