//! Faction classification of role labels.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Side a role plays for. Also used to declare the winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    /// Default side for any unclassified role.
    Town,
    /// The elimination faction.
    Mafia,
    /// Plays for itself.
    Independent,
}

impl Faction {
    /// Stable lowercase name, as used in choice ids and documents.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Town => "town",
            Self::Mafia => "mafia",
            Self::Independent => "independent",
        }
    }

    /// Parses the lowercase name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "town" => Some(Self::Town),
            "mafia" => Some(Self::Mafia),
            "independent" => Some(Self::Independent),
            _ => None,
        }
    }

    /// Marker shown next to a role in announcements.
    #[must_use]
    pub fn marker(self) -> &'static str {
        match self {
            Self::Town => "🟢",
            Self::Mafia => "🔴",
            Self::Independent => "🟡",
        }
    }
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role labels known to belong to the elimination or independent faction.
/// Everything else is town.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionTable {
    /// Labels of the elimination faction.
    #[serde(default)]
    pub elimination: BTreeSet<String>,
    /// Labels of the independent faction.
    #[serde(default)]
    pub independent: BTreeSet<String>,
}

impl FactionTable {
    /// Classifies a role label. Matching ignores surrounding whitespace.
    #[must_use]
    pub fn classify(&self, role: &str) -> Faction {
        let role = role.trim();
        if self.elimination.contains(role) {
            Faction::Mafia
        } else if self.independent.contains(role) {
            Faction::Independent
        } else {
            Faction::Town
        }
    }
}
