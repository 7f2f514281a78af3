//! Identity → role assignment.

use std::collections::{BTreeMap, BTreeSet};

use narrator_core::error::DomainError;
use narrator_core::ids::{SeatNo, UserId};
use narrator_core::rng::DeterministicRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::scenario::Scenario;
use crate::shuffle::permute;

/// An identity→role bijection, independent of seat numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    roles: BTreeMap<UserId, String>,
}

impl Assignment {
    /// The role assigned to `user_id`, if any.
    #[must_use]
    pub fn role_of(&self, user_id: UserId) -> Option<&str> {
        self.roles.get(&user_id).map(String::as_str)
    }

    /// Number of assigned identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Whether nobody is assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Iterates `(identity, role)` pairs in identity order.
    pub fn iter(&self) -> impl Iterator<Item = (UserId, &str)> {
        self.roles.iter().map(|(user, role)| (*user, role.as_str()))
    }

    /// Counts how many identities hold each label.
    #[must_use]
    pub fn label_counts(&self) -> BTreeMap<String, u32> {
        let mut counts = BTreeMap::new();
        for role in self.roles.values() {
            *counts.entry(role.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Whether this assignment uses every label of `scenario` exactly its
    /// multiset count.
    #[must_use]
    pub fn matches(&self, scenario: &Scenario) -> bool {
        self.label_counts() == scenario.roles
    }
}

/// Draws an identity→role bijection for `players` from `scenario`.
///
/// The flattened role list and the identity list are permuted independently
/// (`repeats` times each) and zipped positionally.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the player count differs from the
/// scenario headcount or an identity appears twice.
pub fn assign(
    players: &[UserId],
    scenario: &Scenario,
    repeats: u32,
    rng: &mut dyn DeterministicRng,
) -> Result<Assignment, DomainError> {
    let distinct: BTreeSet<UserId> = players.iter().copied().collect();
    if distinct.len() != players.len() {
        return Err(DomainError::Validation(
            "an identity occupies more than one seat".to_owned(),
        ));
    }
    if !scenario.fits(u32::try_from(players.len()).unwrap_or(u32::MAX)) {
        return Err(DomainError::Validation(format!(
            "scenario {} needs {} players, roster has {}",
            scenario.name,
            scenario.headcount(),
            players.len()
        )));
    }

    let mut labels = scenario.flatten();
    let mut identities = players.to_vec();
    permute(&mut labels, repeats, rng);
    permute(&mut identities, repeats, rng);

    let roles: BTreeMap<UserId, String> = identities.into_iter().zip(labels).collect();
    debug!(scenario = %scenario.name, players = roles.len(), "drew role assignment");
    Ok(Assignment { roles })
}

/// Derives the seat→role map by looking up each seat's occupant.
///
/// # Errors
///
/// Returns `DomainError::Validation` if an occupant has no role in
/// `assignment` (the roster changed since the assignment was drawn).
pub fn seat_roles(
    occupants: impl IntoIterator<Item = (SeatNo, UserId)>,
    assignment: &Assignment,
) -> Result<BTreeMap<SeatNo, String>, DomainError> {
    occupants
        .into_iter()
        .map(|(seat, user)| {
            assignment
                .role_of(user)
                .map(|role| (seat, role.to_owned()))
                .ok_or_else(|| {
                    DomainError::Validation(format!(
                        "occupant of seat {seat} has no drawn role; draw again"
                    ))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use narrator_core::rng::SystemRng;
    use narrator_test_support::MockRng;

    fn five_role_scenario() -> Scenario {
        Scenario::new(
            "five",
            [("citizen", 2), ("mafia", 1), ("doctor", 1), ("detective", 1)],
        )
        .unwrap()
    }

    fn players(n: i64) -> Vec<UserId> {
        (1..=n).map(|i| UserId(100 + i)).collect()
    }

    #[test]
    fn test_assign_is_a_bijection_over_many_draws() {
        let scenario = five_role_scenario();
        let roster = players(5);

        for seed in 0..200 {
            let mut rng = SystemRng::seeded(seed);
            let assignment = assign(&roster, &scenario, 1 + (seed as u32 % 3), &mut rng).unwrap();

            assert_eq!(assignment.len(), 5);
            assert!(assignment.matches(&scenario), "seed {seed} broke the multiset");
            for user in &roster {
                assert!(assignment.role_of(*user).is_some());
            }
        }
    }

    #[test]
    fn test_assign_rejects_headcount_mismatch() {
        let result = assign(&players(4), &five_role_scenario(), 1, &mut MockRng);

        match result.unwrap_err() {
            DomainError::Validation(msg) => assert!(msg.contains("needs 5 players")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_assign_rejects_duplicate_identity() {
        let mut roster = players(4);
        roster.push(roster[0]);

        assert!(assign(&roster, &five_role_scenario(), 1, &mut MockRng).is_err());
    }

    #[test]
    fn test_seat_roles_follows_occupants_not_seat_numbers() {
        let scenario = Scenario::new("pair", [("mafia", 1), ("citizen", 1)]).unwrap();
        let roster = vec![UserId(1), UserId(2)];
        let assignment = assign(&roster, &scenario, 1, &mut MockRng).unwrap();

        let forward = seat_roles([(1, UserId(1)), (2, UserId(2))], &assignment).unwrap();
        let swapped = seat_roles([(1, UserId(2)), (2, UserId(1))], &assignment).unwrap();

        assert_eq!(forward[&1], swapped[&2]);
        assert_eq!(forward[&2], swapped[&1]);
    }

    #[test]
    fn test_seat_roles_rejects_unknown_occupant() {
        let scenario = Scenario::new("pair", [("mafia", 1), ("citizen", 1)]).unwrap();
        let assignment = assign(&[UserId(1), UserId(2)], &scenario, 1, &mut MockRng).unwrap();

        assert!(seat_roles([(1, UserId(1)), (2, UserId(9))], &assignment).is_err());
    }
}
