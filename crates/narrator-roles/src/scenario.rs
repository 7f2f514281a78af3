//! Scenarios: named role multisets.

use std::collections::BTreeMap;

use narrator_core::error::DomainError;
use serde::{Deserialize, Serialize};

/// A named, fixed-size multiset of role labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name, unique within the catalogue.
    pub name: String,
    /// Role label → number of seats holding that role.
    pub roles: BTreeMap<String, u32>,
}

impl Scenario {
    /// Creates a validated scenario.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the name or a label is blank, a
    /// count is zero, the multiset is empty, or the headcount overflows.
    pub fn new<I, L>(name: impl Into<String>, roles: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = (L, u32)>,
        L: Into<String>,
    {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(DomainError::Validation(
                "scenario name must not be blank".to_owned(),
            ));
        }

        let mut multiset = BTreeMap::new();
        let mut headcount: u32 = 0;
        for (label, count) in roles {
            let label = label.into().trim().to_owned();
            if label.is_empty() {
                return Err(DomainError::Validation(format!(
                    "scenario {name} has a blank role label"
                )));
            }
            if count == 0 {
                return Err(DomainError::Validation(format!(
                    "role {label} in scenario {name} must have a positive count"
                )));
            }
            headcount = headcount.checked_add(count).ok_or_else(|| {
                DomainError::Validation(format!("scenario {name} has too many seats"))
            })?;
            *multiset.entry(label).or_insert(0) += count;
        }

        if multiset.is_empty() {
            return Err(DomainError::Validation(format!(
                "scenario {name} has no roles"
            )));
        }

        Ok(Self {
            name,
            roles: multiset,
        })
    }

    /// Total number of seats this scenario fills. Saturates for stored
    /// scenarios that never went through [`Scenario::new`].
    #[must_use]
    pub fn headcount(&self) -> u32 {
        self.roles
            .values()
            .fold(0u32, |total, count| total.saturating_add(*count))
    }

    /// Whether the scenario fits a session with `seats` seats.
    #[must_use]
    pub fn fits(&self, seats: u32) -> bool {
        self.headcount() == seats
    }

    /// Flattens the multiset into a label list in label order.
    #[must_use]
    pub fn flatten(&self) -> Vec<String> {
        self.roles
            .iter()
            .flat_map(|(label, count)| std::iter::repeat_n(label.clone(), *count as usize))
            .collect()
    }
}
