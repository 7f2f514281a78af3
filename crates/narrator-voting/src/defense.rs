//! Defense seat entry for the final vote.

use std::collections::BTreeSet;

use narrator_core::error::DomainError;
use narrator_core::ids::SeatNo;

/// Parses the narrator's defense list ("1 3 5", "1,3,5").
///
/// Order is preserved, repeats are dropped, and seats for which `eligible`
/// returns `false` are filtered out.
///
/// # Errors
///
/// Returns `DomainError::Validation` if no eligible seat remains.
pub fn parse_defense_seats(
    text: &str,
    eligible: impl Fn(SeatNo) -> bool,
) -> Result<Vec<SeatNo>, DomainError> {
    let mut seen = BTreeSet::new();
    let seats: Vec<SeatNo> = text
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter_map(|token| token.parse::<SeatNo>().ok())
        .filter(|seat| eligible(*seat) && seen.insert(*seat))
        .collect();

    if seats.is_empty() {
        return Err(DomainError::Validation(
            "no eligible defense seats given".to_owned(),
        ));
    }
    Ok(seats)
}
