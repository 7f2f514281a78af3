//! Display name validation.

use narrator_core::error::DomainError;

/// Normalizes and validates a display name: letters and single spaces only,
/// at most `max_chars` characters.
///
/// # Errors
///
/// Returns `DomainError::Validation` for empty, overlong or non-alphabetic
/// names.
pub fn validate_name(raw: &str, max_chars: usize) -> Result<String, DomainError> {
    let name = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if name.is_empty() {
        return Err(DomainError::Validation("name must not be empty".to_owned()));
    }
    if name.chars().count() > max_chars {
        return Err(DomainError::Validation(format!(
            "name must be at most {max_chars} characters"
        )));
    }
    if !name.chars().all(|c| c.is_alphabetic() || c == ' ') {
        return Err(DomainError::Validation(
            "name may only contain letters and spaces".to_owned(),
        ));
    }
    Ok(name)
}
