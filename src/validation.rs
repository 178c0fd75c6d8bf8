// Validation utilities module
// Provides custom validation functions for booking and content requests

use validator::ValidationError;

/// Validates that a text field has visible characters
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("must_not_be_blank"))
    } else {
        Ok(())
    }
}

/// Validates a language code such as "en", "ko" or "zh-TW"
pub fn validate_language_code(code: &str) -> Result<(), ValidationError> {
    let mut parts = code.split('-');
    let primary_ok = parts
        .next()
        .is_some_and(|primary| (2..=3).contains(&primary.len()) && primary.chars().all(|c| c.is_ascii_alphabetic()));
    let region_ok = parts.all(|part| (2..=8).contains(&part.len()) && part.chars().all(|c| c.is_ascii_alphanumeric()));

    if primary_ok && region_ok {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_language_code"))
    }
}
