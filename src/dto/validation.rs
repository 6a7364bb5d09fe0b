//! Validation helpers for DTOs.

use std::borrow::Cow;

use validator::ValidationError;

/// Nickname bounds, measured on the trimmed value.
pub const NICKNAME_LENGTH: (usize, usize) = (3, 20);
/// Lobby name bounds, measured on the trimmed value.
pub const LOBBY_NAME_LENGTH: (usize, usize) = (3, 32);
/// Topic bounds, measured on the trimmed value.
pub const TOPIC_LENGTH: (usize, usize) = (2, 100);

fn trimmed_length(
    value: &str,
    (min, max): (usize, usize),
    code: &'static str,
    label: &str,
) -> Result<(), ValidationError> {
    let length = value.trim().chars().count();
    if (min..=max).contains(&length) {
        return Ok(());
    }

    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Owned(format!(
        "{label} must be between {min} and {max} characters"
    )));
    Err(err)
}

/// Validates that a nickname is 3 to 20 characters once trimmed.
///
/// # Examples
///
/// ```ignore
/// validate_nickname("alice") // Ok
/// validate_nickname("  al ") // Err - too short once trimmed
/// ```
pub fn validate_nickname(nickname: &str) -> Result<(), ValidationError> {
    trimmed_length(nickname, NICKNAME_LENGTH, "nickname_length", "Nickname")
}

/// Validates that a lobby name is 3 to 32 characters once trimmed.
pub fn validate_lobby_name(name: &str) -> Result<(), ValidationError> {
    trimmed_length(name, LOBBY_NAME_LENGTH, "lobby_name_length", "Lobby name")
}

/// Validates that a topic is 2 to 100 characters once trimmed.
pub fn validate_topic(topic: &str) -> Result<(), ValidationError> {
    trimmed_length(topic, TOPIC_LENGTH, "topic_length", "Topic")
}
