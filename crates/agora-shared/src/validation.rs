//! Field-level validation and normalization.
//!
//! Every check returns a [`ValidationError`] describing the first field that
//! failed; callers surface it unchanged as `DomainError::InvalidInput`.

use url::Url;
use validator::ValidateEmail;

use crate::constants::{
    MAX_MESSAGE_LEN, MAX_TOKENS_MAX, MAX_TOKENS_MIN, PASSWORD_MIN_LEN, RESERVED_ROOM_NAMES,
    RESERVED_USERNAME, ROOM_NAME_CREATE_MIN_LEN, ROOM_NAME_MAX_LEN, ROOM_NAME_RENAME_MIN_LEN,
    TEMPERATURE_MAX, TEMPERATURE_MIN, USERNAME_MAX_LEN, USERNAME_MIN_LEN,
};
use crate::error::ValidationError;

/// Usernames are `[a-z0-9_]{3,16}` and never `ai`.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let well_formed = !username.is_empty()
        && username
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
    if !well_formed {
        return Err(ValidationError::InvalidUsername);
    }
    if username == RESERVED_USERNAME {
        return Err(ValidationError::ReservedUsername);
    }
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&username.len()) {
        return Err(ValidationError::InvalidUsername);
    }
    Ok(())
}

/// Validate an email address and return its normalized form.
///
/// Syntax is checked by [`ValidateEmail`], which also accepts internationalized
/// domains. Local parts may also carry non-ASCII letters. The domain needs at
/// least one dot. Normalization trims surrounding
/// whitespace and lowercases the domain; the local part is kept as typed.
pub fn normalize_email(email: &str) -> Result<String, ValidationError> {
    let email = email.trim();
    let (local, domain) = email.rsplit_once('@').ok_or(ValidationError::InvalidEmail)?;

    // non-ASCII letters stand in for an ASCII letter of the same width
    let local_ascii: String = local
        .chars()
        .map(|c| if !c.is_ascii() && c.is_alphabetic() { 'a' } else { c })
        .collect();
    if !format!("{local_ascii}@{domain}").validate_email() {
        return Err(ValidationError::InvalidEmail);
    }

    let dot_atom = !local.starts_with('.') && !local.ends_with('.') && !local.contains("..");
    let dotted_domain = domain.split('.').filter(|l| !l.is_empty()).count() >= 2;
    if !dot_atom || !dotted_domain {
        return Err(ValidationError::InvalidEmail);
    }

    Ok(format!("{local}@{}", domain.to_lowercase()))
}

/// Password policy: at least 6 characters, one digit and one special character.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let long_enough = password.chars().count() >= PASSWORD_MIN_LEN;
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace());
    if long_enough && has_digit && has_special {
        Ok(())
    } else {
        Err(ValidationError::WeakPassword)
    }
}

/// Name check for rooms created by users (4-16 chars, reserved names refused).
pub fn validate_new_room_name(name: &str) -> Result<(), ValidationError> {
    let len = name.chars().count();
    if !(ROOM_NAME_CREATE_MIN_LEN..=ROOM_NAME_MAX_LEN).contains(&len) {
        return Err(ValidationError::RoomNameLength {
            min: ROOM_NAME_CREATE_MIN_LEN,
            max: ROOM_NAME_MAX_LEN,
        });
    }
    if RESERVED_ROOM_NAMES.contains(&name) {
        return Err(ValidationError::ReservedRoomName);
    }
    Ok(())
}

/// Name check on rename (3-16 chars). The minimum intentionally differs from
/// creation.
pub fn validate_room_rename(name: &str) -> Result<(), ValidationError> {
    let len = name.chars().count();
    if !(ROOM_NAME_RENAME_MIN_LEN..=ROOM_NAME_MAX_LEN).contains(&len) {
        return Err(ValidationError::RoomNameLength {
            min: ROOM_NAME_RENAME_MIN_LEN,
            max: ROOM_NAME_MAX_LEN,
        });
    }
    Ok(())
}

/// Pictures must be absolute `http`/`https` URLs with a host.
pub fn validate_picture_url(url: &str) -> Result<(), ValidationError> {
    let parsed = Url::parse(url).map_err(|_| ValidationError::InvalidUrl)?;
    let scheme_ok = matches!(parsed.scheme(), "http" | "https");
    let host_ok = parsed.host_str().is_some_and(|h| !h.is_empty());
    if scheme_ok && host_ok {
        Ok(())
    } else {
        Err(ValidationError::InvalidUrl)
    }
}

/// Explicitly supplied join codes: 4-16 ASCII letters or digits.
pub fn validate_join_code(code: &str) -> Result<(), ValidationError> {
    let ok = (4..=16).contains(&code.len()) && code.bytes().all(|b| b.is_ascii_alphanumeric());
    if ok {
        Ok(())
    } else {
        Err(ValidationError::InvalidJoinCode)
    }
}

pub fn validate_message_text(text: &str) -> Result<(), ValidationError> {
    let len = text.chars().count();
    if text.trim().is_empty() || len > MAX_MESSAGE_LEN {
        return Err(ValidationError::MessageLength {
            max: MAX_MESSAGE_LEN,
        });
    }
    Ok(())
}

pub fn validate_temperature(temperature: f64) -> Result<(), ValidationError> {
    if temperature.is_finite() && (TEMPERATURE_MIN..=TEMPERATURE_MAX).contains(&temperature) {
        Ok(())
    } else {
        Err(ValidationError::TemperatureOutOfRange(temperature))
    }
}

pub fn validate_max_tokens(max_tokens: u32) -> Result<(), ValidationError> {
    if (MAX_TOKENS_MIN..=MAX_TOKENS_MAX).contains(&max_tokens) {
        Ok(())
    } else {
        Err(ValidationError::MaxTokensOutOfRange(max_tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_rules() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("bob_42").is_ok());
        assert!(validate_username("abc").is_ok());
        assert!(validate_username("a234567890123456").is_ok());

        assert_eq!(validate_username("ab"), Err(ValidationError::InvalidUsername));
        assert_eq!(
            validate_username("a2345678901234567"),
            Err(ValidationError::InvalidUsername)
        );
        assert_eq!(validate_username("Alice"), Err(ValidationError::InvalidUsername));
        assert_eq!(validate_username("al ice"), Err(ValidationError::InvalidUsername));
        assert_eq!(validate_username("ai"), Err(ValidationError::ReservedUsername));
    }

    #[test]
    fn test_email_normalization() {
        assert_eq!(
            normalize_email("  Alice@Example.COM ").unwrap(),
            "Alice@example.com"
        );
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("alice@localhost").is_err());
        assert!(normalize_email("alice@exa mple.com").is_err());
        assert!(normalize_email("al..ice@example.com").is_err());
        assert!(normalize_email(".alice@example.com").is_err());
    }

    #[test]
    fn test_internationalized_emails() {
        assert_eq!(
            normalize_email("user@example.xn--p1ai").unwrap(),
            "user@example.xn--p1ai"
        );
        assert_eq!(normalize_email("josé@example.com").unwrap(), "josé@example.com");
        assert_eq!(normalize_email("user@München.de").unwrap(), "user@münchen.de");
        assert!(normalize_email("jo sé@example.com").is_err());
    }

    #[test]
    fn test_join_code_rules() {
        assert!(validate_join_code("Ab3dEf9h").is_ok());
        assert_eq!(validate_join_code("abc"), Err(ValidationError::InvalidJoinCode));
        assert_eq!(validate_join_code("abc-1234"), Err(ValidationError::InvalidJoinCode));
    }

    #[test]
    fn test_password_policy() {
        assert!(validate_password("secret1!").is_ok());
        assert_eq!(validate_password("s1!"), Err(ValidationError::WeakPassword));
        assert_eq!(validate_password("secret!!"), Err(ValidationError::WeakPassword));
        assert_eq!(validate_password("secret11"), Err(ValidationError::WeakPassword));
    }

    #[test]
    fn test_room_name_asymmetry() {
        // three characters: fine on rename, too short on creation
        assert!(validate_room_rename("abc").is_ok());
        assert!(validate_new_room_name("abc").is_err());

        assert!(validate_new_room_name("abcd").is_ok());
        assert!(validate_new_room_name("a234567890123456").is_ok());
        assert!(validate_new_room_name("a2345678901234567").is_err());
        assert!(validate_room_rename("a2345678901234567").is_err());
        assert!(validate_room_rename("ab").is_err());
    }

    #[test]
    fn test_reserved_room_names() {
        assert_eq!(
            validate_new_room_name("AI Room"),
            Err(ValidationError::ReservedRoomName)
        );
        // "AI" fails the length check first
        assert!(validate_new_room_name("AI").is_err());
    }

    #[test]
    fn test_picture_urls() {
        assert!(validate_picture_url("https://example.com/a.png").is_ok());
        assert!(validate_picture_url("http://cdn.example.org/x?y=1").is_ok());
        assert!(validate_picture_url("ftp://example.com/a.png").is_err());
        assert!(validate_picture_url("not a url").is_err());
        assert!(validate_picture_url("https://").is_err());
    }

    #[test]
    fn test_ai_parameter_ranges() {
        assert!(validate_temperature(0.0).is_ok());
        assert!(validate_temperature(0.7).is_ok());
        assert!(validate_temperature(1.5).is_ok());
        assert!(validate_temperature(2.0).is_err());
        assert!(validate_temperature(-0.1).is_err());
        assert!(validate_temperature(f64::NAN).is_err());

        assert!(validate_max_tokens(128).is_ok());
        assert!(validate_max_tokens(4096).is_ok());
        assert!(validate_max_tokens(127).is_err());
        assert!(validate_max_tokens(4097).is_err());
    }

    #[test]
    fn test_message_text() {
        assert!(validate_message_text("hello").is_ok());
        assert!(validate_message_text("   ").is_err());
        assert!(validate_message_text(&"x".repeat(MAX_MESSAGE_LEN + 1)).is_err());
    }
}
