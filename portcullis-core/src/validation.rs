use crate::error::ValidationError;
use regex::Regex;
use std::sync::LazyLock;

/// Lazy-loaded email validation regex
///
/// A practical subset of RFC 5322. Identities are validated after normalization,
/// so only lowercase input reaches this pattern in practice.
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("Invalid email regex pattern")
});

/// Validates an email address used as a login identity
///
/// # Examples
///
/// ```rust
/// use portcullis_core::validation::validate_email;
///
/// assert!(validate_email("player@ctf.example").is_ok());
/// assert!(validate_email("invalid-email").is_err());
/// ```
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::MissingField(
            "Identity is required".to_string(),
        ));
    }

    if email.len() > 254 {
        return Err(ValidationError::InvalidEmail(
            "Email is too long".to_string(),
        ));
    }

    if EMAIL_REGEX.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(format!(
            "Invalid email format: {email}"
        )))
    }
}

/// Validates a password before it is hashed and stored
///
/// # Password Requirements
///
/// - Minimum 8 characters
/// - Maximum 128 characters
/// - Cannot be empty or whitespace only
///
/// Only provisioning and password resets validate strength; login attempts
/// are verified against the stored hash as-is.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::MissingField(
            "Password is required".to_string(),
        ));
    }

    if password.trim().is_empty() {
        return Err(ValidationError::InvalidPassword(
            "Password cannot be only whitespace".to_string(),
        ));
    }

    if password.len() < 8 {
        return Err(ValidationError::InvalidPassword(
            "Password must be at least 8 characters long".to_string(),
        ));
    }

    if password.len() > 128 {
        return Err(ValidationError::InvalidPassword(
            "Password must be no more than 128 characters long".to_string(),
        ));
    }

    Ok(())
}

/// Validates a free-form block reason supplied by an administrator
pub fn validate_block_reason(reason: Option<&str>) -> Result<(), ValidationError> {
    if let Some(reason) = reason {
        if reason.trim().is_empty() {
            return Err(ValidationError::InvalidField(
                "Block reason cannot be empty or whitespace only".to_string(),
            ));
        }

        if reason.len() > 500 {
            return Err(ValidationError::InvalidField(
                "Block reason must be no more than 500 characters long".to_string(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("a@x.com").is_ok());
        assert!(validate_email("first.last+tag@ctf.example.org").is_ok());

        assert!(matches!(
            validate_email(""),
            Err(ValidationError::MissingField(_))
        ));
        assert!(matches!(
            validate_email("no-at-sign"),
            Err(ValidationError::InvalidEmail(_))
        ));
        assert!(matches!(
            validate_email("a@x"),
            Err(ValidationError::InvalidEmail(_))
        ));

        let long = format!("{}@x.com", "a".repeat(260));
        assert!(matches!(
            validate_email(&long),
            Err(ValidationError::InvalidEmail(_))
        ));
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("correct horse").is_ok());

        assert!(matches!(
            validate_password(""),
            Err(ValidationError::MissingField(_))
        ));
        assert!(matches!(
            validate_password("         "),
            Err(ValidationError::InvalidPassword(_))
        ));
        assert!(matches!(
            validate_password("short"),
            Err(ValidationError::InvalidPassword(_))
        ));
        assert!(matches!(
            validate_password(&"x".repeat(129)),
            Err(ValidationError::InvalidPassword(_))
        ));
    }

    #[test]
    fn test_validate_block_reason() {
        assert!(validate_block_reason(None).is_ok());
        assert!(validate_block_reason(Some("flag sharing")).is_ok());
        assert!(validate_block_reason(Some("   ")).is_err());
        assert!(validate_block_reason(Some(&"r".repeat(501))).is_err());
    }
}
