//! Input validation shared by the services
//!
//! Every check returns a [`FieldError`] naming the offending field, which the
//! API layer reports as `details.field`.

use once_cell::sync::Lazy;
use regex::Regex;

use super::password::check_password_strength;

/// Maximum username length in characters
pub const MAX_USERNAME_LENGTH: usize = 45;

/// Maximum course title length in characters
pub const MAX_TITLE_LENGTH: usize = 200;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9._%+\-]+@[a-z0-9\-]+(\.[a-z0-9\-]+)*\.[a-z]{2,}$")
        .expect("email pattern compiles")
});

/// A rejected input field and the reason
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Trim, lowercase and check an email address.
pub fn normalize_email(email: &str) -> Result<String, FieldError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(FieldError::new("email", "Email cannot be empty"));
    }
    if !EMAIL_RE.is_match(&email) {
        return Err(FieldError::new("email", "Invalid email format"));
    }
    Ok(email)
}

/// Trim a username and check it is non-empty and short enough.
pub fn validate_username(username: &str) -> Result<String, FieldError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(FieldError::new("username", "Username cannot be empty"));
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(FieldError::new(
            "username",
            format!("Username cannot exceed {} characters", MAX_USERNAME_LENGTH),
        ));
    }
    Ok(username.to_string())
}

pub fn validate_password(password: &str) -> Result<(), FieldError> {
    check_password_strength(password).map_err(|msg| FieldError::new("password", msg))
}

/// Trim a required title and enforce [`MAX_TITLE_LENGTH`].
pub fn validate_title(title: &str) -> Result<String, FieldError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(FieldError::new("title", "Title cannot be empty"));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(FieldError::new(
            "title",
            format!("Title cannot exceed {} characters", MAX_TITLE_LENGTH),
        ));
    }
    Ok(title.to_string())
}

/// Optional http(s) URL. Blank input clears the value.
pub fn validate_url(field: &'static str, url: Option<String>) -> Result<Option<String>, FieldError> {
    match url.map(|u| u.trim().to_string()) {
        None => Ok(None),
        Some(u) if u.is_empty() => Ok(None),
        Some(u) if u.starts_with("http://") || u.starts_with("https://") => Ok(Some(u)),
        Some(_) => Err(FieldError::new(field, "URL must start with http:// or https://")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ada@Example.COM ").unwrap(), "ada@example.com");
        assert_eq!(normalize_email("first.last+tag@mail.co.uk").unwrap(), "first.last+tag@mail.co.uk");

        for bad in ["", "plain", "a@b", "@example.com", "a b@example.com"] {
            let err = normalize_email(bad).unwrap_err();
            assert_eq!(err.field, "email", "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_validate_username() {
        assert_eq!(validate_username("  ada ").unwrap(), "ada");
        assert!(validate_username("   ").is_err());
        assert!(validate_username(&"x".repeat(45)).is_ok());
        assert_eq!(validate_username(&"x".repeat(46)).unwrap_err().field, "username");
    }

    #[test]
    fn test_validate_title() {
        assert_eq!(validate_title(" Rust ").unwrap(), "Rust");
        assert!(validate_title("").is_err());
        assert!(validate_title(&"t".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_url() {
        assert_eq!(validate_url("cover_url", None).unwrap(), None);
        assert_eq!(validate_url("cover_url", Some(" ".into())).unwrap(), None);
        assert!(validate_url("cover_url", Some("https://x.io/a.png".into())).unwrap().is_some());
        assert_eq!(
            validate_url("avatar_url", Some("javascript:alert(1)".into())).unwrap_err().field,
            "avatar_url"
        );
    }

    #[test]
    fn test_validate_password_names_field() {
        assert_eq!(validate_password("short").unwrap_err().field, "password");
        assert!(validate_password("longer-pass1").is_ok());
    }
}
