//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered account.
///
/// Email is the login identifier and is always stored lowercase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Login email (unique, lowercase)
    pub email: String,
    /// Display handle, not unique on its own
    pub username: String,
    /// Password hash (argon2 PHC string)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new User with an already hashed password.
    pub fn new(email: String, username: String, password_hash: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            email,
            username,
            password_hash,
            role,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// `username#id`, unambiguous even when usernames repeat
    pub fn display_name(&self) -> String {
        format!("{}#{}", self.username, self.id)
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Whether this user may modify the account with the given id
    pub fn can_manage_account(&self, user_id: i64) -> bool {
        self.is_admin() || self.id == user_id
    }
}

/// User role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Full access to every course and account
    Admin,
    /// Regular account: creates, joins and collaborates on courses
    #[default]
    Student,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::Student => write!(f, "student"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "student" => Ok(UserRole::Student),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Input for registering a user (before password hashing)
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserInput {
    pub email: String,
    pub username: String,
    /// Plaintext password (will be hashed)
    pub password: String,
}

/// Profile changes; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserInput {
    pub email: Option<String>,
    pub username: Option<String>,
    /// New plaintext password (will be hashed)
    pub password: Option<String>,
    pub avatar_url: Option<String>,
}

/// What other people see of an account
#[derive(Debug, Clone, Serialize)]
pub struct PublicProfile {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: UserRole,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PublicProfile {
    /// Build a profile; the email is only included when `show_email` is set.
    pub fn from_user(user: &User, show_email: bool) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            display_name: user.display_name(),
            email: show_email.then(|| user.email.clone()),
            role: user.role,
            avatar_url: user.avatar_url.clone(),
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, role: UserRole) -> User {
        let mut user = User::new("a@example.com".into(), "ada".into(), "hash".into(), role);
        user.id = id;
        user
    }

    #[test]
    fn test_display_name() {
        assert_eq!(user(7, UserRole::Student).display_name(), "ada#7");
    }

    #[test]
    fn test_can_manage_account() {
        let student = user(1, UserRole::Student);
        assert!(student.can_manage_account(1));
        assert!(!student.can_manage_account(2));
        assert!(user(3, UserRole::Admin).can_manage_account(2));
    }

    #[test]
    fn test_role_parse_and_display() {
        assert_eq!("ADMIN".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!(UserRole::Student.to_string(), "student");
        assert!("instructor".parse::<UserRole>().is_err());
        assert_eq!(UserRole::default(), UserRole::Student);
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let json = serde_json::to_string(&user(1, UserRole::Student)).unwrap();
        assert!(!json.contains("password_hash"));
    }

    #[test]
    fn test_public_profile_hides_email() {
        let u = user(1, UserRole::Student);
        assert!(PublicProfile::from_user(&u, false).email.is_none());
        assert_eq!(PublicProfile::from_user(&u, true).email.as_deref(), Some("a@example.com"));
    }
}
