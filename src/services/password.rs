//! Password hashing and strength rules
//!
//! Hashes are Argon2id PHC strings with a random salt per password.

use anyhow::{Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Characters that satisfy the "special character" rule
pub const PASSWORD_SPECIAL_CHARS: &str = "!@#$%^&*()-_+=";

/// Minimum password length in characters
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a password using Argon2id with the crate's default parameters.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
        .context("Password hashing failed")?;

    Ok(password_hash.to_string())
}

/// Verify a password against a stored hash.
///
/// Returns `Ok(false)` for a wrong password and an error only when the stored
/// hash cannot be parsed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))
        .context("Failed to parse password hash")?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("Password verification failed: {}", e))
            .context("Password verification error"),
    }
}

/// Check the strength rules, returning the first one the password breaks.
pub fn check_password_strength(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err("Password must be at least 8 characters long");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit");
    }
    if !password.chars().any(|c| c.is_alphabetic()) {
        return Err("Password must contain at least one letter");
    }
    if !password.chars().any(|c| PASSWORD_SPECIAL_CHARS.contains(c)) {
        return Err("Password must contain at least one special character (!@#$%^&*()-_+=)");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_produces_argon2id_hash() {
        let hash = hash_password("test_password_123").expect("Failed to hash password");
        assert!(hash.starts_with("$argon2id$"));
    }

    #[test]
    fn test_hash_password_salts_each_hash() {
        let hash1 = hash_password("same_password").unwrap();
        let hash2 = hash_password("same_password").unwrap();
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("correct-h0rse").unwrap();
        assert!(verify_password("correct-h0rse", &hash).unwrap());
        assert!(!verify_password("wrong-h0rse", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        assert!(verify_password("password", "invalid_hash_format").is_err());
    }

    #[test]
    fn test_strength_rules() {
        assert!(check_password_strength("abc1!").is_err());
        assert!(check_password_strength("abcdefgh!").is_err());
        assert!(check_password_strength("12345678!").is_err());
        assert!(check_password_strength("abcdefg1").is_err());
        assert!(check_password_strength("abcdefg1!").is_ok());
        assert!(check_password_strength("Pass_word9").is_ok());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(20))]

            /// Any password built from a letter, a digit, a special
            /// character and enough padding passes the strength check.
            #[test]
            fn prop_strong_passwords_accepted(
                letters in "[a-zA-Z]{1,10}",
                digits in "[0-9]{1,5}",
                special in "[!@#$%^&*()_+=-]",
                padding in "[a-z]{5,10}",
            ) {
                let password = format!("{}{}{}{}", letters, digits, special, padding);
                prop_assert!(check_password_strength(&password).is_ok());
            }

            /// Passwords without any special character are always rejected.
            #[test]
            fn prop_missing_special_rejected(password in "[a-zA-Z0-9]{0,30}") {
                prop_assert!(check_password_strength(&password).is_err());
            }
        }
    }
}
