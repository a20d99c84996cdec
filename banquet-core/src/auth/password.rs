//! Account passwords: argon2id PHC strings for storage, login checks against
//! them, and the policy a new password must satisfy at signup.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::common::error::{BanquetError, Result};

pub const MIN_PASSWORD_LENGTH: usize = 8;

const COMMON_PASSWORDS: &[&str] = &[
    "password", "password1", "password123", "12345678", "123456789", "1234567890",
    "qwerty123", "qwertyuiop", "iloveyou", "sunshine", "princess", "football",
    "baseball", "welcome1", "admin123", "letmein1", "abc12345", "11111111",
    "00000000", "passw0rd", "trustno1", "dragon12", "monkey123", "banquet123",
];

fn hasher() -> Argon2<'static> {
    Argon2::default()
}

fn password_error(action: &str, err: impl std::fmt::Display) -> BanquetError {
    BanquetError::Password {
        message: format!("Failed to {action}: {err}"),
    }
}

/// PHC string for a new account's password, with a fresh salt per call.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    hasher()
        .hash_password(password.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|e| password_error("hash password", e))
}

/// Check a login attempt against the stored PHC string. A wrong password is
/// `Ok(false)`; a stored hash that cannot be read or uses another scheme is
/// an error.
pub fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let phc = PasswordHash::new(stored).map_err(|e| password_error("read stored password hash", e))?;
    match hasher().verify_password(password.as_bytes(), &phc) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(password_error("verify password", e)),
    }
}

/// Every policy rule the password breaks, as user-facing messages.
pub fn password_policy_errors(password: &str, username: &str) -> Vec<String> {
    let mut errors = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.push(format!(
            "This password is too short. It must contain at least {MIN_PASSWORD_LENGTH} characters."
        ));
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        errors.push("This password is entirely numeric.".to_string());
    }
    if COMMON_PASSWORDS.contains(&password.to_lowercase().as_str()) {
        errors.push("This password is too common.".to_string());
    }
    let username = username.trim().to_lowercase();
    if username.len() >= 3 && password.to_lowercase().contains(&username) {
        errors.push("The password is too similar to the username.".to_string());
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signup_password_verifies_at_login() {
        let password = "Mandap#99";
        assert!(password_policy_errors(password, "asha").is_empty());

        let stored = hash_password(password).unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(verify_password(password, &stored).unwrap());
        assert!(!verify_password("mandap#99", &stored).unwrap());
        assert!(!verify_password("", &stored).unwrap());

        let other_account = hash_password("Shehnai@2026").unwrap();
        assert!(!verify_password(password, &other_account).unwrap());
    }

    #[test]
    fn test_accounts_sharing_a_password_store_different_hashes() {
        let asha = hash_password("Tulip#Garden9").unwrap();
        let ravi = hash_password("Tulip#Garden9").unwrap();
        assert_ne!(asha, ravi);

        let salt = |phc: &str| PasswordHash::new(phc).unwrap().salt.unwrap().as_str().to_string();
        assert_ne!(salt(&asha), salt(&ravi));
        assert!(verify_password("Tulip#Garden9", &asha).unwrap());
        assert!(verify_password("Tulip#Garden9", &ravi).unwrap());
    }

    #[test]
    fn test_unreadable_stored_hash_is_an_error() {
        for stored in ["", "not-a-valid-hash", "$scrypt$ln=15,r=8,p=1$c2FsdHNhbHQ$aGFzaGhhc2hoYXNoaGFzaA"] {
            let err = verify_password("Mandap#99", stored).unwrap_err();
            assert!(matches!(err, BanquetError::Password { .. }), "stored {stored:?}");
        }
    }

    #[test]
    fn test_policy() {
        assert!(password_policy_errors("Tulip#Garden9", "asha").is_empty());

        let short = password_policy_errors("ab1", "asha");
        assert_eq!(short.len(), 1);
        assert!(short[0].contains("too short"));

        assert!(password_policy_errors("98765432", "asha")
            .iter()
            .any(|e| e.contains("entirely numeric")));
        assert!(password_policy_errors("Password123", "asha")
            .iter()
            .any(|e| e.contains("too common")));
        assert!(password_policy_errors("my-asha-secret", "Asha")
            .iter()
            .any(|e| e.contains("similar")));
    }
}
