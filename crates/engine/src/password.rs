//! Password hashing (Argon2id, PHC string format).

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};
use rand::{Rng, distributions::Alphanumeric};
use secrecy::{ExposeSecret, SecretBox};

use crate::{EngineError, ResultEngine};

// Verified against when the username is unknown, so both paths cost the same.
const FALLBACK_HASH: &str = "$argon2id$v=19$m=15000,t=2,p=1$\
    gZiV/M1gPc22ElAH/Jh1Hw$\
    CWOrkoo7oJBQ/iyh7uJ0LO2aLEfrHwTWllSAxT0zRno";

fn hasher() -> ResultEngine<Argon2<'static>> {
    let params = Params::new(15000, 2, 1, None)
        .map_err(|err| EngineError::InvariantViolation(format!("argon2 params: {err}")))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

pub(crate) fn hash_password(password: &SecretBox<String>) -> ResultEngine<String> {
    let salt = SaltString::generate(&mut rand_core::OsRng);
    let hash = hasher()?
        .hash_password(password.expose_secret().as_bytes(), &salt)
        .map_err(|err| EngineError::InvariantViolation(format!("password hashing: {err}")))?;
    Ok(hash.to_string())
}

/// Returns `true` when `candidate` matches `expected_hash`. A malformed stored
/// hash never matches.
pub(crate) fn verify_password(expected_hash: &str, candidate: &SecretBox<String>) -> bool {
    let Ok(parsed) = PasswordHash::new(expected_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(candidate.expose_secret().as_bytes(), &parsed)
        .is_ok()
}

/// Burns the same verification cost as a real check, then fails.
pub(crate) fn verify_against_fallback(candidate: &SecretBox<String>) -> bool {
    let _ = verify_password(FALLBACK_HASH, candidate);
    false
}

/// Hash of a random password nobody ever sees, for virtual members.
pub(crate) fn unusable_password_hash() -> ResultEngine<String> {
    let secret: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    hash_password(&SecretBox::new(Box::new(secret)))
}

pub(crate) fn validate_new_password(password: &SecretBox<String>) -> ResultEngine<()> {
    if password.expose_secret().chars().count() < 8 {
        return Err(EngineError::Validation(
            "password: must be at least 8 characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(s: &str) -> SecretBox<String> {
        SecretBox::new(Box::new(s.to_string()))
    }

    #[test]
    fn hash_then_verify() {
        let hash = hash_password(&secret("correct horse")).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password(&hash, &secret("correct horse")));
        assert!(!verify_password(&hash, &secret("wrong horse")));
    }

    #[test]
    fn garbage_hash_never_matches() {
        assert!(!verify_password("not-a-hash", &secret("anything")));
        assert!(!verify_against_fallback(&secret("anything")));
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(validate_new_password(&secret("short")).is_err());
        assert!(validate_new_password(&secret("long enough")).is_ok());
    }
}
