use argon2::{
    password_hash::{
        rand_core::OsRng,
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString, Error as Argon2Error
    },
    Argon2, Algorithm, Params, Version
};
use validator::ValidationError;
use zxcvbn::zxcvbn;

use crate::errors::PasswordError;

const MIN_LENGTH: usize = 8;
const MIN_STRENGTH_SCORE: u8 = 3;

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(15_000, 2, 1, None)
        .map_err(|e| PasswordError::InvalidParameters(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashingError(e.to_string()))
        .map(|hash| hash.to_string())
}

pub fn verify_password(password: &str, hashed: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hashed)
        .map_err(|e| PasswordError::InvalidHashFormat(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(Argon2Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerificationError(e.to_string())),
    }
}

/// Length, character classes, then a zxcvbn estimate.
pub fn check_password_strength(password: &str) -> Result<(), PasswordError> {
    if password.chars().count() < MIN_LENGTH {
        return Err(PasswordError::TooShort(MIN_LENGTH));
    }

    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace());

    if !(has_upper && has_digit && has_symbol) {
        return Err(PasswordError::InsufficientComplexity);
    }

    let estimate = zxcvbn(password, &[]);
    if (estimate.score() as u8) < MIN_STRENGTH_SCORE {
        let feedback = estimate
            .feedback()
            .and_then(|f| f.warning().map(|w| w.to_string()))
            .unwrap_or_else(|| "try a longer passphrase".to_string());
        return Err(PasswordError::TooWeak(feedback));
    }

    Ok(())
}

/// `validator` hook for registration payloads.
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    check_password_strength(password).map_err(|e| {
        let code = match e {
            PasswordError::TooShort(_) => "password_length",
            _ => "password_complexity",
        };
        let mut error = ValidationError::new(code);
        error.message = Some(e.to_string().into());
        error
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify_against_the_original_password() {
        let hash = hash_password("Corr3ct!Horse#Battery").unwrap();
        assert!(verify_password("Corr3ct!Horse#Battery", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn malformed_hashes_are_reported() {
        assert!(matches!(
            verify_password("x", "not-a-hash"),
            Err(PasswordError::InvalidHashFormat(_))
        ));
    }

    #[test]
    fn weak_passwords_are_rejected() {
        assert!(matches!(check_password_strength("Ab1!"), Err(PasswordError::TooShort(8))));
        assert!(matches!(
            check_password_strength("alllowercase"),
            Err(PasswordError::InsufficientComplexity)
        ));
        assert!(check_password_strength("Tr1cky!Quokka#Lantern").is_ok());
    }
}
