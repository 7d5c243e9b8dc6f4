use std::sync::OnceLock;

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use wren_db::models::UserRow;
use wren_db::{Database, DbError};

/// Hash a password with Argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?;
    Ok(hash.to_string())
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Find the user with `username` whose password matches. Returns `None` for
/// a wrong password and for an unknown username alike; the unknown-username
/// path still runs a verification against a fixed dummy hash so the two
/// cases cannot be told apart by response timing.
pub fn authenticate(
    db: &Database,
    username: &str,
    password: &str,
) -> Result<Option<UserRow>, DbError> {
    match db.get_user_by_username(username)? {
        Some(row) if verify_password(&row.password, password) => Ok(Some(row)),
        Some(_) => Ok(None),
        None => {
            verify_password(dummy_hash(), password);
            Ok(None)
        }
    }
}

fn dummy_hash() -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| hash_password("timing-equalizer").unwrap_or_default())
}
