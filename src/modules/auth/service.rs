use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use ulid::Ulid;

use super::repository::{self, Session};
use crate::types::Context;
use std::sync::Arc;

#[derive(Debug)]
pub enum Error {
    UnexpectedError,
    InvalidSession,
    ExpiredToken,
}

type Result<T> = std::result::Result<T, Error>;

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| {
            tracing::error!("Failed to hash password: {}", err);
            Error::UnexpectedError
        })
}

pub fn verify_password(password_hash: &str, password: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed_hash) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok(),
        Err(err) => {
            tracing::error!("Stored password hash could not be parsed: {}", err);
            false
        }
    }
}

pub async fn create_session(ctx: Arc<Context>, user_id: String) -> Result<Session> {
    let now = Utc::now();

    repository::create(
        &ctx.db_conn.pool,
        repository::SessionCreationPayload {
            user_id,
            access_token: Ulid::new().to_string(),
            refresh_token: Ulid::new().to_string(),
            access_token_expires_at: now + ctx.auth.access_token_ttl,
            refresh_token_expires_at: now + ctx.auth.refresh_token_ttl,
        },
    )
    .await
    .map_err(|_| Error::UnexpectedError)
}

pub async fn regenerate_tokens_for_session(
    ctx: Arc<Context>,
    refresh_token: &str,
) -> Result<Session> {
    let session = verify_refresh_token(ctx.clone(), refresh_token).await?;
    let now = Utc::now();

    repository::update_by_id(
        &ctx.db_conn.pool,
        &session.id,
        repository::UpdateSessionPayload {
            access_token: Ulid::new().to_string(),
            refresh_token: Ulid::new().to_string(),
            access_token_expires_at: now + ctx.auth.access_token_ttl,
            refresh_token_expires_at: now + ctx.auth.refresh_token_ttl,
        },
    )
    .await
    .map_err(|_| Error::UnexpectedError)?
    .ok_or(Error::InvalidSession)
}

pub async fn verify_access_token(ctx: Arc<Context>, access_token: &str) -> Result<Session> {
    let session = repository::find_by_access_token(&ctx.db_conn.pool, access_token)
        .await
        .map_err(|_| Error::UnexpectedError)?
        .ok_or(Error::InvalidSession)?;

    if session.access_token_expires_at < Utc::now() {
        return Err(Error::ExpiredToken);
    };

    Ok(session)
}

pub async fn verify_refresh_token(ctx: Arc<Context>, refresh_token: &str) -> Result<Session> {
    let session = repository::find_by_refresh_token(&ctx.db_conn.pool, refresh_token)
        .await
        .map_err(|_| Error::UnexpectedError)?
        .ok_or(Error::InvalidSession)?;

    if session.refresh_token_expires_at < Utc::now() {
        return Err(Error::ExpiredToken);
    };

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_password_verifies() {
        let hash = hash_password("night-owl-42").unwrap();
        assert_ne!(hash, "night-owl-42");
        assert!(verify_password(&hash, "night-owl-42"));
        assert!(!verify_password(&hash, "night-owl-43"));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("not-a-phc-string", "anything"));
    }
}
