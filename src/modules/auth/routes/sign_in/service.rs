use super::types::{request, response};
use crate::{
    modules::{auth::service, user},
    types::Context,
};
use std::sync::Arc;
use validator::Validate;

pub async fn service(ctx: Arc<Context>, payload: request::Payload) -> response::Response {
    payload
        .validate()
        .map_err(response::Error::FailedToValidate)?;

    let user = user::repository::find_by_email(&ctx.db_conn.pool, payload.email.trim())
        .await
        .map_err(|_| response::Error::UnexpectedError)?
        .ok_or(response::Error::InvalidCredentials)?;

    if !service::verify_password(&user.password_hash, &payload.password) {
        tracing::warn!("Failed sign in attempt for user {}", user.id);
        return Err(response::Error::InvalidCredentials);
    }

    let session = service::create_session(ctx.clone(), user.id.clone())
        .await
        .map_err(|_| response::Error::UnexpectedError)?;

    Ok(response::Success::SignedIn(user, session))
}
