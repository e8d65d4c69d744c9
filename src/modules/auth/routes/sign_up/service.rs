use super::types::{request, response};
use crate::{
    modules::{auth::service, delivery, user},
    types::Context,
};
use std::sync::Arc;
use user::repository::Role;
use validator::Validate;

pub async fn service(ctx: Arc<Context>, payload: request::Payload) -> response::Response {
    payload.validate().map_err(|errors| {
        tracing::warn!("Failed to validate payload: {errors}");
        response::Error::FailedToValidate(errors)
    })?;

    let role = payload.role.unwrap_or_default();
    if role == Role::Admin {
        return Err(response::Error::RoleNotAllowed);
    }

    let email = payload.email.trim().to_lowercase();

    let mut tx = ctx.db_conn.pool.begin().await.map_err(|err| {
        tracing::error!("Failed to start database transaction: {}", err);
        response::Error::UnexpectedError
    })?;

    if let Some(existing) =
        user::repository::find_by_email_or_phone_number(&mut *tx, &email, &payload.phone_number)
            .await
            .map_err(|_| response::Error::UnexpectedError)?
    {
        if existing.email.to_lowercase() == email {
            return Err(response::Error::EmailAlreadyInUse);
        }
        return Err(response::Error::PhoneNumberAlreadyInUse);
    }

    let password_hash =
        service::hash_password(&payload.password).map_err(|_| response::Error::UnexpectedError)?;

    let user = user::repository::create(
        &mut *tx,
        user::repository::CreateUserPayload {
            email,
            phone_number: payload.phone_number,
            first_name: payload.first_name,
            last_name: payload.last_name,
            password_hash,
            role,
        },
    )
    .await
    .map_err(|_| response::Error::SignupFailed)?;

    if role == Role::DeliveryPartner {
        delivery::repository::create(&mut *tx, &user.id)
            .await
            .map_err(|_| response::Error::SignupFailed)?;
    }

    tx.commit().await.map_err(|err| {
        tracing::error!("Failed to commit database transaction: {}", err);
        response::Error::UnexpectedError
    })?;

    let session = service::create_session(ctx.clone(), user.id.clone())
        .await
        .map_err(|_| response::Error::UnexpectedError)?;

    tracing::info!("New {} account created: {}", user.role, user.id);

    Ok(response::Success::SignedUp(user, session))
}
