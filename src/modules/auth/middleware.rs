use super::service;
use crate::modules::user::{self, repository::Role, repository::User};
use crate::types::Context;
use axum::extract::{Extension, FromRequestParts};
use axum::http::{request::Parts, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::RequestPartsExt;
use axum::{async_trait, Json};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

fn invalid_session() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "Invalid session token"})),
    )
        .into_response()
}

fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, Json(json!({ "error": "Forbidden" }))).into_response()
}

async fn get_context(parts: &mut Parts) -> Result<Arc<Context>, Response> {
    parts
        .extract::<Extension<Arc<Context>>>()
        .await
        .map(|Extension(ctx)| ctx)
        .map_err(|err| {
            tracing::error!("Application context missing from request: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
}

async fn get_user_from_request(parts: &mut Parts) -> Result<(User, String), Response> {
    let ctx = get_context(parts).await?;

    let TypedHeader(Authorization(bearer)) = parts
        .extract::<TypedHeader<Authorization<Bearer>>>()
        .await
        .map_err(|_| invalid_session())?;

    let session = service::verify_access_token(ctx.clone(), bearer.token())
        .await
        .map_err(|_| invalid_session())?;

    let user = user::repository::find_by_id(&ctx.db_conn.pool, &session.user_id)
        .await
        .map_err(|_| invalid_session())?
        .ok_or_else(invalid_session)?;

    Ok((user, session.id))
}

#[derive(Serialize, Clone)]
pub struct Auth {
    pub user: User,
    #[serde(skip)]
    pub session_id: String,
}

impl Auth {
    pub fn has_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.user.role)
    }

    /// Rejects with 403 unless the user holds one of `roles`.
    pub fn require(&self, roles: &[Role]) -> Result<(), Response> {
        match self.has_role(roles) {
            true => Ok(()),
            false => Err(forbidden()),
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Auth {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        get_user_from_request(parts)
            .await
            .map(|(user, session_id)| Self { user, session_id })
    }
}

#[derive(Serialize, Clone)]
pub struct AdminAuth {
    pub user: User,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AdminAuth {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        let (user, _) = get_user_from_request(parts).await?;

        if !user::repository::is_admin(&user) {
            return Err(forbidden());
        }

        Ok(Self { user })
    }
}
