use super::repository::{self, Restaurant};
use crate::{
    modules::{auth::middleware::Auth, user},
    types::Context,
};
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

#[derive(Debug)]
pub enum AccessError {
    NotFound,
    Forbidden,
    UnexpectedError,
}

impl IntoResponse for AccessError {
    fn into_response(self) -> axum::response::Response {
        match self {
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Restaurant not found" })),
            )
                .into_response(),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "You do not manage this restaurant" })),
            )
                .into_response(),
            Self::UnexpectedError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to fetch restaurant" })),
            )
                .into_response(),
        }
    }
}

pub fn can_manage(auth: &Auth, restaurant: &Restaurant) -> bool {
    user::repository::is_admin(&auth.user) || restaurant.owner_id == auth.user.id
}

/// Loads a restaurant the caller owns. Admins may manage any restaurant.
pub async fn find_managed(
    ctx: &Context,
    auth: &Auth,
    restaurant_id: &str,
) -> Result<Restaurant, AccessError> {
    let restaurant = repository::find_by_id(&ctx.db_conn.pool, restaurant_id)
        .await
        .map_err(|_| AccessError::UnexpectedError)?
        .ok_or(AccessError::NotFound)?;

    match can_manage(auth, &restaurant) {
        true => Ok(restaurant),
        false => Err(AccessError::Forbidden),
    }
}
