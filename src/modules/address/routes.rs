use super::repository;
use crate::{
    modules::{auth::middleware::Auth, location, user::repository::Role},
    types::Context,
    utils::validation,
};
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

enum Error {
    LocationNotFound,
    AddressNotFound,
    UnexpectedError,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Self::LocationNotFound => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Delivery location not found or inactive" })),
            )
                .into_response(),
            Self::AddressNotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Address not found" })),
            )
                .into_response(),
            Self::UnexpectedError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Sorry an error occurred" })),
            )
                .into_response(),
        }
    }
}

async fn ensure_active_location(ctx: &Context, location_id: &Option<String>) -> Result<(), Error> {
    let Some(location_id) = location_id else {
        return Ok(());
    };

    match location::repository::find_by_id(&ctx.db_conn.pool, location_id)
        .await
        .map_err(|_| Error::UnexpectedError)?
    {
        Some(location) if location.is_active => Ok(()),
        _ => Err(Error::LocationNotFound),
    }
}

async fn get_addresses(State(ctx): State<Arc<Context>>, auth: Auth) -> Response {
    if let Err(res) = auth.require(&[Role::Customer]) {
        return res;
    }

    match repository::find_many_by_owner_id(&ctx.db_conn.pool, &auth.user.id).await {
        Ok(addresses) => (StatusCode::OK, Json(json!(addresses))).into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to fetch addresses" })),
        )
            .into_response(),
    }
}

#[derive(Deserialize, Validate)]
struct CreateAddressPayload {
    #[validate(length(min = 1, max = 50))]
    label: String,
    #[validate(length(min = 1, max = 200))]
    line1: String,
    #[validate(length(max = 200))]
    line2: Option<String>,
    #[validate(length(max = 200))]
    landmark: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    lng: f64,
    location_id: Option<String>,
    #[serde(default)]
    is_default: bool,
}

async fn create_address(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Json(payload): Json<CreateAddressPayload>,
) -> Response {
    if let Err(res) = auth.require(&[Role::Customer]) {
        return res;
    }

    if let Err(errors) = payload.validate() {
        return validation::into_response(errors).into_response();
    }

    match create_address_service(ctx, auth, payload).await {
        Ok(address) => (StatusCode::CREATED, Json(json!(address))).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn create_address_service(
    ctx: Arc<Context>,
    auth: Auth,
    payload: CreateAddressPayload,
) -> Result<repository::Address, Error> {
    ensure_active_location(&ctx, &payload.location_id).await?;

    let mut tx = ctx.db_conn.pool.begin().await.map_err(|err| {
        tracing::error!("Failed to start database transaction: {}", err);
        Error::UnexpectedError
    })?;

    let existing = repository::count_by_owner_id(&mut *tx, &auth.user.id)
        .await
        .map_err(|_| Error::UnexpectedError)?;
    let is_default = payload.is_default || existing == 0;

    if is_default {
        repository::clear_default(&mut *tx, &auth.user.id)
            .await
            .map_err(|_| Error::UnexpectedError)?;
    }

    let address = repository::create(
        &mut *tx,
        repository::CreateAddressPayload {
            owner_id: auth.user.id.clone(),
            label: payload.label,
            line1: payload.line1,
            line2: payload.line2,
            landmark: payload.landmark,
            lat: payload.lat,
            lng: payload.lng,
            location_id: payload.location_id,
            is_default,
        },
    )
    .await
    .map_err(|_| Error::UnexpectedError)?;

    tx.commit().await.map_err(|err| {
        tracing::error!("Failed to commit database transaction: {}", err);
        Error::UnexpectedError
    })?;

    Ok(address)
}

#[derive(Deserialize, Validate)]
struct UpdateAddressPayload {
    #[validate(length(min = 1, max = 50))]
    label: Option<String>,
    #[validate(length(min = 1, max = 200))]
    line1: Option<String>,
    #[validate(length(max = 200))]
    line2: Option<String>,
    #[validate(length(max = 200))]
    landmark: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    lng: Option<f64>,
    location_id: Option<String>,
    is_default: Option<bool>,
}

async fn update_address(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Path(id): Path<String>,
    Json(payload): Json<UpdateAddressPayload>,
) -> Response {
    if let Err(res) = auth.require(&[Role::Customer]) {
        return res;
    }

    if let Err(errors) = payload.validate() {
        return validation::into_response(errors).into_response();
    }

    match update_address_service(ctx, auth, id, payload).await {
        Ok(address) => (StatusCode::OK, Json(json!(address))).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn update_address_service(
    ctx: Arc<Context>,
    auth: Auth,
    id: String,
    payload: UpdateAddressPayload,
) -> Result<repository::Address, Error> {
    ensure_active_location(&ctx, &payload.location_id).await?;

    let mut tx = ctx.db_conn.pool.begin().await.map_err(|err| {
        tracing::error!("Failed to start database transaction: {}", err);
        Error::UnexpectedError
    })?;

    if payload.is_default == Some(true) {
        repository::clear_default(&mut *tx, &auth.user.id)
            .await
            .map_err(|_| Error::UnexpectedError)?;
    }

    let address = repository::update_by_id(
        &mut *tx,
        &id,
        &auth.user.id,
        repository::UpdateAddressPayload {
            label: payload.label,
            line1: payload.line1,
            line2: payload.line2,
            landmark: payload.landmark,
            lat: payload.lat,
            lng: payload.lng,
            location_id: payload.location_id,
            is_default: payload.is_default,
        },
    )
    .await
    .map_err(|_| Error::UnexpectedError)?
    .ok_or(Error::AddressNotFound)?;

    tx.commit().await.map_err(|err| {
        tracing::error!("Failed to commit database transaction: {}", err);
        Error::UnexpectedError
    })?;

    Ok(address)
}

async fn delete_address(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Path(id): Path<String>,
) -> Response {
    match repository::delete_by_id(&ctx.db_conn.pool, &id, &auth.user.id).await {
        Ok(true) => (StatusCode::OK, Json(json!({ "message": "Address deleted" }))).into_response(),
        Ok(false) => Error::AddressNotFound.into_response(),
        Err(_) => Error::UnexpectedError.into_response(),
    }
}

pub fn get_router() -> Router<Arc<Context>> {
    Router::new()
        .route("/", get(get_addresses).post(create_address))
        .route("/:id", put(update_address).delete(delete_address))
}
