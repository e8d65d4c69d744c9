use super::repository;
use crate::{
    modules::{
        auth::middleware::Auth,
        order::repository::{self as order_repository, OrderStatus},
        restaurant,
        user::repository::Role,
    },
    types::Context,
    utils::{pagination::Pagination, validation},
};
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

enum Error {
    OrderNotFound,
    NotDelivered,
    AlreadyReviewed,
    UnexpectedError,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::OrderNotFound => (StatusCode::NOT_FOUND, "Order not found"),
            Self::NotDelivered => (
                StatusCode::BAD_REQUEST,
                "Only delivered orders can be reviewed",
            ),
            Self::AlreadyReviewed => (StatusCode::CONFLICT, "Order has already been reviewed"),
            Self::UnexpectedError => (StatusCode::INTERNAL_SERVER_ERROR, "Failed to save review"),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Deserialize, Validate)]
struct CreateReviewPayload {
    #[validate(length(min = 1))]
    order_id: String,
    #[validate(range(min = 1, max = 5))]
    rating: i16,
    #[validate(length(max = 1000))]
    comment: Option<String>,
}

async fn save_review(
    ctx: &Context,
    auth: &Auth,
    payload: CreateReviewPayload,
) -> Result<repository::Review, Error> {
    let order = order_repository::find_by_id(&ctx.db_conn.pool, &payload.order_id)
        .await
        .map_err(|_| Error::UnexpectedError)?
        .filter(|order| order.customer_id == auth.user.id)
        .ok_or(Error::OrderNotFound)?;

    if order.status != OrderStatus::Delivered {
        return Err(Error::NotDelivered);
    }

    let mut tx = ctx.db_conn.pool.begin().await.map_err(|err| {
        tracing::error!("Failed to start review transaction: {}", err);
        Error::UnexpectedError
    })?;

    let review = repository::create(
        &mut *tx,
        repository::CreateReviewPayload {
            order_id: order.id,
            restaurant_id: order.restaurant_id.clone(),
            customer_id: auth.user.id.clone(),
            rating: payload.rating,
            comment: payload.comment.unwrap_or_default(),
        },
    )
    .await
    .map_err(|_| Error::UnexpectedError)?
    .ok_or(Error::AlreadyReviewed)?;

    restaurant::repository::refresh_rating(&mut *tx, &order.restaurant_id)
        .await
        .map_err(|_| Error::UnexpectedError)?;

    tx.commit().await.map_err(|err| {
        tracing::error!("Failed to commit review: {}", err);
        Error::UnexpectedError
    })?;

    Ok(review)
}

async fn create_review(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Json(payload): Json<CreateReviewPayload>,
) -> Response {
    if let Err(res) = auth.require(&[Role::Customer]) {
        return res;
    }

    if let Err(errors) = payload.validate() {
        return validation::into_response(errors).into_response();
    }

    match save_review(&ctx, &auth, payload).await {
        Ok(review) => (StatusCode::CREATED, Json(json!(review))).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn get_restaurant_reviews(
    State(ctx): State<Arc<Context>>,
    Path(restaurant_id): Path<String>,
    pagination: Pagination,
) -> Response {
    match repository::find_many_by_restaurant_id(&ctx.db_conn.pool, &restaurant_id, pagination)
        .await
    {
        Ok(reviews) => (StatusCode::OK, Json(json!(reviews))).into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to fetch reviews" })),
        )
            .into_response(),
    }
}

pub fn get_router() -> Router<Arc<Context>> {
    Router::new()
        .route("/", post(create_review))
        .route("/restaurants/:id", get(get_restaurant_reviews))
}
