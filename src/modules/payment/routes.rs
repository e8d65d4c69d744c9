use super::gateway;
use crate::{
    modules::{
        auth::middleware::Auth,
        notification::service::{self as notification, Notification, ALL_BACKENDS},
        order::{
            repository::{
                self as order_repository, CreateHistoryPayload, Order, OrderStatus,
                PaymentMethod, PaymentStatus,
            },
            service as order_service,
        },
        realtime::hub::events,
        user::{self, repository::Role},
    },
    types::{Context, PaymentContext},
    utils::validation,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

enum Error {
    NotConfigured,
    OrderNotFound,
    NotPayable,
    AlreadySettled,
    InvalidSignature,
    GatewayError,
    UnexpectedError,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotConfigured => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Online payments are not available",
            ),
            Self::OrderNotFound => (StatusCode::NOT_FOUND, "Order not found"),
            Self::NotPayable => (
                StatusCode::BAD_REQUEST,
                "Order does not take online payment in its current state",
            ),
            Self::AlreadySettled => (StatusCode::CONFLICT, "Order has already been paid"),
            Self::InvalidSignature => (StatusCode::BAD_REQUEST, "Invalid payment signature"),
            Self::GatewayError => (
                StatusCode::BAD_GATEWAY,
                "Payment gateway could not process the request",
            ),
            Self::UnexpectedError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Sorry an error occurred",
            ),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Loads an ONLINE order of the calling customer whose payment is still open.
async fn find_unsettled(
    ctx: &Context,
    auth: &Auth,
    order_id: &str,
) -> Result<(PaymentContext, Order), Error> {
    let payment = ctx.payment.clone().ok_or(Error::NotConfigured)?;

    let order = order_repository::find_by_id(&ctx.db_conn.pool, order_id)
        .await
        .map_err(|_| Error::UnexpectedError)?
        .filter(|order| order.customer_id == auth.user.id)
        .ok_or(Error::OrderNotFound)?;

    if order.payment_method != PaymentMethod::Online {
        return Err(Error::NotPayable);
    }

    if order.payment_status != PaymentStatus::Pending {
        return Err(Error::AlreadySettled);
    }

    Ok((payment, order))
}

/// Same as [`find_unsettled`] but the order must also still be PENDING.
async fn find_payable(
    ctx: &Context,
    auth: &Auth,
    order_id: &str,
) -> Result<(PaymentContext, Order), Error> {
    let (payment, order) = find_unsettled(ctx, auth, order_id).await?;

    if order.status != OrderStatus::Pending {
        return Err(Error::NotPayable);
    }

    Ok((payment, order))
}

/// Marks the order paid. A payment on a cancelled order is kept and noted in
/// the status history so an admin can refund it.
async fn record_payment(
    ctx: &Context,
    auth: &Auth,
    order_id: &str,
    gateway_payment_id: &str,
) -> Result<Order, Error> {
    let mut tx = ctx.db_conn.pool.begin().await.map_err(|err| {
        tracing::error!("Failed to start payment transaction: {}", err);
        Error::UnexpectedError
    })?;

    let order = order_repository::mark_paid(&mut *tx, order_id, gateway_payment_id)
        .await
        .map_err(|_| Error::UnexpectedError)?
        .ok_or(Error::AlreadySettled)?;

    if order_service::awaits_refund(&order) {
        order_repository::create_history(
            &mut *tx,
            CreateHistoryPayload {
                order_id: order.id.clone(),
                from_status: Some(order.status),
                to_status: order.status,
                changed_by: auth.user.id.clone(),
                note: Some(format!(
                    "Payment {} captured after cancellation, refund required",
                    gateway_payment_id
                )),
            },
        )
        .await
        .map_err(|_| Error::UnexpectedError)?;
    }

    tx.commit().await.map_err(|err| {
        tracing::error!("Failed to commit payment of order {}: {}", order_id, err);
        Error::UnexpectedError
    })?;

    Ok(order)
}

async fn alert_admins(ctx: Arc<Context>, order: &Order) {
    tracing::warn!(
        "Order {} was paid after it was cancelled and needs a refund",
        order.id
    );

    match user::repository::find_ids(&ctx.db_conn.pool, Some(Role::Admin)).await {
        Ok(admin_ids) => {
            for admin_id in admin_ids {
                notification::dispatch(
                    ctx.clone(),
                    Notification::refund_required(order.clone(), admin_id),
                    &ALL_BACKENDS,
                );
            }
        }
        Err(_) => tracing::error!("Could not alert admins about refund of order {}", order.id),
    }
}

async fn create_payment(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Path(order_id): Path<String>,
) -> Response {
    if let Err(res) = auth.require(&[Role::Customer]) {
        return res;
    }

    let (payment, order) = match find_payable(&ctx, &auth, &order_id).await {
        Ok(found) => found,
        Err(err) => return err.into_response(),
    };

    let gateway_order = match gateway::create_order(&payment, &order.id, &order.total).await {
        Ok(gateway_order) => gateway_order,
        Err(_) => return Error::GatewayError.into_response(),
    };

    match order_repository::set_gateway_order_id(&ctx.db_conn.pool, &order.id, &gateway_order.id)
        .await
    {
        Ok(Some(_)) => (),
        Ok(None) => return Error::AlreadySettled.into_response(),
        Err(_) => return Error::UnexpectedError.into_response(),
    };

    tracing::info!(
        "Created gateway order {} for order {}",
        gateway_order.id,
        order.id
    );

    (
        StatusCode::CREATED,
        Json(json!({
            "order_id": order.id,
            "gateway_order_id": gateway_order.id,
            "amount": gateway_order.amount,
            "currency": gateway_order.currency,
            "key_id": payment.key_id,
        })),
    )
        .into_response()
}

#[derive(Deserialize, Validate)]
struct VerifyPaymentPayload {
    #[validate(length(min = 1))]
    gateway_order_id: String,
    #[validate(length(min = 1))]
    gateway_payment_id: String,
    #[validate(length(min = 1))]
    signature: String,
}

async fn verify_payment(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Path(order_id): Path<String>,
    Json(payload): Json<VerifyPaymentPayload>,
) -> Response {
    if let Err(res) = auth.require(&[Role::Customer]) {
        return res;
    }

    if let Err(errors) = payload.validate() {
        return validation::into_response(errors).into_response();
    }

    // Verification accepts any order status: the customer may have paid
    // while the order was being cancelled.
    let (payment, order) = match find_unsettled(&ctx, &auth, &order_id).await {
        Ok(found) => found,
        Err(err) => return err.into_response(),
    };

    if order.gateway_order_id.as_deref() != Some(payload.gateway_order_id.as_str())
        || !gateway::verify_signature(
            &payment.key_secret,
            &payload.gateway_order_id,
            &payload.gateway_payment_id,
            &payload.signature,
        )
    {
        tracing::warn!("Rejected payment signature for order {}", order.id);
        return Error::InvalidSignature.into_response();
    }

    let order = match record_payment(&ctx, &auth, &order.id, &payload.gateway_payment_id).await {
        Ok(order) => order,
        Err(err) => return err.into_response(),
    };

    tracing::info!("Order {} paid with {}", order.id, payload.gateway_payment_id);
    order_service::broadcast(&ctx, events::ORDER_STATUS_UPDATED, &order, None);

    if order_service::awaits_refund(&order) {
        alert_admins(ctx.clone(), &order).await;
    }

    (StatusCode::OK, Json(json!(order))).into_response()
}

pub fn get_router() -> Router<Arc<Context>> {
    Router::new()
        .route("/orders/:id", post(create_payment))
        .route("/orders/:id/verify", post(verify_payment))
}
