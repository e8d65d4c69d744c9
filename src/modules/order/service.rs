use super::repository::{
    self, CreateHistoryPayload, DeliveryAddress, Order, OrderItem, OrderStatus, PaymentMethod,
    PaymentStatus, StatusUpdate,
};
use super::status;
use crate::{
    modules::{
        address, delivery, location, menu,
        notification::service::{self as notification, Notification, ALL_BACKENDS},
        payment::gateway,
        realtime::{hub::events, room, Event},
        restaurant::{self, hours},
        user::repository::{Role, User},
    },
    types::Context,
};
use axum::{http::StatusCode, response::IntoResponse, Json};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use sqlx::{Postgres, Transaction};
use std::collections::HashMap;
use std::sync::Arc;

pub const MAX_ITEM_QUANTITY: i32 = 50;

fn error_response(status: StatusCode, message: String) -> axum::response::Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Rooms interested in an order: the order itself, its customer, its
/// restaurant and, once assigned, the rider.
pub fn order_rooms(order: &Order, partner_user_id: Option<&str>) -> Vec<String> {
    let mut rooms = vec![
        room::order(&order.id),
        room::user(&order.customer_id),
        room::restaurant(&order.restaurant_id),
    ];

    if let Some(partner_user_id) = partner_user_id {
        rooms.push(room::user(partner_user_id));
    }

    rooms
}

pub fn broadcast(ctx: &Context, event: &str, order: &Order, partner_user_id: Option<&str>) {
    let delivered = ctx.realtime.publish_many(
        &order_rooms(order, partner_user_id),
        Event::new(
            event,
            json!({
                "order": order,
                "progress": status::get_order_progress(order.status),
            }),
        ),
    );

    tracing::debug!("{} for order {} reached {} sessions", event, order.id, delivered);
}

async fn partner_user_id(ctx: &Context, order: &Order) -> Option<String> {
    let partner_id = order.delivery_partner_id.as_deref()?;

    delivery::repository::find_by_id(&ctx.db_conn.pool, partner_id)
        .await
        .ok()
        .flatten()
        .map(|partner| partner.user_id)
}

#[derive(Debug)]
pub enum AccessError {
    NotFound,
    Forbidden,
    UnexpectedError,
}

impl IntoResponse for AccessError {
    fn into_response(self) -> axum::response::Response {
        match self {
            Self::NotFound => error_response(StatusCode::NOT_FOUND, "Order not found".to_string()),
            Self::Forbidden => error_response(
                StatusCode::FORBIDDEN,
                "You are not a party to this order".to_string(),
            ),
            Self::UnexpectedError => error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch order".to_string(),
            ),
        }
    }
}

/// Whether `user` is the customer, the restaurant owner, the assigned rider
/// or an admin.
pub async fn is_party(ctx: &Context, user: &User, order: &Order) -> Result<bool, AccessError> {
    match user.role {
        Role::Admin => Ok(true),
        Role::Customer => Ok(order.customer_id == user.id),
        Role::RestaurantOwner => {
            let restaurant =
                restaurant::repository::find_by_id(&ctx.db_conn.pool, &order.restaurant_id)
                    .await
                    .map_err(|_| AccessError::UnexpectedError)?;

            Ok(restaurant.is_some_and(|restaurant| restaurant.owner_id == user.id))
        }
        Role::DeliveryPartner => {
            let Some(partner_id) = order.delivery_partner_id.as_deref() else {
                return Ok(false);
            };

            let partner = delivery::repository::find_by_user_id(&ctx.db_conn.pool, &user.id)
                .await
                .map_err(|_| AccessError::UnexpectedError)?;

            Ok(partner.is_some_and(|partner| partner.id == partner_id))
        }
    }
}

pub async fn find_for_party(ctx: &Context, user: &User, order_id: &str) -> Result<Order, AccessError> {
    let order = repository::find_by_id(&ctx.db_conn.pool, order_id)
        .await
        .map_err(|_| AccessError::UnexpectedError)?
        .ok_or(AccessError::NotFound)?;

    match is_party(ctx, user, &order).await? {
        true => Ok(order),
        false => Err(AccessError::Forbidden),
    }
}

#[derive(Debug)]
pub enum PlaceOrderError {
    EmptyOrder,
    InvalidQuantity(String),
    RestaurantNotFound,
    RestaurantClosed,
    AddressNotFound,
    LocationInactive,
    MenuItemUnavailable(String),
    BelowMinimumOrder(BigDecimal),
    PaymentsUnavailable,
    UnexpectedError,
}

impl IntoResponse for PlaceOrderError {
    fn into_response(self) -> axum::response::Response {
        match self {
            Self::EmptyOrder => error_response(
                StatusCode::BAD_REQUEST,
                "An order needs at least one item".to_string(),
            ),
            Self::InvalidQuantity(id) => error_response(
                StatusCode::BAD_REQUEST,
                format!(
                    "Quantity of menu item {} must be between 1 and {}",
                    id, MAX_ITEM_QUANTITY
                ),
            ),
            Self::RestaurantNotFound => {
                error_response(StatusCode::NOT_FOUND, "Restaurant not found".to_string())
            }
            Self::RestaurantClosed => error_response(
                StatusCode::BAD_REQUEST,
                "Restaurant is not accepting orders right now".to_string(),
            ),
            Self::AddressNotFound => {
                error_response(StatusCode::NOT_FOUND, "Address not found".to_string())
            }
            Self::LocationInactive => error_response(
                StatusCode::BAD_REQUEST,
                "We do not deliver to this address at the moment".to_string(),
            ),
            Self::MenuItemUnavailable(id) => error_response(
                StatusCode::BAD_REQUEST,
                format!("Menu item {} is not available", id),
            ),
            Self::BelowMinimumOrder(minimum) => error_response(
                StatusCode::BAD_REQUEST,
                format!("Minimum order amount for this restaurant is {}", minimum),
            ),
            Self::PaymentsUnavailable => error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Online payments are not available".to_string(),
            ),
            Self::UnexpectedError => error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to place order".to_string(),
            ),
        }
    }
}

pub struct PlaceOrder {
    pub restaurant_id: String,
    pub address_id: String,
    pub items: Vec<(String, i32)>,
    pub payment_method: PaymentMethod,
    pub notes: String,
}

/// Sums quantities of repeated menu items, keeping first-seen order.
pub fn merge_items(items: Vec<(String, i32)>) -> Vec<(String, i32)> {
    let mut merged: Vec<(String, i32)> = Vec::with_capacity(items.len());
    let mut positions = HashMap::new();

    for (id, quantity) in items {
        match positions.get(&id) {
            Some(&position) => {
                let entry: &mut (String, i32) = &mut merged[position];
                entry.1 = entry.1.saturating_add(quantity);
            }
            None => {
                positions.insert(id.clone(), merged.len());
                merged.push((id, quantity));
            }
        }
    }

    merged
}

pub async fn place_order(
    ctx: Arc<Context>,
    customer: &User,
    request: PlaceOrder,
) -> Result<Order, PlaceOrderError> {
    let items = merge_items(request.items);
    if items.is_empty() {
        return Err(PlaceOrderError::EmptyOrder);
    }

    if let Some((id, _)) = items
        .iter()
        .find(|(_, quantity)| !(1..=MAX_ITEM_QUANTITY).contains(quantity))
    {
        return Err(PlaceOrderError::InvalidQuantity(id.clone()));
    }

    if request.payment_method == PaymentMethod::Online && ctx.payment.is_none() {
        return Err(PlaceOrderError::PaymentsUnavailable);
    }

    let restaurant = restaurant::repository::find_by_id(&ctx.db_conn.pool, &request.restaurant_id)
        .await
        .map_err(|_| PlaceOrderError::UnexpectedError)?
        .filter(|restaurant| restaurant.is_active)
        .ok_or(PlaceOrderError::RestaurantNotFound)?;

    let now = Utc::now().with_timezone(&ctx.order.utc_offset);
    if !restaurant.is_open
        || !hours::is_open_at(&restaurant.opening_time, &restaurant.closing_time, &now)
    {
        return Err(PlaceOrderError::RestaurantClosed);
    }

    let address = address::repository::find_by_id(&ctx.db_conn.pool, &request.address_id)
        .await
        .map_err(|_| PlaceOrderError::UnexpectedError)?
        .filter(|address| address.owner_id == customer.id)
        .ok_or(PlaceOrderError::AddressNotFound)?;

    let delivery_fee = match &address.location_id {
        Some(location_id) => {
            location::repository::find_by_id(&ctx.db_conn.pool, location_id)
                .await
                .map_err(|_| PlaceOrderError::UnexpectedError)?
                .filter(|location| location.is_active)
                .ok_or(PlaceOrderError::LocationInactive)?
                .delivery_fee
        }
        None => ctx.order.default_delivery_fee.clone(),
    };

    let ids = items.iter().map(|(id, _)| id.clone()).collect::<Vec<_>>();
    let menu_items =
        menu::repository::find_many_by_ids(&ctx.db_conn.pool, &restaurant.id, &ids)
            .await
            .map_err(|_| PlaceOrderError::UnexpectedError)?
            .into_iter()
            .map(|item| (item.id.clone(), item))
            .collect::<HashMap<_, _>>();

    let mut order_items = Vec::with_capacity(items.len());
    let mut sub_total = BigDecimal::from(0);
    for (id, quantity) in items {
        let item = menu_items
            .get(&id)
            .filter(|item| item.is_available)
            .ok_or_else(|| PlaceOrderError::MenuItemUnavailable(id.clone()))?;

        sub_total += &item.price * BigDecimal::from(quantity);
        order_items.push(OrderItem {
            menu_item_id: id,
            name: item.name.clone(),
            price: item.price.clone(),
            quantity,
        });
    }

    if sub_total < restaurant.min_order_amount {
        return Err(PlaceOrderError::BelowMinimumOrder(restaurant.min_order_amount));
    }

    let total = &sub_total + &delivery_fee;

    let mut tx = ctx.db_conn.pool.begin().await.map_err(|err| {
        tracing::error!("Failed to start order transaction: {}", err);
        PlaceOrderError::UnexpectedError
    })?;

    let order = repository::create(
        &mut *tx,
        repository::CreateOrderPayload {
            customer_id: customer.id.clone(),
            restaurant_id: restaurant.id.clone(),
            delivery_address: DeliveryAddress {
                address_id: address.id,
                label: address.label,
                line1: address.line1,
                line2: address.line2,
                landmark: address.landmark,
                lat: address.lat,
                lng: address.lng,
                location_id: address.location_id,
            },
            items: order_items,
            sub_total,
            delivery_fee,
            total,
            payment_method: request.payment_method,
            notes: request.notes,
        },
    )
    .await
    .map_err(|_| PlaceOrderError::UnexpectedError)?;

    repository::create_history(
        &mut *tx,
        CreateHistoryPayload {
            order_id: order.id.clone(),
            from_status: None,
            to_status: OrderStatus::Pending,
            changed_by: customer.id.clone(),
            note: None,
        },
    )
    .await
    .map_err(|_| PlaceOrderError::UnexpectedError)?;

    tx.commit().await.map_err(|err| {
        tracing::error!("Failed to commit order: {}", err);
        PlaceOrderError::UnexpectedError
    })?;

    tracing::info!(
        "Order {} placed by {} at restaurant {}",
        order.id,
        customer.id,
        restaurant.id
    );

    broadcast(&ctx, events::ORDER_CREATED, &order, None);
    notification::dispatch(
        ctx.clone(),
        Notification::order_placed(order.clone(), restaurant.owner_id),
        &ALL_BACKENDS,
    );

    Ok(order)
}

#[derive(Debug)]
pub enum TransitionError {
    NotFound,
    RoleNotAllowed(Role, OrderStatus),
    NotParty,
    InvalidTransition(OrderStatus, OrderStatus),
    PaymentPending,
    VerificationCodeRequired,
    InvalidVerificationCode,
    VerificationCodeExpired,
    NotRefundable,
    PaymentsUnavailable,
    RefundFailed,
    Conflict,
    UnexpectedError,
}

impl IntoResponse for TransitionError {
    fn into_response(self) -> axum::response::Response {
        match self {
            Self::NotFound => error_response(StatusCode::NOT_FOUND, "Order not found".to_string()),
            Self::RoleNotAllowed(role, status) => error_response(
                StatusCode::FORBIDDEN,
                format!("{} cannot move an order to {}", role, status),
            ),
            Self::NotParty => error_response(
                StatusCode::FORBIDDEN,
                "You are not a party to this order".to_string(),
            ),
            Self::InvalidTransition(from, to) => error_response(
                StatusCode::BAD_REQUEST,
                format!("Cannot move order from {} to {}", from, to),
            ),
            Self::PaymentPending => error_response(
                StatusCode::BAD_REQUEST,
                "Online payment has not been completed".to_string(),
            ),
            Self::VerificationCodeRequired => error_response(
                StatusCode::BAD_REQUEST,
                "A delivery verification code is required".to_string(),
            ),
            Self::InvalidVerificationCode => error_response(
                StatusCode::BAD_REQUEST,
                "Invalid verification code".to_string(),
            ),
            Self::VerificationCodeExpired => error_response(
                StatusCode::BAD_REQUEST,
                "Verification code has expired, ask the customer for a new one".to_string(),
            ),
            Self::NotRefundable => error_response(
                StatusCode::BAD_REQUEST,
                "Only paid online orders can be refunded".to_string(),
            ),
            Self::PaymentsUnavailable => error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Online payments are not available".to_string(),
            ),
            Self::RefundFailed => error_response(
                StatusCode::BAD_GATEWAY,
                "Payment gateway refused the refund".to_string(),
            ),
            Self::Conflict => error_response(
                StatusCode::CONFLICT,
                "Order was updated by someone else, reload and try again".to_string(),
            ),
            Self::UnexpectedError => error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update order status".to_string(),
            ),
        }
    }
}

pub struct Transition {
    pub status: OrderStatus,
    pub verification_code: Option<String>,
    pub note: Option<String>,
}

fn check_verification_code(
    order: &Order,
    supplied: Option<&str>,
    now: DateTime<Utc>,
    expiry: Duration,
) -> Result<(), TransitionError> {
    let supplied = supplied
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .ok_or(TransitionError::VerificationCodeRequired)?;

    let (Some(code), Some(generated_at)) = (
        order.verification_code.as_deref(),
        order.verification_code_generated_at,
    ) else {
        return Err(TransitionError::InvalidVerificationCode);
    };

    if code != supplied {
        return Err(TransitionError::InvalidVerificationCode);
    }

    if status::is_verification_code_expired(generated_at, now, expiry) {
        return Err(TransitionError::VerificationCodeExpired);
    }

    Ok(())
}

#[derive(Debug)]
pub struct TransitionPlan {
    pub update: StatusUpdate,
    pub issued_code: Option<String>,
}

/// Gates a status change and works out the columns it writes. Checks run in
/// order: role, relationship, adjacency, then the rules of the target status.
pub fn plan_transition(
    role: Role,
    is_party: bool,
    order: &Order,
    request: &Transition,
    now: DateTime<Utc>,
    code_expiry: Duration,
) -> Result<TransitionPlan, TransitionError> {
    let next = request.status;

    if !status::can_role_set_status(role, next) {
        return Err(TransitionError::RoleNotAllowed(role, next));
    }

    if !is_party {
        return Err(TransitionError::NotParty);
    }

    if !status::can_update_order_status(order.status, next) {
        return Err(TransitionError::InvalidTransition(order.status, next));
    }

    let mut update = StatusUpdate::default();
    let mut issued_code = None;

    match next {
        OrderStatus::Confirmed => {
            if order.payment_method == PaymentMethod::Online
                && order.payment_status != PaymentStatus::Paid
            {
                return Err(TransitionError::PaymentPending);
            }
        }
        OrderStatus::PickedUp => {
            let code = status::generate_verification_code();
            update.verification_code = Some(code.clone());
            update.verification_code_generated_at = Some(now);
            issued_code = Some(code);
        }
        OrderStatus::Delivered => {
            check_verification_code(order, request.verification_code.as_deref(), now, code_expiry)?;
            update.delivered_at = Some(now);
            if order.payment_method == PaymentMethod::CashOnDelivery {
                update.payment_status = Some(PaymentStatus::Paid);
            }
        }
        OrderStatus::Cancelled => {
            update.cancellation_reason = Some(
                request
                    .note
                    .clone()
                    .filter(|note| !note.trim().is_empty())
                    .unwrap_or_else(|| format!("Cancelled by {}", role)),
            );
        }
        OrderStatus::Refunded => {
            if order.payment_method != PaymentMethod::Online
                || order.payment_status != PaymentStatus::Paid
                || order.gateway_payment_id.is_none()
                || order.gateway_refund_id.is_some()
            {
                return Err(TransitionError::NotRefundable);
            }
            update.payment_status = Some(PaymentStatus::Refunded);
        }
        _ => (),
    }

    Ok(TransitionPlan {
        update,
        issued_code,
    })
}

/// Runs once the REFUNDED row and its history are written in `tx`, so after
/// the gateway accepts only the refund id and the commit remain. The row
/// stays locked meanwhile and a concurrent refund request ends in a conflict.
async fn settle_refund(
    ctx: &Context,
    mut tx: Transaction<'_, Postgres>,
    order: &Order,
) -> Result<Order, TransitionError> {
    let (Some(payment), Some(payment_id)) =
        (ctx.payment.as_ref(), order.gateway_payment_id.as_deref())
    else {
        return Err(TransitionError::NotRefundable);
    };

    let refund = gateway::refund(payment, payment_id, &order.id, &order.total)
        .await
        .map_err(|err| {
            tracing::error!("Refund of order {} failed: {:?}", order.id, err);
            TransitionError::RefundFailed
        })?;

    let refunded = match repository::set_gateway_refund_id(&mut *tx, &order.id, &refund.id).await {
        Ok(Some(refunded)) => refunded,
        _ => {
            tracing::error!(
                "Order {} was refunded by the gateway as {} but the refund could not be recorded, reconcile manually",
                order.id,
                refund.id
            );
            return Err(TransitionError::UnexpectedError);
        }
    };

    tx.commit().await.map_err(|err| {
        tracing::error!(
            "Order {} was refunded by the gateway as {} but the status change failed to commit, reconcile manually: {}",
            order.id,
            refund.id,
            err
        );
        TransitionError::UnexpectedError
    })?;

    tracing::info!("Order {} refunded with gateway refund {}", order.id, refund.id);
    Ok(refunded)
}

/// Moves an order to `request.status` on behalf of `actor`, applying the
/// side effects of the target status in one transaction.
pub async fn transition(
    ctx: Arc<Context>,
    actor: &User,
    order_id: &str,
    request: Transition,
) -> Result<Order, TransitionError> {
    let next = request.status;
    let order = repository::find_by_id(&ctx.db_conn.pool, order_id)
        .await
        .map_err(|_| TransitionError::UnexpectedError)?
        .ok_or(TransitionError::NotFound)?;

    let party = status::can_role_set_status(actor.role, next)
        && is_party(&ctx, actor, &order)
            .await
            .map_err(|_| TransitionError::UnexpectedError)?;

    let TransitionPlan {
        update,
        issued_code,
    } = plan_transition(
        actor.role,
        party,
        &order,
        &request,
        Utc::now(),
        ctx.order.verification_code_expiry,
    )?;

    if next == OrderStatus::Refunded && ctx.payment.is_none() {
        return Err(TransitionError::PaymentsUnavailable);
    }

    let mut tx = ctx.db_conn.pool.begin().await.map_err(|err| {
        tracing::error!("Failed to start status transaction: {}", err);
        TransitionError::UnexpectedError
    })?;

    let updated = repository::update_status_if(&mut *tx, &order.id, order.status, next, update)
        .await
        .map_err(|_| TransitionError::UnexpectedError)?
        .ok_or(TransitionError::Conflict)?;

    if next == OrderStatus::Delivered {
        if let Some(partner_id) = &updated.delivery_partner_id {
            delivery::repository::complete_delivery(&mut *tx, partner_id, &updated.delivery_fee)
                .await
                .map_err(|_| TransitionError::UnexpectedError)?;
        }
    }

    repository::create_history(
        &mut *tx,
        CreateHistoryPayload {
            order_id: updated.id.clone(),
            from_status: Some(order.status),
            to_status: next,
            changed_by: actor.id.clone(),
            note: request.note,
        },
    )
    .await
    .map_err(|_| TransitionError::UnexpectedError)?;

    let updated = if next == OrderStatus::Refunded {
        settle_refund(&ctx, tx, &updated).await?
    } else {
        tx.commit().await.map_err(|err| {
            tracing::error!("Failed to commit status change of order {}: {}", order.id, err);
            TransitionError::UnexpectedError
        })?;
        updated
    };

    tracing::info!(
        "Order {} moved from {} to {} by {}",
        updated.id,
        order.status,
        next,
        actor.id
    );

    let partner_user_id = partner_user_id(&ctx, &updated).await;
    broadcast(
        &ctx,
        events::ORDER_STATUS_UPDATED,
        &updated,
        partner_user_id.as_deref(),
    );

    if actor.id != updated.customer_id {
        notification::dispatch(
            ctx.clone(),
            Notification::order_status_updated(updated.clone(), updated.customer_id.clone()),
            &ALL_BACKENDS,
        );
    }

    if next == OrderStatus::Cancelled && actor.role == Role::Customer {
        if let Ok(Some(restaurant)) =
            restaurant::repository::find_by_id(&ctx.db_conn.pool, &updated.restaurant_id).await
        {
            notification::dispatch(
                ctx.clone(),
                Notification::order_status_updated(updated.clone(), restaurant.owner_id),
                &ALL_BACKENDS,
            );
        }
    }

    if let Some(code) = issued_code {
        notification::dispatch(
            ctx.clone(),
            Notification::verification_code_issued(updated.clone(), code),
            &ALL_BACKENDS,
        );
    }

    if next == OrderStatus::Ready {
        let ctx = ctx.clone();
        let order_id = updated.id.clone();
        tokio::spawn(async move {
            if let Err(err) = delivery::service::auto_assign(ctx, order_id.clone()).await {
                tracing::error!("Automatic dispatch of order {} failed: {:?}", order_id, err);
            }
        });
    }

    Ok(updated)
}

/// A payment that landed after the order was cancelled has to go back to the
/// customer.
pub fn awaits_refund(order: &Order) -> bool {
    order.status == OrderStatus::Cancelled
        && order.payment_method == PaymentMethod::Online
        && order.payment_status == PaymentStatus::Paid
        && order.gateway_refund_id.is_none()
}

#[derive(Debug)]
pub enum ReissueError {
    Access(AccessError),
    NotInTransit,
    StillValid,
    UnexpectedError,
}

impl IntoResponse for ReissueError {
    fn into_response(self) -> axum::response::Response {
        match self {
            Self::Access(err) => err.into_response(),
            Self::NotInTransit => error_response(
                StatusCode::BAD_REQUEST,
                "Order is not out for delivery".to_string(),
            ),
            Self::StillValid => error_response(
                StatusCode::CONFLICT,
                "The current verification code is still valid".to_string(),
            ),
            Self::UnexpectedError => error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to issue a verification code".to_string(),
            ),
        }
    }
}

/// Issues a fresh delivery code when the current one is missing or expired.
pub async fn reissue_verification_code(
    ctx: Arc<Context>,
    customer: &User,
    order_id: &str,
) -> Result<(Order, String), ReissueError> {
    let order = find_for_party(&ctx, customer, order_id)
        .await
        .map_err(ReissueError::Access)?;

    if order.customer_id != customer.id {
        return Err(ReissueError::Access(AccessError::Forbidden));
    }

    if !matches!(
        order.status,
        OrderStatus::PickedUp | OrderStatus::OutForDelivery
    ) {
        return Err(ReissueError::NotInTransit);
    }

    let now = Utc::now();
    let still_valid = match (&order.verification_code, order.verification_code_generated_at) {
        (Some(_), Some(generated_at)) => !status::is_verification_code_expired(
            generated_at,
            now,
            ctx.order.verification_code_expiry,
        ),
        _ => false,
    };

    if still_valid {
        return Err(ReissueError::StillValid);
    }

    let code = status::generate_verification_code();
    let order = repository::set_verification_code(&ctx.db_conn.pool, &order.id, &code, now)
        .await
        .map_err(|_| ReissueError::UnexpectedError)?
        .ok_or(ReissueError::NotInTransit)?;

    tracing::info!("Verification code reissued for order {}", order.id);

    notification::dispatch(
        ctx.clone(),
        Notification::verification_code_issued(order.clone(), code.clone()),
        &ALL_BACKENDS,
    );

    Ok((order, code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::order::fixtures;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 22, 0, 0).unwrap()
    }

    fn expiry() -> Duration {
        Duration::minutes(30)
    }

    fn to(status: OrderStatus) -> Transition {
        Transition {
            status,
            verification_code: None,
            note: None,
        }
    }

    fn with_code(code: &str) -> Transition {
        Transition {
            verification_code: Some(code.to_string()),
            ..to(OrderStatus::Delivered)
        }
    }

    fn plan(role: Role, is_party: bool, order: &Order, request: &Transition) -> Result<TransitionPlan, TransitionError> {
        plan_transition(role, is_party, order, request, now(), expiry())
    }

    fn in_transit(payment_method: PaymentMethod, code_age_minutes: i64) -> Order {
        Order {
            verification_code: Some("4821".to_string()),
            verification_code_generated_at: Some(now() - Duration::minutes(code_age_minutes)),
            delivery_partner_id: Some("partner-1".to_string()),
            ..fixtures::order(OrderStatus::OutForDelivery, payment_method)
        }
    }

    #[test]
    fn role_is_checked_before_relationship_and_adjacency() {
        let order = fixtures::order(OrderStatus::Delivered, PaymentMethod::CashOnDelivery);
        let res = plan(Role::Customer, false, &order, &to(OrderStatus::Preparing));
        assert!(matches!(
            res,
            Err(TransitionError::RoleNotAllowed(Role::Customer, OrderStatus::Preparing))
        ));
    }

    #[test]
    fn relationship_is_checked_before_adjacency() {
        let order = fixtures::order(OrderStatus::Pending, PaymentMethod::CashOnDelivery);
        let res = plan(Role::RestaurantOwner, false, &order, &to(OrderStatus::Ready));
        assert!(matches!(res, Err(TransitionError::NotParty)));
    }

    #[test]
    fn rejects_statuses_outside_the_lifecycle() {
        let order = fixtures::order(OrderStatus::Pending, PaymentMethod::CashOnDelivery);
        let res = plan(Role::RestaurantOwner, true, &order, &to(OrderStatus::Ready));
        assert!(matches!(
            res,
            Err(TransitionError::InvalidTransition(OrderStatus::Pending, OrderStatus::Ready))
        ));

        let delivered = fixtures::order(OrderStatus::Delivered, PaymentMethod::CashOnDelivery);
        let res = plan(Role::Admin, true, &delivered, &to(OrderStatus::Cancelled));
        assert!(matches!(res, Err(TransitionError::InvalidTransition(..))));
    }

    #[test]
    fn unpaid_online_orders_cannot_be_confirmed() {
        let unpaid = fixtures::order(OrderStatus::Pending, PaymentMethod::Online);
        let res = plan(Role::RestaurantOwner, true, &unpaid, &to(OrderStatus::Confirmed));
        assert!(matches!(res, Err(TransitionError::PaymentPending)));

        let paid = fixtures::paid_online(OrderStatus::Pending);
        assert!(plan(Role::RestaurantOwner, true, &paid, &to(OrderStatus::Confirmed)).is_ok());

        let cash = fixtures::order(OrderStatus::Pending, PaymentMethod::CashOnDelivery);
        assert!(plan(Role::RestaurantOwner, true, &cash, &to(OrderStatus::Confirmed)).is_ok());
    }

    #[test]
    fn pickup_issues_a_fresh_code() {
        let order = fixtures::order(OrderStatus::Ready, PaymentMethod::CashOnDelivery);
        let plan = plan(Role::DeliveryPartner, true, &order, &to(OrderStatus::PickedUp)).unwrap();

        let code = plan.issued_code.unwrap();
        assert_eq!(code.len(), 4);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(plan.update.verification_code, Some(code));
        assert_eq!(plan.update.verification_code_generated_at, Some(now()));
    }

    #[test]
    fn delivery_requires_the_current_code() {
        let order = in_transit(PaymentMethod::CashOnDelivery, 5);

        let res = plan(Role::DeliveryPartner, true, &order, &to(OrderStatus::Delivered));
        assert!(matches!(res, Err(TransitionError::VerificationCodeRequired)));

        let res = plan(Role::DeliveryPartner, true, &order, &with_code("   "));
        assert!(matches!(res, Err(TransitionError::VerificationCodeRequired)));

        let res = plan(Role::DeliveryPartner, true, &order, &with_code("1234"));
        assert!(matches!(res, Err(TransitionError::InvalidVerificationCode)));

        let without_code = fixtures::order(OrderStatus::OutForDelivery, PaymentMethod::CashOnDelivery);
        let res = plan(Role::DeliveryPartner, true, &without_code, &with_code("4821"));
        assert!(matches!(res, Err(TransitionError::InvalidVerificationCode)));
    }

    #[test]
    fn delivery_rejects_an_expired_code() {
        let order = in_transit(PaymentMethod::CashOnDelivery, 31);
        let res = plan(Role::DeliveryPartner, true, &order, &with_code("4821"));
        assert!(matches!(res, Err(TransitionError::VerificationCodeExpired)));
    }

    #[test]
    fn cash_orders_are_paid_on_delivery() {
        let order = in_transit(PaymentMethod::CashOnDelivery, 5);
        let plan = plan(Role::DeliveryPartner, true, &order, &with_code(" 4821 ")).unwrap();
        assert_eq!(plan.update.payment_status, Some(PaymentStatus::Paid));
        assert_eq!(plan.update.delivered_at, Some(now()));

        let online = Order {
            payment_status: PaymentStatus::Paid,
            ..in_transit(PaymentMethod::Online, 5)
        };
        let plan = plan_transition(Role::DeliveryPartner, true, &online, &with_code("4821"), now(), expiry()).unwrap();
        assert_eq!(plan.update.payment_status, None);
    }

    #[test]
    fn cancellation_records_a_reason() {
        let order = fixtures::order(OrderStatus::Pending, PaymentMethod::CashOnDelivery);

        let plan_without_note = plan(Role::Customer, true, &order, &to(OrderStatus::Cancelled)).unwrap();
        assert_eq!(
            plan_without_note.update.cancellation_reason.as_deref(),
            Some("Cancelled by CUSTOMER")
        );

        let request = Transition {
            note: Some("Out of stock".to_string()),
            ..to(OrderStatus::Cancelled)
        };
        let plan_with_note = plan(Role::RestaurantOwner, true, &order, &request).unwrap();
        assert_eq!(plan_with_note.update.cancellation_reason.as_deref(), Some("Out of stock"));
    }

    #[test]
    fn only_paid_online_orders_are_refundable() {
        let cash = fixtures::order(OrderStatus::Cancelled, PaymentMethod::CashOnDelivery);
        let res = plan(Role::Admin, true, &cash, &to(OrderStatus::Refunded));
        assert!(matches!(res, Err(TransitionError::NotRefundable)));

        let unpaid = fixtures::order(OrderStatus::Cancelled, PaymentMethod::Online);
        let res = plan(Role::Admin, true, &unpaid, &to(OrderStatus::Refunded));
        assert!(matches!(res, Err(TransitionError::NotRefundable)));

        let paid = fixtures::paid_online(OrderStatus::Cancelled);
        let plan = plan(Role::Admin, true, &paid, &to(OrderStatus::Refunded)).unwrap();
        assert_eq!(plan.update.payment_status, Some(PaymentStatus::Refunded));
    }

    #[test]
    fn an_order_is_refunded_only_once() {
        let refunded = Order {
            gateway_refund_id: Some("rfnd_1".to_string()),
            ..fixtures::paid_online(OrderStatus::Cancelled)
        };
        let res = plan(Role::Admin, true, &refunded, &to(OrderStatus::Refunded));
        assert!(matches!(res, Err(TransitionError::NotRefundable)));
    }

    #[test]
    fn merges_duplicate_items() {
        let merged = merge_items(vec![
            ("a".to_string(), 1),
            ("b".to_string(), 2),
            ("a".to_string(), 3),
        ]);

        assert_eq!(merged, vec![("a".to_string(), 4), ("b".to_string(), 2)]);
    }

    #[test]
    fn merging_keeps_single_items_untouched() {
        assert_eq!(merge_items(vec![("a".to_string(), 2)]), vec![("a".to_string(), 2)]);
        assert!(merge_items(vec![]).is_empty());
    }

    #[test]
    fn payments_on_cancelled_orders_await_a_refund() {
        assert!(awaits_refund(&fixtures::paid_online(OrderStatus::Cancelled)));
        assert!(!awaits_refund(&fixtures::paid_online(OrderStatus::Pending)));
        assert!(!awaits_refund(&fixtures::order(OrderStatus::Cancelled, PaymentMethod::Online)));

        let refunded = Order {
            gateway_refund_id: Some("rfnd_1".to_string()),
            ..fixtures::paid_online(OrderStatus::Cancelled)
        };
        assert!(!awaits_refund(&refunded));
    }
}
