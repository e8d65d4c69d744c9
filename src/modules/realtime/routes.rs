use super::hub::{events, room, Event};
use crate::{
    modules::{auth::middleware::Auth, order, restaurant, user::repository::Role},
    types::Context,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{self, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::{stream, Stream, StreamExt};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

fn to_sse(event: Event) -> sse::Event {
    let data = json!({ "payload": event.payload, "sent_at": event.sent_at });
    sse::Event::default().event(event.name).data(data.to_string())
}

async fn open_stream(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
) -> Result<Sse<impl Stream<Item = Result<sse::Event, Infallible>>>, Response> {
    let user = &auth.user;
    let mut rooms = vec![room::user(&user.id), room::role(user.role)];

    if user.role == Role::RestaurantOwner {
        match restaurant::repository::find_by_owner_id(&ctx.db_conn.pool, &user.id).await {
            Ok(Some(restaurant)) => rooms.push(room::restaurant(&restaurant.id)),
            Ok(None) => (),
            Err(_) => {
                return Err((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Failed to open event stream" })),
                )
                    .into_response())
            }
        }
    }

    let subscription = ctx.realtime.connect(&user.id, rooms);
    let connected = Event::new(
        events::CONNECTED,
        json!({ "session_id": subscription.id(), "user_id": user.id }),
    );

    let events = stream::once(async move { connected })
        .chain(subscription.into_stream())
        .map(|event| Ok(to_sse(event)));

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

fn session_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Realtime session not found" })),
    )
        .into_response()
}

/// Only the user who opened a session may change its rooms.
fn owns_session(ctx: &Context, auth: &Auth, session_id: &str) -> bool {
    ctx.realtime
        .session_owner(session_id)
        .is_some_and(|owner| owner == auth.user.id)
}

async fn join_order_room(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Path((session_id, order_id)): Path<(String, String)>,
) -> Response {
    if !owns_session(&ctx, &auth, &session_id) {
        return session_not_found();
    }

    if let Err(err) = order::service::find_for_party(&ctx, &auth.user, &order_id).await {
        return err.into_response();
    }

    match ctx.realtime.join(&session_id, room::order(&order_id)) {
        true => (StatusCode::OK, Json(json!({ "room": room::order(&order_id) }))).into_response(),
        false => session_not_found(),
    }
}

async fn leave_order_room(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Path((session_id, order_id)): Path<(String, String)>,
) -> Response {
    if !owns_session(&ctx, &auth, &session_id) {
        return session_not_found();
    }

    ctx.realtime.leave(&session_id, &room::order(&order_id));
    StatusCode::NO_CONTENT.into_response()
}

pub fn get_router() -> Router<Arc<Context>> {
    Router::new()
        .route("/events", get(open_stream))
        .route(
            "/sessions/:session_id/orders/:order_id",
            post(join_order_room).delete(leave_order_room),
        )
}
