use super::types::{request, response};
use crate::{
    modules::{
        auth::middleware::Auth,
        order::service::{self, PlaceOrder},
        user::repository::Role,
    },
    types::Context,
};
use std::sync::Arc;
use validator::Validate;

pub async fn service(ctx: Arc<Context>, auth: Auth, payload: request::Payload) -> response::Response {
    auth.require(&[Role::Customer])
        .map_err(response::Error::Forbidden)?;

    payload
        .validate()
        .map_err(response::Error::FailedToValidate)?;

    let order = service::place_order(
        ctx,
        &auth.user,
        PlaceOrder {
            restaurant_id: payload.restaurant_id,
            address_id: payload.address_id,
            items: payload
                .items
                .into_iter()
                .map(|item| (item.menu_item_id, item.quantity))
                .collect(),
            payment_method: payload.payment_method,
            notes: payload.notes.unwrap_or_default(),
        },
    )
    .await
    .map_err(response::Error::FailedToPlaceOrder)?;

    Ok(response::Success::OrderPlaced(order))
}
