use super::types::{request, response};
use crate::{
    modules::{delivery, order::repository, restaurant, user::repository::Role},
    types::Context,
};
use std::sync::Arc;

/// Narrows the listing to what the caller's role may see. `None` means the
/// caller has nothing to see yet.
async fn scope(
    ctx: &Context,
    payload: &request::Payload,
) -> Result<Option<repository::Filters>, response::Error> {
    let user = &payload.auth.user;
    let status = payload.filters.status;

    let filters = match user.role {
        Role::Admin => repository::Filters {
            restaurant_id: payload.filters.restaurant_id.clone(),
            status,
            ..Default::default()
        },
        Role::Customer => repository::Filters {
            customer_id: Some(user.id.clone()),
            status,
            ..Default::default()
        },
        Role::RestaurantOwner => {
            let restaurant =
                restaurant::repository::find_by_owner_id(&ctx.db_conn.pool, &user.id)
                    .await
                    .map_err(|_| response::Error::FailedToFetchOrders)?;

            let Some(restaurant) = restaurant else {
                return Ok(None);
            };

            repository::Filters {
                restaurant_id: Some(restaurant.id),
                status,
                ..Default::default()
            }
        }
        Role::DeliveryPartner => {
            let partner = delivery::repository::find_by_user_id(&ctx.db_conn.pool, &user.id)
                .await
                .map_err(|_| response::Error::FailedToFetchOrders)?;

            let Some(partner) = partner else {
                return Ok(None);
            };

            repository::Filters {
                delivery_partner_id: Some(partner.id),
                status,
                ..Default::default()
            }
        }
    };

    Ok(Some(filters))
}

pub async fn service(ctx: Arc<Context>, payload: request::Payload) -> response::Response {
    let Some(filters) = scope(&ctx, &payload).await? else {
        return Ok(response::Success::Orders(
            payload.pagination.paginate(vec![], 0),
        ));
    };

    repository::find_many(&ctx.db_conn.pool, payload.pagination, filters)
        .await
        .map(response::Success::Orders)
        .map_err(|_| response::Error::FailedToFetchOrders)
}
