use super::types::{request, response};
use crate::{
    modules::{
        auth::middleware::Auth,
        order::service::{self, Transition},
    },
    types::Context,
};
use std::sync::Arc;
use validator::Validate;

pub async fn service(
    ctx: Arc<Context>,
    auth: Auth,
    order_id: String,
    payload: request::Payload,
) -> response::Response {
    payload
        .validate()
        .map_err(response::Error::FailedToValidate)?;

    service::transition(
        ctx,
        &auth.user,
        &order_id,
        Transition {
            status: payload.status,
            verification_code: payload.verification_code,
            note: payload.note,
        },
    )
    .await
    .map(response::Success::StatusUpdated)
    .map_err(response::Error::FailedToTransition)
}
