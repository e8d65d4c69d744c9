mod assign;
mod cancel;
mod create;
mod get;
mod history;
mod list;
mod update_status;
mod verification_code;

use crate::types::Context;
use axum::routing::Router;
use std::sync::Arc;

pub fn get_router() -> Router<Arc<Context>> {
    Router::new()
        .merge(create::get_router())
        .merge(list::get_router())
        .merge(get::get_router())
        .merge(update_status::get_router())
        .merge(cancel::get_router())
        .merge(assign::get_router())
        .merge(history::get_router())
        .merge(verification_code::get_router())
}
