use super::{Error, Notification, Result};
use crate::{
    modules::realtime::{hub::events, room, Event},
    types::Context,
};
use serde_json::json;
use std::sync::Arc;

pub fn send(ctx: Arc<Context>, notification: &Notification) -> Result<()> {
    let delivered = ctx.realtime.publish(
        &room::user(notification.recipient_id()),
        Event::new(
            events::NOTIFICATION,
            json!({
                "kind": notification.kind(),
                "title": notification.title(),
                "body": notification.body(),
                "data": notification.data(),
            }),
        ),
    );

    match delivered {
        0 => Err(Error::NotSent),
        _ => Ok(()),
    }
}
