use super::{Error, Notification, Result};
use crate::{modules::notification::repository::push_subscription, types::Context};
use oauth_fcm::{send_fcm_message, FcmNotification};
use std::sync::Arc;

pub async fn send(ctx: Arc<Context>, notification: &Notification) -> Result<()> {
    let google = ctx.google.as_ref().ok_or(Error::NotConfigured)?;

    let tokens =
        push_subscription::find_tokens_by_user_id(&ctx.db_conn.pool, notification.recipient_id())
            .await
            .map_err(|_| Error::NotSent)?;

    let mut delivered = false;
    for token in tokens {
        match send_fcm_message(
            &token,
            Some(FcmNotification {
                title: notification.title(),
                body: notification.body(),
            }),
            Some(notification.data()),
            &google.fcm_token_manager,
            &google.fcm_project_id,
        )
        .await
        {
            Ok(_) => delivered = true,
            Err(err) => tracing::warn!(
                "Failed to send push notification to user {}: {:?}",
                notification.recipient_id(),
                err
            ),
        }
    }

    match delivered {
        true => Ok(()),
        false => Err(Error::NotSent),
    }
}
