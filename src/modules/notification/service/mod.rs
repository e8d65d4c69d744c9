pub mod push;
pub mod realtime;
pub mod scheduled;

use super::repository::history::{self, NotificationStatus};
use crate::{modules::order::repository::Order, types::Context};
use serde_json::json;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Realtime,
    Push,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Realtime => "realtime",
            Backend::Push => "push",
        }
    }
}

pub const ALL_BACKENDS: [Backend; 2] = [Backend::Realtime, Backend::Push];

pub mod types {
    use crate::modules::order::repository::Order;

    #[derive(Clone)]
    pub struct OrderPlaced {
        pub order: Order,
        pub recipient_id: String,
    }

    #[derive(Clone)]
    pub struct OrderStatusUpdated {
        pub order: Order,
        pub recipient_id: String,
    }

    #[derive(Clone)]
    pub struct OrderAssigned {
        pub order: Order,
        pub recipient_id: String,
    }

    #[derive(Clone)]
    pub struct VerificationCodeIssued {
        pub order: Order,
        pub code: String,
    }

    #[derive(Clone)]
    pub struct RefundRequired {
        pub order: Order,
        pub recipient_id: String,
    }

    #[derive(Clone)]
    pub struct Announcement {
        pub title: String,
        pub body: String,
        pub recipient_id: String,
        pub scheduled_notification_id: String,
    }
}

#[derive(Clone)]
pub enum Notification {
    OrderPlaced(types::OrderPlaced),
    OrderStatusUpdated(types::OrderStatusUpdated),
    OrderAssigned(types::OrderAssigned),
    VerificationCodeIssued(types::VerificationCodeIssued),
    RefundRequired(types::RefundRequired),
    Announcement(types::Announcement),
}

impl Notification {
    pub fn order_placed(order: Order, recipient_id: String) -> Self {
        Notification::OrderPlaced(types::OrderPlaced {
            order,
            recipient_id,
        })
    }

    pub fn order_status_updated(order: Order, recipient_id: String) -> Self {
        Notification::OrderStatusUpdated(types::OrderStatusUpdated {
            order,
            recipient_id,
        })
    }

    pub fn order_assigned(order: Order, recipient_id: String) -> Self {
        Notification::OrderAssigned(types::OrderAssigned {
            order,
            recipient_id,
        })
    }

    /// Always addressed to the customer, who hands the code to the rider.
    pub fn verification_code_issued(order: Order, code: String) -> Self {
        Notification::VerificationCodeIssued(types::VerificationCodeIssued { order, code })
    }

    /// Sent to admins when a payment lands on an order that can no longer be fulfilled.
    pub fn refund_required(order: Order, recipient_id: String) -> Self {
        Notification::RefundRequired(types::RefundRequired {
            order,
            recipient_id,
        })
    }

    pub fn announcement(
        title: String,
        body: String,
        recipient_id: String,
        scheduled_notification_id: String,
    ) -> Self {
        Notification::Announcement(types::Announcement {
            title,
            body,
            recipient_id,
            scheduled_notification_id,
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notification::OrderPlaced(_) => "ORDER_PLACED",
            Notification::OrderStatusUpdated(_) => "ORDER_STATUS_UPDATED",
            Notification::OrderAssigned(_) => "ORDER_ASSIGNED",
            Notification::VerificationCodeIssued(_) => "VERIFICATION_CODE_ISSUED",
            Notification::RefundRequired(_) => "REFUND_REQUIRED",
            Notification::Announcement(_) => "ANNOUNCEMENT",
        }
    }

    pub fn recipient_id(&self) -> &str {
        match self {
            Notification::OrderPlaced(n) => &n.recipient_id,
            Notification::OrderStatusUpdated(n) => &n.recipient_id,
            Notification::OrderAssigned(n) => &n.recipient_id,
            Notification::VerificationCodeIssued(n) => &n.order.customer_id,
            Notification::RefundRequired(n) => &n.recipient_id,
            Notification::Announcement(n) => &n.recipient_id,
        }
    }

    pub fn title(&self) -> String {
        match self {
            Notification::OrderPlaced(_) => "New order received".to_string(),
            Notification::OrderStatusUpdated(_) => "Order status updated".to_string(),
            Notification::OrderAssigned(_) => "New delivery assigned".to_string(),
            Notification::VerificationCodeIssued(_) => "Delivery verification code".to_string(),
            Notification::RefundRequired(_) => "Refund required".to_string(),
            Notification::Announcement(n) => n.title.clone(),
        }
    }

    pub fn body(&self) -> String {
        match self {
            Notification::OrderPlaced(n) => format!(
                "Order {} for {} is waiting for confirmation",
                n.order.id, n.order.total
            ),
            Notification::OrderStatusUpdated(n) => format!(
                "Order {} is now {}",
                n.order.id,
                n.order.status.as_str().replace('_', " ").to_lowercase()
            ),
            Notification::OrderAssigned(n) => {
                format!("Order {} is ready for pickup", n.order.id)
            }
            Notification::VerificationCodeIssued(n) => format!(
                "Share code {} with your rider to receive order {}",
                n.code, n.order.id
            ),
            Notification::RefundRequired(n) => format!(
                "Order {} was paid after it was cancelled, refund {}",
                n.order.id, n.order.total
            ),
            Notification::Announcement(n) => n.body.clone(),
        }
    }

    pub fn data(&self) -> serde_json::Value {
        match self {
            Notification::OrderPlaced(types::OrderPlaced { order, .. })
            | Notification::OrderStatusUpdated(types::OrderStatusUpdated { order, .. })
            | Notification::OrderAssigned(types::OrderAssigned { order, .. }) => json!({
                "order_id": order.id,
                "status": order.status,
            }),
            Notification::RefundRequired(n) => json!({
                "order_id": n.order.id,
                "status": n.order.status,
                "payment_status": n.order.payment_status,
            }),
            Notification::VerificationCodeIssued(n) => json!({
                "order_id": n.order.id,
                "status": n.order.status,
                "verification_code": n.code,
            }),
            Notification::Announcement(n) => json!({
                "scheduled_notification_id": n.scheduled_notification_id,
            }),
        }
    }
}

#[derive(Debug)]
pub enum Error {
    NotSent,
    NotConfigured,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Delivers through every backend and records the outcome. Never retried.
pub async fn send(ctx: Arc<Context>, notification: Notification, backends: &[Backend]) -> Result<()> {
    let mut delivered = false;

    for backend in backends {
        let result = match backend {
            Backend::Realtime => realtime::send(ctx.clone(), &notification),
            Backend::Push => push::send(ctx.clone(), &notification).await,
        };

        match result {
            Ok(_) => delivered = true,
            Err(Error::NotConfigured) => (),
            Err(err) => tracing::debug!(
                "{} notification to {} not delivered via {}: {:?}",
                notification.kind(),
                notification.recipient_id(),
                backend.as_str(),
                err
            ),
        }
    }

    let channel = backends
        .iter()
        .map(Backend::as_str)
        .collect::<Vec<_>>()
        .join(",");

    let _ = history::create(
        &ctx.db_conn.pool,
        history::CreateHistoryPayload {
            user_id: notification.recipient_id().to_string(),
            kind: notification.kind().to_string(),
            title: notification.title(),
            body: notification.body(),
            data: notification.data(),
            channel,
            status: match delivered {
                true => NotificationStatus::Sent,
                false => NotificationStatus::Failed,
            },
        },
    )
    .await;

    match delivered {
        true => Ok(()),
        false => Err(Error::NotSent),
    }
}

/// Fire-and-forget variant for request handlers.
pub fn dispatch(ctx: Arc<Context>, notification: Notification, backends: &'static [Backend]) {
    tokio::spawn(async move {
        let _ = send(ctx, notification, backends).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::order::{
        fixtures,
        repository::{OrderStatus, PaymentMethod, PaymentStatus},
    };

    #[test]
    fn refund_alert_goes_to_the_admin() {
        let order = fixtures::paid_online(OrderStatus::Cancelled);
        let notification = Notification::refund_required(order, "admin-1".to_string());

        assert_eq!(notification.kind(), "REFUND_REQUIRED");
        assert_eq!(notification.recipient_id(), "admin-1");
        assert_eq!(
            notification.body(),
            "Order order-1 was paid after it was cancelled, refund 270"
        );
        assert_eq!(notification.data()["payment_status"], json!(PaymentStatus::Paid));
    }

    #[test]
    fn verification_code_goes_to_the_customer() {
        let order = fixtures::order(OrderStatus::PickedUp, PaymentMethod::CashOnDelivery);
        let notification = Notification::verification_code_issued(order, "0042".to_string());

        assert_eq!(notification.recipient_id(), "customer-1");
        assert_eq!(notification.data()["verification_code"], "0042");
    }
}
