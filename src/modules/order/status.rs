use super::repository::OrderStatus;
use crate::modules::user::repository::Role;
use chrono::{DateTime, Duration, Utc};
use rand_core::{OsRng, RngCore};

/// Adjacency table of the order lifecycle.
pub const NEXT_VALID_STATUSES: [(OrderStatus, &[OrderStatus]); 9] = [
    (
        OrderStatus::Pending,
        &[OrderStatus::Confirmed, OrderStatus::Cancelled],
    ),
    (
        OrderStatus::Confirmed,
        &[OrderStatus::Preparing, OrderStatus::Cancelled],
    ),
    (OrderStatus::Preparing, &[OrderStatus::Ready]),
    (OrderStatus::Ready, &[OrderStatus::PickedUp]),
    (OrderStatus::PickedUp, &[OrderStatus::OutForDelivery]),
    (OrderStatus::OutForDelivery, &[OrderStatus::Delivered]),
    (OrderStatus::Delivered, &[]),
    (OrderStatus::Cancelled, &[OrderStatus::Refunded]),
    (OrderStatus::Refunded, &[]),
];

pub fn next_valid_statuses(status: OrderStatus) -> &'static [OrderStatus] {
    NEXT_VALID_STATUSES
        .iter()
        .find(|(from, _)| *from == status)
        .map(|(_, next)| *next)
        .unwrap_or(&[])
}

pub fn can_update_order_status(current: OrderStatus, next: OrderStatus) -> bool {
    next_valid_statuses(current).contains(&next)
}

pub fn get_order_progress(status: OrderStatus) -> u8 {
    match status {
        OrderStatus::Pending => 10,
        OrderStatus::Confirmed => 25,
        OrderStatus::Preparing => 40,
        OrderStatus::Ready => 55,
        OrderStatus::PickedUp => 70,
        OrderStatus::OutForDelivery => 85,
        OrderStatus::Delivered => 100,
        OrderStatus::Cancelled | OrderStatus::Refunded => 0,
    }
}

pub fn is_order_cancellable(status: OrderStatus) -> bool {
    matches!(status, OrderStatus::Pending | OrderStatus::Confirmed)
}

/// Which target statuses each role may request. Admins are still bound by
/// the adjacency table.
pub fn can_role_set_status(role: Role, next: OrderStatus) -> bool {
    match role {
        Role::Admin => true,
        Role::Customer => next == OrderStatus::Cancelled,
        Role::RestaurantOwner => matches!(
            next,
            OrderStatus::Confirmed
                | OrderStatus::Preparing
                | OrderStatus::Ready
                | OrderStatus::Cancelled
        ),
        Role::DeliveryPartner => matches!(
            next,
            OrderStatus::PickedUp | OrderStatus::OutForDelivery | OrderStatus::Delivered
        ),
    }
}

pub fn is_verification_code_expired(
    generated_at: DateTime<Utc>,
    now: DateTime<Utc>,
    expiry: Duration,
) -> bool {
    now - generated_at > expiry
}

const CODE_SPACE: u32 = 10_000;

pub fn generate_verification_code() -> String {
    // Rejection sampling keeps every code equally likely.
    let limit = u32::MAX - u32::MAX % CODE_SPACE;
    loop {
        let value = OsRng.next_u32();
        if value < limit {
            return format!("{:04}", value % CODE_SPACE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL_PATH: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::PickedUp,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
    ];

    #[test]
    fn every_status_has_an_entry() {
        for status in OrderStatus::ALL {
            assert!(
                NEXT_VALID_STATUSES.iter().any(|(from, _)| *from == status),
                "{status} missing from table"
            );
        }
    }

    #[test]
    fn transitions_follow_the_table() {
        let allowed = [
            (OrderStatus::Pending, OrderStatus::Confirmed),
            (OrderStatus::Pending, OrderStatus::Cancelled),
            (OrderStatus::Confirmed, OrderStatus::Preparing),
            (OrderStatus::Confirmed, OrderStatus::Cancelled),
            (OrderStatus::Preparing, OrderStatus::Ready),
            (OrderStatus::Ready, OrderStatus::PickedUp),
            (OrderStatus::PickedUp, OrderStatus::OutForDelivery),
            (OrderStatus::OutForDelivery, OrderStatus::Delivered),
            (OrderStatus::Cancelled, OrderStatus::Refunded),
        ];

        for current in OrderStatus::ALL {
            for next in OrderStatus::ALL {
                assert_eq!(
                    can_update_order_status(current, next),
                    allowed.contains(&(current, next)),
                    "{current} -> {next}"
                );
            }
        }
    }

    #[test]
    fn terminal_statuses_have_no_successors() {
        assert!(next_valid_statuses(OrderStatus::Delivered).is_empty());
        assert!(next_valid_statuses(OrderStatus::Refunded).is_empty());
    }

    #[test]
    fn progress_increases_along_the_canonical_path() {
        for pair in CANONICAL_PATH.windows(2) {
            assert!(get_order_progress(pair[0]) < get_order_progress(pair[1]));
        }
        assert_eq!(get_order_progress(OrderStatus::Delivered), 100);
        assert_eq!(get_order_progress(OrderStatus::Cancelled), 0);
        assert_eq!(get_order_progress(OrderStatus::Refunded), 0);
    }

    #[test]
    fn only_early_orders_are_cancellable() {
        for status in OrderStatus::ALL {
            assert_eq!(
                is_order_cancellable(status),
                status == OrderStatus::Pending || status == OrderStatus::Confirmed
            );
        }
    }

    #[test]
    fn cancellable_matches_the_table() {
        for status in OrderStatus::ALL {
            assert_eq!(
                is_order_cancellable(status),
                can_update_order_status(status, OrderStatus::Cancelled)
            );
        }
    }

    #[test]
    fn role_gates() {
        assert!(can_role_set_status(Role::Customer, OrderStatus::Cancelled));
        assert!(!can_role_set_status(Role::Customer, OrderStatus::Confirmed));
        assert!(can_role_set_status(Role::RestaurantOwner, OrderStatus::Ready));
        assert!(!can_role_set_status(Role::RestaurantOwner, OrderStatus::PickedUp));
        assert!(!can_role_set_status(Role::RestaurantOwner, OrderStatus::Refunded));
        assert!(can_role_set_status(Role::DeliveryPartner, OrderStatus::Delivered));
        assert!(!can_role_set_status(Role::DeliveryPartner, OrderStatus::Cancelled));
        for status in OrderStatus::ALL {
            assert!(can_role_set_status(Role::Admin, status));
        }
    }

    #[test]
    fn verification_code_expiry_window() {
        let generated_at = Utc::now();
        let expiry = Duration::minutes(30);

        assert!(!is_verification_code_expired(generated_at, generated_at, expiry));
        assert!(!is_verification_code_expired(
            generated_at,
            generated_at + Duration::minutes(30),
            expiry
        ));
        assert!(is_verification_code_expired(
            generated_at,
            generated_at + Duration::minutes(30) + Duration::seconds(1),
            expiry
        ));
        assert!(!is_verification_code_expired(
            generated_at,
            generated_at + Duration::minutes(59),
            Duration::minutes(60)
        ));
    }

    #[test]
    fn verification_codes_are_four_digits() {
        for _ in 0..100 {
            let code = generate_verification_code();
            assert_eq!(code.len(), 4);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
