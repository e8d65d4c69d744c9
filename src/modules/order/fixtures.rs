use super::repository::{
    DeliveryAddress, Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus,
};
use bigdecimal::BigDecimal;
use chrono::Utc;
use sqlx::types::Json;

pub fn order(status: OrderStatus, payment_method: PaymentMethod) -> Order {
    Order {
        id: "order-1".to_string(),
        customer_id: "customer-1".to_string(),
        restaurant_id: "restaurant-1".to_string(),
        delivery_partner_id: None,
        delivery_address: Json(DeliveryAddress {
            address_id: "address-1".to_string(),
            label: "Home".to_string(),
            line1: "12 MG Road".to_string(),
            line2: None,
            landmark: None,
            lat: 12.9716,
            lng: 77.5946,
            location_id: Some("location-1".to_string()),
        }),
        items: Json(vec![OrderItem {
            menu_item_id: "item-1".to_string(),
            name: "Masala Dosa".to_string(),
            price: BigDecimal::from(120),
            quantity: 2,
        }]),
        sub_total: BigDecimal::from(240),
        delivery_fee: BigDecimal::from(30),
        total: BigDecimal::from(270),
        status,
        payment_method,
        payment_status: PaymentStatus::Pending,
        gateway_order_id: None,
        gateway_payment_id: None,
        gateway_refund_id: None,
        verification_code: None,
        verification_code_generated_at: None,
        notes: String::new(),
        cancellation_reason: None,
        delivered_at: None,
        dispatch_attempted_at: None,
        created_at: Utc::now(),
        updated_at: None,
    }
}

pub fn paid_online(status: OrderStatus) -> Order {
    Order {
        payment_status: PaymentStatus::Paid,
        gateway_order_id: Some("order_gw_1".to_string()),
        gateway_payment_id: Some("pay_gw_1".to_string()),
        ..order(status, PaymentMethod::Online)
    }
}
