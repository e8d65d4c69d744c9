use crate::types::PaymentContext;
use bigdecimal::{BigDecimal, ToPrimitive};
use hmac::{Hmac, Mac};
use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug)]
pub enum Error {
    InvalidAmount,
    RequestNotSent,
    InvalidHttpResponseStatusCode,
    FailedToDecodeResponse,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct Refund {
    pub id: String,
    pub amount: i64,
}

struct GatewayRequest {
    route: String,
    method: Method,
    body: serde_json::Value,
}

async fn send_request<R: DeserializeOwned>(
    payment: &PaymentContext,
    request: GatewayRequest,
) -> Result<R, Error> {
    let url = format!("{}{}", payment.api_endpoint, request.route);

    let res = reqwest::Client::new()
        .request(request.method, url)
        .basic_auth(&payment.key_id, Some(&payment.key_secret))
        .json(&request.body)
        .send()
        .await
        .map_err(|err| {
            tracing::error!("Failed to send payment gateway request: {}", err);
            Error::RequestNotSent
        })?;

    let status = res.status();
    let data = res.text().await.map_err(|err| {
        tracing::error!("Failed to read payment gateway response: {}", err);
        Error::FailedToDecodeResponse
    })?;

    if status != StatusCode::OK {
        tracing::error!(
            "Payment gateway responded to {} with {}: {}",
            request.route,
            status,
            data
        );
        return Err(Error::InvalidHttpResponseStatusCode);
    }

    serde_json::from_str::<R>(&data).map_err(|err| {
        tracing::error!("Failed to decode payment gateway response {}: {}", data, err);
        Error::FailedToDecodeResponse
    })
}

/// Converts a money amount into the gateway's smallest currency unit.
pub fn to_subunits(amount: &BigDecimal) -> Result<i64, Error> {
    (amount * BigDecimal::from(100))
        .round(0)
        .to_i64()
        .filter(|subunits| *subunits > 0)
        .ok_or(Error::InvalidAmount)
}

pub async fn create_order(
    payment: &PaymentContext,
    order_id: &str,
    amount: &BigDecimal,
) -> Result<GatewayOrder, Error> {
    send_request(
        payment,
        GatewayRequest {
            route: "/orders".to_string(),
            method: Method::POST,
            body: json!({
                "amount": to_subunits(amount)?,
                "currency": payment.currency,
                "receipt": order_id,
                "notes": { "order_id": order_id },
            }),
        },
    )
    .await
}

/// Tagged with the order id so a refund can be matched to its order on the
/// gateway dashboard.
fn refund_body(order_id: &str, amount: &BigDecimal) -> Result<serde_json::Value, Error> {
    Ok(json!({
        "amount": to_subunits(amount)?,
        "receipt": order_id,
        "notes": { "order_id": order_id },
    }))
}

pub async fn refund(
    payment: &PaymentContext,
    payment_id: &str,
    order_id: &str,
    amount: &BigDecimal,
) -> Result<Refund, Error> {
    send_request(
        payment,
        GatewayRequest {
            route: format!("/payments/{}/refund", payment_id),
            method: Method::POST,
            body: refund_body(order_id, amount)?,
        },
    )
    .await
}

/// Checks the checkout signature, `hex(HMAC-SHA256(secret, "{order_id}|{payment_id}"))`.
/// The comparison runs in constant time.
pub fn verify_signature(
    secret: &str,
    gateway_order_id: &str,
    gateway_payment_id: &str,
    signature: &str,
) -> bool {
    let Ok(signature) = hex::decode(signature.trim()) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };

    mac.update(format!("{}|{}", gateway_order_id, gateway_payment_id).as_bytes());
    mac.verify_slice(&signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const SIGNATURE: &str = "85cbc6036124891c4d0280fbb7cd83804f87a66f2eb485a89af574086f592cbc";

    #[test]
    fn accepts_a_valid_signature() {
        assert!(verify_signature(
            "test_secret",
            "order_ABC123",
            "pay_XYZ789",
            SIGNATURE
        ));
    }

    #[test]
    fn rejects_a_tampered_signature() {
        assert!(!verify_signature(
            "test_secret",
            "order_ABC123",
            "pay_OTHER",
            SIGNATURE
        ));
        assert!(!verify_signature(
            "other_secret",
            "order_ABC123",
            "pay_XYZ789",
            SIGNATURE
        ));
        assert!(!verify_signature(
            "test_secret",
            "order_ABC123",
            "pay_XYZ789",
            "not-hex"
        ));
        assert!(!verify_signature("test_secret", "order_ABC123", "pay_XYZ789", ""));
    }

    #[test]
    fn converts_amounts_to_subunits() {
        let amount = BigDecimal::from_str("249.50").unwrap();
        assert_eq!(to_subunits(&amount).unwrap(), 24950);
        assert_eq!(to_subunits(&BigDecimal::from(30)).unwrap(), 3000);
        assert!(to_subunits(&BigDecimal::from(0)).is_err());
    }

    #[test]
    fn refund_carries_the_order_as_receipt() {
        let body = refund_body("01ORDER", &BigDecimal::from_str("270.00").unwrap()).unwrap();
        assert_eq!(body["amount"], 27000);
        assert_eq!(body["receipt"], "01ORDER");
        assert_eq!(body["notes"]["order_id"], "01ORDER");
        assert!(refund_body("01ORDER", &BigDecimal::from(0)).is_err());
    }
}
