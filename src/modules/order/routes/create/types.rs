pub mod request {
    use crate::modules::order::repository::PaymentMethod;
    use serde::{Deserialize, Serialize};
    use validator::Validate;

    #[derive(Deserialize, Serialize, Validate)]
    pub struct Item {
        #[validate(length(min = 1))]
        pub menu_item_id: String,
        #[validate(range(min = 1, max = 50))]
        pub quantity: i32,
    }

    #[derive(Deserialize, Validate)]
    pub struct Payload {
        #[validate(length(min = 1))]
        pub restaurant_id: String,
        #[validate(length(min = 1))]
        pub address_id: String,
        #[validate(length(min = 1, message = "An order needs at least one item"), nested)]
        pub items: Vec<Item>,
        pub payment_method: PaymentMethod,
        #[validate(length(max = 500))]
        pub notes: Option<String>,
    }
}

pub mod response {
    use crate::modules::order::{repository::Order, service::PlaceOrderError};
    use crate::utils::validation;
    use axum::{extract::Json, http::StatusCode, response::IntoResponse};
    use serde_json::json;
    use validator::ValidationErrors;

    pub enum Success {
        OrderPlaced(Order),
    }

    impl IntoResponse for Success {
        fn into_response(self) -> axum::response::Response {
            match self {
                Self::OrderPlaced(order) => {
                    (StatusCode::CREATED, Json(json!(order))).into_response()
                }
            }
        }
    }

    pub enum Error {
        Forbidden(axum::response::Response),
        FailedToValidate(ValidationErrors),
        FailedToPlaceOrder(PlaceOrderError),
    }

    impl IntoResponse for Error {
        fn into_response(self) -> axum::response::Response {
            match self {
                Self::Forbidden(res) => res,
                Self::FailedToValidate(errors) => validation::into_response(errors).into_response(),
                Self::FailedToPlaceOrder(err) => err.into_response(),
            }
        }
    }

    pub type Response = Result<Success, Error>;
}
