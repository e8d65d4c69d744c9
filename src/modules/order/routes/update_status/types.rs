pub mod request {
    use crate::modules::order::repository::OrderStatus;
    use serde::Deserialize;
    use validator::Validate;

    #[derive(Deserialize, Validate)]
    pub struct Payload {
        pub status: OrderStatus,
        #[validate(length(min = 4, max = 4))]
        pub verification_code: Option<String>,
        #[validate(length(max = 500))]
        pub note: Option<String>,
    }
}

pub mod response {
    use crate::modules::order::{repository::Order, service::TransitionError, status};
    use crate::utils::validation;
    use axum::{extract::Json, http::StatusCode, response::IntoResponse};
    use serde_json::json;
    use validator::ValidationErrors;

    pub enum Success {
        StatusUpdated(Order),
    }

    impl IntoResponse for Success {
        fn into_response(self) -> axum::response::Response {
            match self {
                Self::StatusUpdated(order) => (
                    StatusCode::OK,
                    Json(json!({
                        "progress": status::get_order_progress(order.status),
                        "order": order,
                    })),
                )
                    .into_response(),
            }
        }
    }

    pub enum Error {
        FailedToValidate(ValidationErrors),
        FailedToTransition(TransitionError),
    }

    impl IntoResponse for Error {
        fn into_response(self) -> axum::response::Response {
            match self {
                Self::FailedToValidate(errors) => validation::into_response(errors).into_response(),
                Self::FailedToTransition(err) => err.into_response(),
            }
        }
    }

    pub type Response = Result<Success, Error>;
}
