pub mod request {
    use crate::modules::user::repository::Role;
    use regex::Regex;
    use serde::Deserialize;
    use std::borrow::Cow;
    use std::sync::OnceLock;
    use validator::{Validate, ValidationError};

    static PHONE_NUMBER_REGEX: OnceLock<Regex> = OnceLock::new();

    fn validate_phone_number(phone_number: &str) -> Result<(), ValidationError> {
        let regex = PHONE_NUMBER_REGEX.get_or_init(|| {
            Regex::new(r"^\+?\d{7,15}$").expect("Invalid phone number regex")
        });

        match regex.is_match(phone_number) {
            true => Ok(()),
            false => Err(ValidationError::new("INVALID_PHONE_NUMBER").with_message(
                Cow::from("Phone number must contain 7 to 15 digits with an optional leading +"),
            )),
        }
    }

    #[derive(Deserialize, Validate)]
    pub struct Payload {
        #[validate(email(code = "INVALID_USER_EMAIL", message = "Invalid email address"))]
        pub email: String,
        #[validate(custom(function = "validate_phone_number"))]
        pub phone_number: String,
        #[validate(length(min = 1, max = 100))]
        pub first_name: String,
        #[validate(length(min = 1, max = 100))]
        pub last_name: String,
        #[validate(length(
            min = 8,
            max = 128,
            code = "WEAK_PASSWORD",
            message = "Password must be at least 8 characters long"
        ))]
        pub password: String,
        pub role: Option<Role>,
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn payload() -> Payload {
            Payload {
                email: "owl@nightbite.test".to_string(),
                phone_number: "+919876543210".to_string(),
                first_name: "Night".to_string(),
                last_name: "Owl".to_string(),
                password: "midnight-snack".to_string(),
                role: None,
            }
        }

        #[test]
        fn accepts_well_formed_payload() {
            assert!(payload().validate().is_ok());
        }

        #[test]
        fn rejects_bad_phone_number() {
            let mut p = payload();
            p.phone_number = "12-34".to_string();
            let errors = p.validate().unwrap_err();
            assert!(errors.field_errors().contains_key("phone_number"));
        }

        #[test]
        fn rejects_short_password() {
            let mut p = payload();
            p.password = "short".to_string();
            let errors = p.validate().unwrap_err();
            assert!(errors.field_errors().contains_key("password"));
        }
    }
}

pub mod response {
    use crate::modules::{auth::repository::Session, user::repository::User};
    use crate::utils::validation;
    use axum::{extract::Json, http::StatusCode, response::IntoResponse};
    use serde_json::json;
    use validator::ValidationErrors;

    pub enum Success {
        SignedUp(User, Session),
    }

    impl IntoResponse for Success {
        fn into_response(self) -> axum::response::Response {
            match self {
                Self::SignedUp(user, session) => (
                    StatusCode::CREATED,
                    Json(json!({
                        "user": user,
                        "access_token": session.access_token,
                        "refresh_token": session.refresh_token,
                    })),
                )
                    .into_response(),
            }
        }
    }

    pub enum Error {
        FailedToValidate(ValidationErrors),
        RoleNotAllowed,
        EmailAlreadyInUse,
        PhoneNumberAlreadyInUse,
        SignupFailed,
        UnexpectedError,
    }

    impl IntoResponse for Error {
        fn into_response(self) -> axum::response::Response {
            match self {
                Self::FailedToValidate(errors) => validation::into_response(errors).into_response(),
                Self::RoleNotAllowed => (
                    StatusCode::FORBIDDEN,
                    Json(json!({ "error": "Admin accounts cannot be self-registered" })),
                )
                    .into_response(),
                Self::EmailAlreadyInUse => (
                    StatusCode::CONFLICT,
                    Json(json!({ "error": "Email already in use" })),
                )
                    .into_response(),
                Self::PhoneNumberAlreadyInUse => (
                    StatusCode::CONFLICT,
                    Json(json!({ "error": "Phone number already in use" })),
                )
                    .into_response(),
                Self::SignupFailed => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Sign up failed!" })),
                )
                    .into_response(),
                Self::UnexpectedError => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Sorry an error occurred" })),
                )
                    .into_response(),
            }
        }
    }

    pub type Response = Result<Success, Error>;
}
