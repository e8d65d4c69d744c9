use axum::{http::StatusCode, Json};
use regex::Regex;
use serde_json::json;
use std::borrow::Cow;
use std::sync::OnceLock;
use validator::{ValidationError, ValidationErrors};

pub fn into_response(errors: ValidationErrors) -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({ "errors": errors })))
}

fn time_of_day_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").expect("Invalid time of day regex")
    })
}

pub fn validate_time_of_day(time_str: &str) -> Result<(), ValidationError> {
    match time_of_day_regex().is_match(time_str) {
        true => Ok(()),
        false => Err(ValidationError::new("INVALID_TIME_OF_DAY")
            .with_message(Cow::from("Time must be in 24 hour format (e.g: 22:30)"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_times() {
        assert!(validate_time_of_day("00:00").is_ok());
        assert!(validate_time_of_day("23:59").is_ok());
        assert!(validate_time_of_day("09:05").is_ok());
    }

    #[test]
    fn rejects_invalid_times() {
        assert!(validate_time_of_day("24:00").is_err());
        assert!(validate_time_of_day("9:00").is_err());
        assert!(validate_time_of_day("12:60").is_err());
        assert!(validate_time_of_day("noon").is_err());
    }
}
