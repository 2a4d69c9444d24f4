//! Extractors that reject with the API's JSON envelope instead of axum's
//! plain-text rejections.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use common::{Money, RecordId};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// JSON request body.
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::Validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Query string parameters.
pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::Validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Parses a body that may be absent, defaulting when it is.
pub fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::Validation(format!("Invalid JSON body: {e}")))
}

/// Converts a major-unit amount from a request body.
pub fn money(amount: f64, field: &str) -> Result<Money, ApiError> {
    Money::try_from_major(amount)
        .ok_or_else(|| ApiError::Validation(format!("{field} is out of range")))
}

/// Parses a record id path segment.
pub fn record_id(raw: &str) -> Result<RecordId, ApiError> {
    RecordId::parse(raw).map_err(|_| ApiError::Validation(format!("Invalid ID format: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Reason {
        reason: Option<String>,
    }

    #[test]
    fn test_optional_json() {
        assert_eq!(optional_json::<Reason>(&Bytes::new()).unwrap(), Reason::default());
        assert_eq!(
            optional_json::<Reason>(&Bytes::from_static(br#"{"reason":"late"}"#))
                .unwrap()
                .reason
                .as_deref(),
            Some("late")
        );
        assert!(optional_json::<Reason>(&Bytes::from_static(b"{nope")).is_err());
    }

    #[test]
    fn test_money_rejects_out_of_range() {
        assert_eq!(money(12.34, "amount").unwrap(), Money::from_cents(1234));
        assert!(matches!(
            money(1e17, "amount"),
            Err(ApiError::Validation(m)) if m == "amount is out of range"
        ));
        assert!(money(f64::NAN, "price").is_err());
        assert!(money(f64::NEG_INFINITY, "price").is_err());
    }

    #[test]
    fn test_record_id() {
        assert!(record_id("not-a-uuid").is_err());
        let id = RecordId::new();
        assert_eq!(record_id(&id.to_string()).unwrap(), id);
    }
}
