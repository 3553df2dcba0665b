//! Acting-customer extraction.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::CustomerId;

use crate::error::ApiError;

/// Header carrying the authenticated customer's id.
pub const CUSTOMER_HEADER: &str = "x-customer-id";

/// The customer a request acts on behalf of.
///
/// Authentication happens upstream; a missing or malformed id is rejected
/// with 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Customer(pub CustomerId);

impl<S: Send + Sync> FromRequestParts<S> for Customer {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(CUSTOMER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .map(|id| Customer(CustomerId::new(id)))
            .ok_or(ApiError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<Customer, ApiError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(CUSTOMER_HEADER, value);
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        Customer::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_positive_id() {
        let customer = extract(Some(" 42 ")).await.unwrap();
        assert_eq!(customer, Customer(CustomerId::new(42)));
    }

    #[tokio::test]
    async fn rejects_missing_or_bad_ids() {
        for header in [None, Some(""), Some("abc"), Some("0"), Some("-3")] {
            assert!(
                matches!(extract(header).await, Err(ApiError::Unauthorized)),
                "{header:?}"
            );
        }
    }
}
