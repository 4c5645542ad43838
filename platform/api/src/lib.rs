use std::sync::Arc;

use async_graphql::{Error, ErrorExtensions};
use thiserror::Error;

mod messages;

pub use messages::{GENERIC_FAILURE, INSIGHTS_UNAVAILABLE, friendly_auth_message, load_failure};

/// Shared GraphQL result type.
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error, Clone)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("insufficient permissions")]
    Forbidden,
    #[error("resource not found")]
    NotFound,
    #[error("bad request: {0}")]
    InvalidInput(String),
    #[error("{metric} limit of {limit} reached for this plan")]
    LimitExceeded { metric: String, limit: u64 },
    /// Vendor-style auth failure, e.g. `auth/wrong-password`.
    #[error("{}", friendly_auth_message(.0))]
    Auth(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("internal server error")]
    Internal(Arc<anyhow::Error>),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "UNAUTHENTICATED",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::NotFound => "NOT_FOUND",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::LimitExceeded { .. } => "LIMIT_EXCEEDED",
            ApiError::Auth(_) => "AUTH",
            ApiError::Unavailable(_) => "UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self::Internal(Arc::new(err))
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn auth(code: impl Into<String>) -> Self {
        Self::Auth(code.into())
    }

    pub fn insights_unavailable() -> Self {
        Self::Unavailable(INSIGHTS_UNAVAILABLE.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::internal(value)
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> Error {
        if let ApiError::Internal(inner) = self {
            tracing::error!(error = %inner, "internal error");
        }
        let mut err = Error::new(self.to_string());
        err = err.extend_with(|_err, e| {
            e.set("code", self.code());
        });
        match self {
            ApiError::InvalidInput(_) => {
                err = err.extend_with(|_err, e| {
                    e.set("type", "BAD_REQUEST");
                });
            }
            ApiError::Auth(vendor) => {
                let vendor = vendor.clone();
                err = err.extend_with(move |_err, e| {
                    e.set("authCode", vendor.as_str());
                });
            }
            ApiError::LimitExceeded { metric, limit } => {
                let metric = metric.clone();
                let limit = *limit;
                err = err.extend_with(move |_err, e| {
                    e.set("metric", metric.as_str());
                    e.set("limit", limit);
                });
            }
            _ => {}
        }
        err
    }
}

/// Convert any error into a GraphQL error payload while hiding internals.
pub fn internal_error(err: impl Into<anyhow::Error>) -> Error {
    ApiError::internal(err.into()).extend()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_graphql::Value;

    fn extension(err: &Error, key: &str) -> Option<Value> {
        err.extensions
            .as_ref()
            .and_then(|map| map.get(key))
            .cloned()
    }

    #[test]
    fn internal_errors_are_masked() {
        let err = internal_error(anyhow::anyhow!("boom"));
        assert_eq!(err.message, "internal server error");
        assert_eq!(extension(&err, "code"), Some(Value::from("INTERNAL")));
    }

    #[test]
    fn auth_errors_carry_friendly_text_and_vendor_code() {
        let err = ApiError::auth("auth/wrong-password").extend();
        assert_eq!(err.message, "Incorrect password. Please try again.");
        assert_eq!(extension(&err, "code"), Some(Value::from("AUTH")));
        assert_eq!(
            extension(&err, "authCode"),
            Some(Value::from("auth/wrong-password"))
        );
    }

    #[test]
    fn limit_errors_report_metric() {
        let err = ApiError::LimitExceeded {
            metric: "contacts".into(),
            limit: 100,
        }
        .extend();
        assert_eq!(err.message, "contacts limit of 100 reached for this plan");
        assert_eq!(extension(&err, "code"), Some(Value::from("LIMIT_EXCEEDED")));
        assert_eq!(extension(&err, "limit"), Some(Value::from(100u64)));
    }

    #[test]
    fn unavailable_insights_message() {
        let err = ApiError::insights_unavailable().extend();
        assert_eq!(err.message, "AI is temporarily unavailable");
    }
}
