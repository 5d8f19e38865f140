use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tgf_core::Error;

/// Error body sent to HTTP clients: `{"detail": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
    /// Seconds for the `Retry-After` header.
    pub retry_after: Option<u32>,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
            retry_after: None,
        }
    }

    pub fn unprocessable(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut res = (self.status, Json(json!({ "detail": self.detail }))).into_response();
        if let Some(secs) = self.retry_after {
            res.headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        res
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::PoolExhausted => StatusCode::SERVICE_UNAVAILABLE,
            Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::SessionsDeauthorized { .. } | Error::ScopeDenied => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::MalformedCursor | Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %err, status = status.as_u16(), "api_error");
        }

        let mut api = Self::new(status, err.to_string());
        if let Error::RateLimited { retry_after_secs } = err {
            api.retry_after = Some(retry_after_secs);
        }
        api
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: Error) -> StatusCode {
        ApiError::from(err).status
    }

    #[test]
    fn session_layer_errors_map_to_distinct_statuses() {
        assert_eq!(status_of(Error::PoolExhausted), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status_of(Error::RateLimited {
                retry_after_secs: 3
            }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_of(Error::SessionsDeauthorized {
                reason: "AUTH_KEY_UNREGISTERED".into()
            }),
            StatusCode::FORBIDDEN
        );
        assert_eq!(status_of(Error::ScopeDenied), StatusCode::FORBIDDEN);
        assert_eq!(status_of(Error::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(Error::MalformedCursor), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(Error::rpc(400, "CHANNEL_PRIVATE", None)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn rate_limit_sets_retry_after() {
        let res = ApiError::from(Error::RateLimited {
            retry_after_secs: 42,
        })
        .into_response();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(res.headers()[RETRY_AFTER], "42");
    }

    #[test]
    fn detail_keeps_the_original_message() {
        let api = ApiError::from(Error::External("boom".into()));
        assert_eq!(api.detail, "external error: boom");
    }
}
