//! Extractors that reject bad input with 422 and a `{"detail"}` body.

use axum::{
    extract::{FromRequestParts, Path, Query},
    http::request::Parts,
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Bounds check on a deserialized query.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// `Query<T>` that also runs [`Validate`].
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::unprocessable(e.body_text()))?;
        value.validate().map_err(ApiError::unprocessable)?;
        Ok(Self(value))
    }
}

/// `Path<T>` whose rejection is a 422.
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::unprocessable(e.body_text()))?;
        Ok(Self(value))
    }
}

/// `min <= value <= max`, named for the error message.
pub fn in_range(name: &str, value: i64, min: i64, max: i64) -> Result<(), String> {
    if value < min {
        return Err(format!("{name}: must be greater than or equal to {min}"));
    }
    if value > max {
        return Err(format!("{name}: must be less than or equal to {max}"));
    }
    Ok(())
}

pub fn not_empty(name: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{name}: must have at least 1 character"));
    }
    Ok(())
}
