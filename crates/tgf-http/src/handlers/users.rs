use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tgf_core::{domain::ProfilePhoto, service};

use super::limit;
use crate::{
    error::ApiError,
    extract::{in_range, ApiPath, Validate, ValidQuery},
    router::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/{user}/photos", get(user_photos))
}

const fn default_limit() -> i64 {
    10
}

#[derive(Debug, Deserialize)]
pub struct UserPhotosQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

impl Validate for UserPhotosQuery {
    fn validate(&self) -> Result<(), String> {
        in_range("limit", self.limit, 1, 50)
    }
}

#[derive(Debug, Serialize)]
pub struct UserPhotosResponse {
    /// The identifier as requested, not the resolved id.
    pub user_id: String,
    pub photos: Vec<ProfilePhoto>,
    pub count: usize,
}

async fn user_photos(
    State(state): State<AppState>,
    ApiPath(user): ApiPath<String>,
    ValidQuery(q): ValidQuery<UserPhotosQuery>,
) -> Result<Json<UserPhotosResponse>, ApiError> {
    let (name, limit) = (user.as_str(), limit(q.limit));
    let photos = state
        .runner
        .run("get_user_profile_photos", |client| async move {
            service::user_profile_photos(client.as_ref(), name, limit).await
        })
        .await?;
    Ok(Json(UserPhotosResponse {
        count: photos.len(),
        photos,
        user_id: user,
    }))
}
