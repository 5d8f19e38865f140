use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tgf_core::{
    cursor,
    domain::{ChannelSearchResult, Post},
    service,
};

use super::limit;
use crate::{
    error::ApiError,
    extract::{in_range, not_empty, Validate, ValidQuery},
    router::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(search_posts))
        .route("/channels", get(search_channels))
}

const fn default_posts_limit() -> i64 {
    100
}

const fn default_channels_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize)]
pub struct PostSearchQuery {
    pub tag: String,
    pub cursor: Option<String>,
    #[serde(default = "default_posts_limit")]
    pub limit: i64,
}

impl Validate for PostSearchQuery {
    fn validate(&self) -> Result<(), String> {
        not_empty("tag", &self.tag)?;
        in_range("limit", self.limit, 1, 100)
    }
}

#[derive(Debug, Deserialize)]
pub struct ChannelSearchQuery {
    pub q: String,
    #[serde(default = "default_channels_limit")]
    pub limit: i64,
}

impl Validate for ChannelSearchQuery {
    fn validate(&self) -> Result<(), String> {
        not_empty("q", &self.q)?;
        in_range("limit", self.limit, 1, 100)
    }
}

#[derive(Debug, Serialize)]
pub struct SearchPostsResponse {
    pub messages: Vec<Post>,
    pub next_cursor: Option<String>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct SearchChannelsResponse {
    pub channels: Vec<ChannelSearchResult>,
    pub count: usize,
}

async fn search_posts(
    State(state): State<AppState>,
    ValidQuery(q): ValidQuery<PostSearchQuery>,
) -> Result<Json<SearchPostsResponse>, ApiError> {
    // A bad cursor fails here, before any session is spent on it.
    let offset = q
        .cursor
        .as_deref()
        .filter(|c| !c.is_empty())
        .map(cursor::decode)
        .transpose()?;
    let (tag, limit) = (q.tag.as_str(), limit(q.limit));

    let (messages, next_cursor) = state
        .runner
        .run("search_posts", |client| async move {
            service::search_posts(client.as_ref(), tag, offset, limit).await
        })
        .await?;
    Ok(Json(SearchPostsResponse {
        count: messages.len(),
        messages,
        next_cursor,
    }))
}

async fn search_channels(
    State(state): State<AppState>,
    ValidQuery(q): ValidQuery<ChannelSearchQuery>,
) -> Result<Json<SearchChannelsResponse>, ApiError> {
    let (text, limit) = (q.q.as_str(), limit(q.limit));
    let channels = state
        .runner
        .run("search_channels", |client| async move {
            service::search_channels(client.as_ref(), text, limit).await
        })
        .await?;
    Ok(Json(SearchChannelsResponse {
        count: channels.len(),
        channels,
    }))
}
