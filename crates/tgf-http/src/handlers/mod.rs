pub mod channels;
pub mod health;
pub mod search;
pub mod users;

use serde::{Deserialize, Serialize};

use crate::extract::{in_range, not_empty, Validate};

// ============== Queries ==============

const fn default_limit() -> i64 {
    20
}

/// `offset_id` / `limit` paging for history reads. `limit` is 1..=100.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub offset_id: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

impl Validate for PageQuery {
    fn validate(&self) -> Result<(), String> {
        in_range("offset_id", self.offset_id, 0, i64::from(i32::MAX))?;
        in_range("limit", self.limit, 1, 100)
    }
}

/// Paging for photo listings, which download every item: `limit` is 1..=50.
#[derive(Debug, Deserialize)]
pub struct PhotoPageQuery {
    #[serde(default)]
    pub offset_id: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

impl Validate for PhotoPageQuery {
    fn validate(&self) -> Result<(), String> {
        in_range("offset_id", self.offset_id, 0, i64::from(i32::MAX))?;
        in_range("limit", self.limit, 1, 50)
    }
}

#[derive(Debug, Deserialize)]
pub struct TextSearchQuery {
    pub q: String,
    #[serde(default)]
    pub offset_id: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

impl Validate for TextSearchQuery {
    fn validate(&self) -> Result<(), String> {
        not_empty("q", &self.q)?;
        in_range("offset_id", self.offset_id, 0, i64::from(i32::MAX))?;
        in_range("limit", self.limit, 1, 100)
    }
}

// ============== Responses ==============

#[derive(Debug, Serialize)]
pub struct MessagesResponse<T> {
    pub messages: Vec<T>,
    pub count: usize,
}

impl<T> MessagesResponse<T> {
    pub fn new(messages: Vec<T>) -> Self {
        Self {
            count: messages.len(),
            messages,
        }
    }
}

// Bounds are validated before these conversions run.

pub(crate) fn offset(v: i64) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

pub(crate) fn limit(v: i64) -> usize {
    usize::try_from(v).unwrap_or(0)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use tgf_core::{
        ports::ClientHandle,
        session::{SessionPool, SessionRunner},
        testing::{channel_peer, FakeData, FakeHandle},
    };
    use tower::ServiceExt;

    use crate::router::{build_router, AppState};

    /// Fake data with `news` (id 100) and its discussion group (id 200).
    pub fn news_data() -> FakeData {
        FakeData {
            peers: vec![
                ("news".into(), channel_peer(100, "news")),
                ("100".into(), channel_peer(100, "news")),
                ("200".into(), channel_peer(200, "news_chat")),
            ],
            ..Default::default()
        }
    }

    pub fn app_with(handles: Vec<Arc<FakeHandle>>) -> (Router, Arc<SessionPool>) {
        let handles = handles
            .into_iter()
            .map(|h| h as Arc<dyn ClientHandle>)
            .collect();
        let pool = Arc::new(SessionPool::with_handles(handles));
        let state = AppState::new(SessionRunner::new(pool.clone()));
        (build_router(state, &["*".to_string()]), pool)
    }

    pub fn app(data: FakeData) -> Router {
        app_with(vec![Arc::new(FakeHandle::with_data("s1", data))]).0
    }

    pub async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        let res = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }
}
