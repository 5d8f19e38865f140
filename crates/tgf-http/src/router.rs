use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use tgf_core::session::SessionRunner;
use tokio::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::info;

use crate::handlers;

#[derive(Clone)]
pub struct AppState {
    pub runner: SessionRunner,
}

impl AppState {
    pub fn new(runner: SessionRunner) -> Self {
        Self { runner }
    }
}

pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let api = Router::new()
        .nest("/channels", handlers::channels::router())
        .nest("/search", handlers::search::router())
        .nest("/users", handlers::users::router());

    Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/api", api)
        .layer(middleware::from_fn(log_requests))
        .layer(build_cors_layer(cors_origins))
        .with_state(state)
}

/// Wildcard (or nothing usable) allows any origin without credentials;
/// an explicit list allows credentials.
pub fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer
            .allow_origin(AllowOrigin::list(origins))
            .allow_credentials(true)
    }
}

async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let res = next.run(req).await;

    let duration = (start.elapsed().as_secs_f64() * 10_000.0).round() / 10_000.0;
    info!(
        method = %method,
        path = %path,
        status = res.status().as_u16(),
        duration,
        "request"
    );
    res
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use tgf_core::testing::FakeData;
    use tower::ServiceExt;

    use crate::handlers::test_support::{app, get};

    #[tokio::test]
    async fn unknown_routes_are_404() {
        let (status, _) = get(app(FakeData::default()), "/api/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn wildcard_cors_answers_preflight() {
        let res = app(FakeData::default())
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/health")
                    .header(header::ORIGIN, "http://example.com")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[test]
    fn explicit_origins_build_a_list_layer() {
        // Building must not panic: credentials are only combined with a list.
        let _ = super::build_cors_layer(&["http://localhost:3000".to_string()]);
        let _ = super::build_cors_layer(&[]);
    }
}
