use axum::{
    extract::Request,
    http::{header, HeaderValue},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use crate::analytics::{Reporter, Tracker};
use crate::auth::{auth_middleware, AuthService};
use crate::config::Config;
use crate::storage::{Storage, TimeoutStorage};

use super::handlers::{
    health_check, method_not_allowed, preflight, report, track_event, AppState,
};

pub const ANALYTICS_PATH: &str = "/api/analytics";

pub fn create_api_router(storage: Arc<dyn Storage>, config: Arc<Config>) -> Router {
    let timeout = Duration::from_secs(config.api_server.request_timeout_secs);
    let storage: Arc<dyn Storage> = Arc::new(TimeoutStorage::new(storage, timeout));

    let state = Arc::new(AppState {
        tracker: Tracker::new(Arc::clone(&storage), config.analytics.clone()),
        reporter: Reporter::new(storage),
    });

    let auth_service = Arc::new(AuthService::new(config.auth.dashboard_api_keys.clone()));

    let analytics_routes = Router::new()
        .route(
            ANALYTICS_PATH,
            get(report)
                .post(track_event)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .route_layer(middleware::from_fn(move |headers, req, next| {
            let auth = Arc::clone(&auth_service);
            auth_middleware(auth, headers, req, next)
        }))
        .with_state(state);

    Router::new()
        .route("/health", get(health_check))
        .merge(analytics_routes)
        .layer(middleware::from_fn(cors_headers))
        .layer(TraceLayer::new_for_http())
}

/// Open CORS headers on every response. `OPTIONS` itself is answered by the
/// preflight handler.
async fn cors_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, X-API-Key"),
    );
    response
}
