pub mod error;
mod handlers;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::room::Room;
use crate::shutdown::ShutdownCoordinator;

use handlers::*;

#[derive(Clone)]
pub struct AppState {
    pub room: Room,
    pub shutdown: ShutdownCoordinator,
}

/// Configuration for the HTTP/WS router.
///
/// Use `RouterConfig::default()` in tests for a minimal same-origin setup.
#[derive(Debug, Clone, Default)]
pub struct RouterConfig {
    /// Origins allowed for cross-origin requests. Empty disables CORS;
    /// `["*"]` allows any origin.
    pub cors_origins: Vec<String>,
}

pub fn router(state: AppState, config: RouterConfig) -> Router {
    // Snapshots must never be cached: every fetch is a fresh look at the
    // shared surface.
    let screenshot_routes = Router::new()
        .route("/room/screenshot", get(screenshot))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ));

    let room_routes = Router::new()
        .route("/room/clipboard", get(clipboard_get).post(clipboard_set))
        .route("/room/control", get(control_status))
        .route("/room/control/request", post(control_request))
        .route("/room/control/release", post(control_release));

    let member_routes = Router::new()
        .route("/members", get(members_list).post(members_create))
        .route(
            "/members/{id}",
            get(members_get).put(members_update).delete(members_delete),
        );

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_events))
        .merge(screenshot_routes)
        .merge(room_routes)
        .merge(member_routes);

    if !config.cors_origins.is_empty() {
        let cors = if config.cors_origins.iter().any(|o| o == "*") {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<HeaderValue> = config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers(Any)
        };
        app = app.layer(cors);
    }

    Router::new()
        .nest("/api", app)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
