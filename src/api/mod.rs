//! API layer - HTTP handlers and routing
//!
//! Routers per API area nested under `/api`, with a `require_auth`
//! middleware resolving the session token for every protected route and a
//! shared response envelope.

pub mod assignments;
pub mod auth;
pub mod chats;
pub mod classes;
pub mod events;
pub mod middleware;
pub mod responses;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState, AuthenticatedUser};
pub use responses::ApiResponse;

/// Build the API router: public auth routes plus the session-guarded rest.
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/profile", auth::profile_router())
        .nest("/class", classes::router())
        .nest("/assignment", assignments::router())
        .nest("/chat", chats::router())
        .nest("/event", events::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    Router::new()
        .nest("/auth", auth::public_router())
        .merge(protected_routes)
}

/// Build the complete application router with CORS and request tracing.
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(
            cors_origin
                .parse::<HeaderValue>()
                .unwrap_or_else(|_| HeaderValue::from_static("http://localhost:3000")),
        )
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    Router::new()
        .nest("/api", build_api_router(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
