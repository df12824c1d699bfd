//! Axum application assembly.
//!
//! Layout of this folder:
//! - `services.rs` picks and wires the backing stack (stores, bus, cache)
//! - `routes/` holds the handlers, one file per surface
//! - `dto.rs` carries request payloads and response mapping
//! - `errors.rs` keeps every endpoint on the shared error shape
//!
//! The router has two zones: `/health` is public; everything else sits behind
//! the bearer-JWT auth middleware and sees a [`crate::context::UserContext`].

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(jwt_secret: String) -> Router {
    let app_services = Arc::new(services::build_services().await);
    build_app_with_services(jwt_secret, app_services)
}

/// Build the router around an existing service stack.
///
/// Split from [`build_app`] so tests can wire an in-memory stack and keep the
/// catalog handle for seeding.
pub fn build_app_with_services(
    jwt_secret: String,
    app_services: Arc<services::AppServices>,
) -> Router {
    let jwt = Arc::new(storefront_auth::Hs256JwtValidator::new(
        jwt_secret.as_bytes(),
    ));
    let auth_state = middleware::AuthState { jwt };

    // Protected routes: require a valid bearer token.
    let protected = routes::router()
        .layer(Extension(app_services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
