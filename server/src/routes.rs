use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::documents::routes as documents;
use crate::state::AppState;
use crate::users::routes as users;

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Registration and login (no auth)
    let auth_routes = Router::new()
        .route("/register", post(users::register))
        .route("/token", post(users::login_for_access_token));

    // Bearer token required: the AuthUser extractor rejects with 401
    let document_routes = Router::new()
        .route(
            "/upload",
            post(documents::upload_pdf).layer(DefaultBodyLimit::max(state.max_upload_bytes)),
        )
        .route("/documents", get(documents::get_pending_documents))
        .route("/document/{id}", get(documents::get_document))
        .route("/document/{id}/content", get(documents::get_document_content))
        .route("/list_documents", get(documents::list_documents));

    let health = Router::new().route("/health", get(health_check));

    let cors_allow_any = state.cors_allow_any;
    let app = Router::new()
        .merge(auth_routes)
        .merge(document_routes)
        .merge(health)
        .with_state(state);

    if cors_allow_any {
        app.layer(cors_layer())
    } else {
        app
    }
}

/// Browser clients may call from any origin.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
