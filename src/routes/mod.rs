//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Binds the REST API under `/api` with a permissive CORS layer. Route
//! handlers translate between HTTP and the service layer; status mapping
//! for each service error lives next to the handlers that use it.

pub mod measurements;
pub mod pins;
pub mod search;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/addresses/search", get(search::search_addresses))
        .route("/api/sessions", post(pins::create_session))
        .route("/api/sessions/{id}/pins", get(pins::list_pins).post(pins::create_pin))
        .route("/api/sessions/{id}/pins/stats", get(pins::stats))
        .route("/api/sessions/{id}/pins/{pin_id}", axum::routing::delete(pins::delete_pin))
        .route("/api/sessions/{id}/search-pin", post(pins::search_pin))
        .route("/api/sessions/{id}/export.jsonl", get(pins::export_jsonl))
        .route("/api/sessions/{id}/import.jsonl", post(pins::import_jsonl))
        .route(
            "/api/sessions/{id}/measurements",
            get(measurements::list)
                .post(measurements::create)
                .delete(measurements::clear),
        )
        .route("/api/sessions/{id}/measure-path", post(measurements::measure_path))
        .route("/healthz", get(healthz))
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
