// ABOUTME: HTTP API layer for Stockboard providing REST endpoints and routing
// ABOUTME: Thin handlers over the workflow, movement and adjustment services

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod adjustments_handlers;
pub mod auth;
pub mod kanbans_handlers;
pub mod movements_handlers;
pub mod products_handlers;
pub mod public_handlers;
pub mod response;
pub mod state;

pub use auth::{CurrentActor, ACTOR_HEADER};
pub use response::{ApiError, ApiResponse};
pub use state::DbState;

/// Product routes (nested under /api/products)
pub fn create_products_router() -> Router<DbState> {
    Router::new()
        .route("/", post(products_handlers::create_product))
        .route("/{id}", get(products_handlers::get_product))
        .route("/{id}/column", post(products_handlers::move_product))
        .route("/{id}/validations", post(products_handlers::record_validation))
        .route("/{id}/transfer", post(products_handlers::transfer_product))
        .route("/{id}/movements", post(movements_handlers::create_movement))
        .route(
            "/{id}/movements/pending",
            get(movements_handlers::list_pending),
        )
        .route("/{id}/distribute", post(movements_handlers::distribute))
        .route(
            "/{id}/adjustments",
            post(adjustments_handlers::create_adjustment)
                .get(adjustments_handlers::list_adjustments),
        )
        .route("/{id}/ledger", get(products_handlers::get_ledger))
}

/// Pending movement and adjustment routes
pub fn create_ledger_router() -> Router<DbState> {
    Router::new()
        .route(
            "/movements/{id}/cancel",
            post(movements_handlers::cancel_movement),
        )
        .route(
            "/adjustments/{id}",
            put(adjustments_handlers::update_adjustment),
        )
        .route(
            "/adjustments/{id}/approve",
            post(adjustments_handlers::approve_adjustment),
        )
        .route(
            "/adjustments/{id}/cancel",
            post(adjustments_handlers::cancel_adjustment),
        )
}

/// Board column routes (nested under /api/kanbans)
pub fn create_kanbans_router() -> Router<DbState> {
    Router::new()
        .route(
            "/{id}/columns/{column}",
            get(kanbans_handlers::list_column),
        )
        .route(
            "/{id}/columns/{column}/order",
            put(kanbans_handlers::reorder_column),
        )
}

/// Token-only routes (nested under /api/public)
pub fn create_public_router() -> Router<DbState> {
    Router::new()
        .route("/movements/{token}", get(public_handlers::get_movement))
        .route(
            "/movements/{token}/confirm",
            post(public_handlers::confirm_movement),
        )
}

/// Full application router with state, tracing and CORS applied
pub fn create_router(state: DbState, cors_origin: &str) -> Router {
    let api = Router::new()
        .nest("/products", create_products_router())
        .nest("/kanbans", create_kanbans_router())
        .nest("/public", create_public_router())
        .merge(create_ledger_router());

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origin))
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(ACTOR_HEADER),
        ]);

    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid CORS origin: {}", origin);
            layer
        }
    }
}
