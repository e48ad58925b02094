mod auth;
mod bookings;
mod error;
mod payments;
mod rooms;
mod validation;

pub use error::{ApiError, ErrorCode};

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Public guest-facing routes
    let public_routes = Router::new()
        .route("/rooms", get(rooms::list_rooms))
        .route("/availability", get(bookings::search_availability))
        .route("/bookings", post(bookings::create_booking))
        .route("/bookings/:booking_number", get(bookings::get_booking))
        .route("/payments/initiate", post(payments::initiate_payment));

    // Back-office routes, guarded by the admin token
    let admin_routes = Router::new()
        .route("/rooms", get(rooms::admin_list_rooms))
        .route("/rooms", post(rooms::create_room))
        .route("/rooms/:id", get(rooms::get_room))
        .route("/rooms/:id", put(rooms::update_room))
        .route("/rooms/:id", delete(rooms::delete_room))
        .route("/bookings", get(bookings::admin_list_bookings))
        .route(
            "/bookings/:booking_number/approve",
            post(bookings::approve_booking),
        )
        .route(
            "/bookings/:booking_number/reject",
            post(bookings::reject_booking),
        )
        .route(
            "/payments/:transaction_id/recheck",
            post(payments::recheck_payment),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::admin_auth,
        ));

    // Gateway-facing callback (authenticated by its signature, not a token)
    let gateway_routes = Router::new().route("/callback", post(payments::payment_callback));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", public_routes)
        .nest("/api/admin", admin_routes)
        .nest("/payments", gateway_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
