//! HTTP boundary

pub mod auth;
pub mod dto;
pub mod orders;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::service::OrderService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<OrderService>,
    pub admin_token: Option<String>,
}

pub fn router(service: Arc<OrderService>, admin_token: Option<String>) -> Router {
    let state = AppState {
        service,
        admin_token,
    };
    let admin = Router::new()
        .route("/orders/:id", patch(orders::update_order))
        .route("/orders/:id/confirm", post(orders::confirm_order))
        .route("/orders/:id/cancel", post(orders::cancel_order))
        .route("/orders/:id/payments", post(orders::add_payment))
        .route("/orders/:id/shipments", post(orders::create_shipment))
        .route("/cron/orders/expire", post(orders::expire_reservations))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));
    Router::new()
        .route("/health", get(orders::health))
        .route("/orders", get(orders::list_orders).post(orders::create_order))
        .route("/orders/:id", get(orders::get_order))
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
