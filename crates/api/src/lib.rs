//! HTTP API server for the marketplace order service.
//!
//! REST endpoints for the cart, checkout, and the order lifecycle, with
//! structured logging (tracing) and Prometheus metrics. The caller's
//! identity arrives as an `X-User-Id` header set by the upstream
//! gateway.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;

use std::sync::Arc;

use axum::routing::{delete, get, patch, post};
use axum::Router;
use domain::{CartService, CheckoutService, OrderService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{CartRepository, OrderRepository, ProductRepository, ShopRepository};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
///
/// The repositories are exposed alongside the services so integration
/// tests and seeding scripts can populate catalog data directly; there
/// is no catalog HTTP surface.
pub struct AppState {
    pub cart: CartService,
    pub checkout: CheckoutService,
    pub orders: OrderService,
    pub products: Arc<dyn ProductRepository>,
    pub shops: Arc<dyn ShopRepository>,
    pub carts: Arc<dyn CartRepository>,
    pub order_store: Arc<dyn OrderRepository>,
}

/// Builds the application state from one backend implementing all four
/// repositories.
pub fn create_state<S>(store: Arc<S>) -> Arc<AppState>
where
    S: ProductRepository + ShopRepository + CartRepository + OrderRepository + 'static,
{
    let products: Arc<dyn ProductRepository> = store.clone();
    let shops: Arc<dyn ShopRepository> = store.clone();
    let carts: Arc<dyn CartRepository> = store.clone();
    let orders: Arc<dyn OrderRepository> = store;

    Arc::new(AppState {
        cart: CartService::new(carts.clone(), products.clone(), shops.clone()),
        checkout: CheckoutService::new(carts.clone(), products.clone(), orders.clone()),
        orders: OrderService::new(orders.clone(), products.clone(), shops.clone()),
        products,
        shops,
        carts,
        order_store: orders,
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/cart", get(routes::cart::view))
        .route("/cart", post(routes::cart::add))
        .route("/cart/{id}", patch(routes::cart::update))
        .route("/cart/{id}", delete(routes::cart::remove))
        .route("/orders", post(routes::orders::create))
        .route("/orders", get(routes::orders::list_active))
        .route("/orders/history", get(routes::orders::list_history))
        .route("/sales", get(routes::orders::list_sales))
        .route("/orders/{id}", get(routes::orders::detail))
        .route(
            "/orders/{id}/cancel-request",
            post(routes::orders::cancel_request),
        )
        .route(
            "/orders/{id}/cancel-approve",
            post(routes::orders::cancel_approve),
        )
        .route("/orders/{id}/cancel-deny", post(routes::orders::cancel_deny))
        .route(
            "/orders/{id}/payment-decision",
            post(routes::orders::payment_decision),
        )
        .route(
            "/orders/{id}/shipping-status",
            patch(routes::orders::shipping_status),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
