//! HTTP services for order fulfillment.
//!
//! One binary serves the order, payment, inventory and product services,
//! either all together or one per process (see [`config::ServiceMode`]),
//! with bearer-token auth, structured logging (tracing) and Prometheus
//! metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post, put};
use document_store::DocumentStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use state::AppState;

/// Creates the Axum application router for the configured services.
pub fn create_app<S: DocumentStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
    config: &Config,
) -> Router {
    let mode = config.service;
    let mut router: Router<Arc<AppState<S>>> =
        Router::new().route("/health", get(routes::health::check));

    if mode.serves_orders() {
        router = router
            .route(
                "/orders",
                post(routes::orders::create::<S>).get(routes::orders::list::<S>),
            )
            .route(
                "/orders/{id}",
                get(routes::orders::get::<S>).delete(routes::orders::cancel::<S>),
            )
            .route("/orders/{id}/status", put(routes::orders::update_status::<S>))
            .route(
                "/orders/{id}/system-status",
                put(routes::orders::system_status::<S>),
            );
    }

    if mode.serves_payments() {
        router = router
            .route(
                "/payments",
                post(routes::payments::create::<S>).get(routes::payments::list::<S>),
            )
            .route("/payments/{id}", get(routes::payments::get::<S>))
            .route(
                "/payments/user/{user_id}",
                get(routes::payments::list_for_user::<S>),
            )
            .route("/payments/{id}/process", post(routes::payments::process::<S>))
            .route("/payments/{id}/refund", post(routes::payments::refund::<S>))
            .route(
                "/payments/{id}/status",
                put(routes::payments::override_status::<S>),
            );
    }

    if mode.serves_orders() || mode.serves_payments() {
        router = router.route("/reconciliation", get(routes::reconciliation::list::<S>));
    }

    if mode.serves_inventory() {
        router = router
            .route(
                "/inventory",
                post(routes::inventory::create::<S>).get(routes::inventory::list::<S>),
            )
            .route("/inventory/low-stock", get(routes::inventory::low_stock::<S>))
            .route(
                "/inventory/check/{product_id}",
                get(routes::inventory::check::<S>),
            )
            .route(
                "/inventory/product/{product_id}",
                get(routes::inventory::get_by_product::<S>),
            )
            .route(
                "/inventory/product/{product_id}/deliver",
                put(routes::inventory::deliver::<S>),
            )
            .route(
                "/inventory/product/{product_id}/add-stock",
                put(routes::inventory::add_stock::<S>),
            )
            .route("/inventory/reserve", post(routes::inventory::reserve::<S>))
            .route("/inventory/release", post(routes::inventory::release::<S>))
            .route("/inventory/confirm", post(routes::inventory::confirm::<S>));
    }

    if mode.serves_products() {
        router = router
            .route("/products", post(routes::products::create::<S>))
            .route("/products/{id}", get(routes::products::get::<S>))
            .route(
                "/products/{id}/system-stock",
                put(routes::products::system_stock::<S>),
            );
    }

    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    router
        .with_state(state)
        .merge(metrics_router)
        .layer(middleware::from_fn_with_state(
            config.diagnostics(),
            error::attach_error_details,
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
