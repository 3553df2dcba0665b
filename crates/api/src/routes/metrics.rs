//! Prometheus metrics endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics::{Unit, describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusHandle;

/// Registers help text for the metrics the domain records.
pub fn describe() {
    describe_counter!("orders_placed_total", "Orders successfully placed");
    describe_counter!("orders_cancelled_total", "Orders cancelled by customers");
    describe_counter!(
        "order_placement_failures_total",
        "Failed checkouts, labelled by reason"
    );
    describe_counter!(
        "order_number_collisions_total",
        "Order inserts that clashed on the order number"
    );
    describe_histogram!(
        "order_placement_duration_seconds",
        Unit::Seconds,
        "Time to place an order, retries included"
    );
    describe_counter!("cart_mutations_total", "Cart changes, labelled by op");
    describe_counter!("products_imported_total", "Products created by bulk import");
    describe_counter!("product_import_failures_total", "Rejected bulk import rows");
}

/// GET /metrics: returns Prometheus-formatted metrics.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        handle.render(),
    )
}
