use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use booking_queue_cell::{create_booking_queue_router, QueueBookingService};

pub fn create_router(service: Arc<QueueBookingService>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic queue API is running!" }))
        .merge(create_booking_queue_router(service))
}
