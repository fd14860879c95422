use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::handlers::{
    book_appointment, call_next, cancel_appointment, check_in_appointment, complete_appointment,
    delete_appointment, get_appointment, get_clinic_slots, get_day_queue, track_appointment, upsert_clinic,
};
use crate::QueueBookingService;

pub fn create_booking_queue_router(service: Arc<QueueBookingService>) -> Router {
    let clinic_routes = Router::new()
        .route("/clinics/{clinic_id}", put(upsert_clinic))
        .route("/clinics/{clinic_id}/slots", get(get_clinic_slots))
        .route("/clinics/{clinic_id}/appointments", post(book_appointment))
        .route("/clinics/{clinic_id}/queue/{date}", get(get_day_queue))
        .route("/clinics/{clinic_id}/queue/{date}/next", post(call_next));

    let appointment_routes = Router::new()
        .route("/appointments/{id}", get(get_appointment).delete(delete_appointment))
        .route("/appointments/{id}/check-in", post(check_in_appointment))
        .route("/appointments/{id}/complete", post(complete_appointment))
        .route("/appointments/{id}/cancel", post(cancel_appointment));

    // Public: no auth upstream of this route
    let public_routes = Router::new().route("/track/{tracking_code}", get(track_appointment));

    Router::new()
        .merge(clinic_routes)
        .merge(appointment_routes)
        .merge(public_routes)
        .with_state(service)
}
