use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use appointment_cell::Appointment;
use clinic_cell::{Clinic, SlotsResponse, UpsertClinicRequest};
use shared_models::error::AppError;

use crate::{BookingRequest, BookingResponse, CallNextResponse, QueueBoard, QueueBookingService, QueueStatus};

type ServiceState = State<Arc<QueueBookingService>>;

/// Create or update a clinic's name and operating hours
pub async fn upsert_clinic(
    State(service): ServiceState,
    Path(clinic_id): Path<String>,
    Json(request): Json<UpsertClinicRequest>,
) -> Result<Json<Clinic>, AppError> {
    let clinic = service.register_clinic(&clinic_id, request).await?;
    Ok(Json(clinic))
}

/// Bookable slot start times for a clinic
pub async fn get_clinic_slots(
    State(service): ServiceState,
    Path(clinic_id): Path<String>,
) -> Result<Json<SlotsResponse>, AppError> {
    Ok(Json(service.available_slots(&clinic_id).await?))
}

/// Book an appointment and hand out the next token
pub async fn book_appointment(
    State(service): ServiceState,
    Path(clinic_id): Path<String>,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    info!("Booking request for clinic {} on {}", clinic_id, request.appointment_date);

    let appointment = service.book(&clinic_id, request).await?;
    Ok((StatusCode::CREATED, Json(BookingResponse::from(&appointment))))
}

/// Staff board for one clinic day
pub async fn get_day_queue(
    State(service): ServiceState,
    Path((clinic_id, date)): Path<(String, NaiveDate)>,
) -> Result<Json<QueueBoard>, AppError> {
    Ok(Json(service.queue_for_day(&clinic_id, date).await?))
}

pub async fn call_next(
    State(service): ServiceState,
    Path((clinic_id, date)): Path<(String, NaiveDate)>,
) -> Result<Json<CallNextResponse>, AppError> {
    Ok(Json(service.call_next(&clinic_id, date).await?))
}

pub async fn get_appointment(
    State(service): ServiceState,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(service.get_appointment(appointment_id).await?))
}

pub async fn check_in_appointment(
    State(service): ServiceState,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(service.check_in(appointment_id).await?))
}

pub async fn complete_appointment(
    State(service): ServiceState,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(service.complete(appointment_id).await?))
}

pub async fn cancel_appointment(
    State(service): ServiceState,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(service.cancel(appointment_id).await?))
}

/// Administrative removal; the token stays consumed
pub async fn delete_appointment(
    State(service): ServiceState,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let removed = service.delete_appointment(appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment_id": removed.id,
        "token_number": removed.token_number
    })))
}

/// Public queue position lookup. The tracking code is the only credential.
pub async fn track_appointment(
    State(service): ServiceState,
    Path(tracking_code): Path<String>,
) -> Result<Json<QueueStatus>, AppError> {
    Ok(Json(service.queue_status(&tracking_code).await?))
}
