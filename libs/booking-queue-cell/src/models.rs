use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use appointment_cell::{Appointment, AppointmentStatus, BookingSource, NewAppointment, ScopeKey};
use shared_config::AppConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub appointment_date: NaiveDate,
    pub patient_name: String,
    pub patient_contact: String,
    /// Absent for walk-ins and phone-only clinics.
    pub requested_time: Option<NaiveTime>,
    #[serde(default = "default_source")]
    pub source: BookingSource,
    pub fee_amount: Option<f64>,
    pub payment_reference: Option<String>,
}

fn default_source() -> BookingSource {
    BookingSource::Online
}

impl BookingRequest {
    pub fn into_draft(self, clinic_id: &str) -> NewAppointment {
        NewAppointment {
            clinic_id: clinic_id.to_string(),
            appointment_date: self.appointment_date,
            patient_name: self.patient_name.trim().to_string(),
            patient_contact: self.patient_contact.trim().to_string(),
            requested_time: self.requested_time,
            source: self.source,
            fee_amount: self.fee_amount,
            payment_reference: self.payment_reference,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingResponse {
    pub appointment_id: Uuid,
    pub tracking_code: String,
    pub token_number: u32,
    pub status: AppointmentStatus,
    pub appointment_date: NaiveDate,
    pub tracking_url: String,
}

impl From<&Appointment> for BookingResponse {
    fn from(appointment: &Appointment) -> Self {
        Self {
            appointment_id: appointment.id,
            tracking_code: appointment.tracking_code.clone(),
            token_number: appointment.token_number,
            status: appointment.status,
            appointment_date: appointment.appointment_date,
            tracking_url: format!("/track/{}", appointment.tracking_code),
        }
    }
}

/// Answer to a public "where am I in the queue" lookup.
///
/// `estimated_wait_minutes` is `positions_ahead` times a configured per-token average.
/// It is a heuristic for display, not a promise.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueStatus {
    pub clinic_id: String,
    pub appointment_date: NaiveDate,
    pub your_token: u32,
    pub now_serving_token: Option<u32>,
    pub positions_ahead: u32,
    pub estimated_wait_minutes: u32,
    pub status: AppointmentStatus,
}

/// Staff view of one clinic day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueBoard {
    pub scope: ScopeKey,
    pub now_serving_token: Option<u32>,
    pub waiting_count: usize,
    pub appointments: Vec<Appointment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallNextResponse {
    pub completed: Option<Appointment>,
    pub checked_in: Option<Appointment>,
    pub now_serving_token: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    pub average_minutes_per_token: u32,
    pub scope_lock_timeout: Duration,
    pub max_conflict_retries: u32,
    pub tracking_code_length: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            average_minutes_per_token: 5,
            scope_lock_timeout: Duration::from_millis(2000),
            max_conflict_retries: 5,
            tracking_code_length: 8,
        }
    }
}

impl From<&AppConfig> for QueueSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            average_minutes_per_token: config.average_minutes_per_token,
            scope_lock_timeout: Duration::from_millis(config.scope_lock_timeout_ms),
            max_conflict_retries: config.max_conflict_retries.max(1),
            tracking_code_length: config.tracking_code_length.max(6),
        }
    }
}
