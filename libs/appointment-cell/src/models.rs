// libs/appointment-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// SCOPE
// ==============================================================================

/// The (clinic, calendar day) pair under which tokens are numbered and at most one
/// appointment may be ongoing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeKey {
    pub clinic_id: String,
    pub date: NaiveDate,
}

impl ScopeKey {
    pub fn new(clinic_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            clinic_id: clinic_id.into(),
            date,
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.clinic_id, self.date.format("%Y-%m-%d"))
    }
}

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub tracking_code: String,
    pub clinic_id: String,
    pub appointment_date: NaiveDate,
    pub token_number: u32,
    pub status: AppointmentStatus,
    pub patient_name: String,
    pub patient_contact: String,
    pub requested_time: Option<NaiveTime>,
    pub source: BookingSource,
    pub fee_amount: Option<f64>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Appointment {
    pub fn scope(&self) -> ScopeKey {
        ScopeKey::new(self.clinic_id.clone(), self.appointment_date)
    }

    pub fn is_waiting(&self) -> bool {
        self.status.is_waiting()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Booked,
    Confirmed,
    Ongoing,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// `booked` and `confirmed` both mean "reserved, not yet arrived".
    pub fn is_waiting(&self) -> bool {
        matches!(self, AppointmentStatus::Booked | AppointmentStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Booked => write!(f, "booked"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Ongoing => write!(f, "ongoing"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingSource {
    Online,
    Manual,
}

impl BookingSource {
    /// Online bookings start as `booked`; staff entries are `confirmed` on the spot.
    pub fn initial_status(&self) -> AppointmentStatus {
        match self {
            BookingSource::Online => AppointmentStatus::Booked,
            BookingSource::Manual => AppointmentStatus::Confirmed,
        }
    }
}

/// Everything needed to create an appointment except the token and tracking code, which
/// are assigned at allocation time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewAppointment {
    pub clinic_id: String,
    pub appointment_date: NaiveDate,
    pub patient_name: String,
    pub patient_contact: String,
    pub requested_time: Option<NaiveTime>,
    pub source: BookingSource,
    pub fee_amount: Option<f64>,
    pub payment_reference: Option<String>,
}

impl NewAppointment {
    pub fn scope(&self) -> ScopeKey {
        ScopeKey::new(self.clinic_id.clone(), self.appointment_date)
    }

    pub fn into_appointment(
        self,
        id: Uuid,
        token_number: u32,
        tracking_code: String,
        created_at: DateTime<Utc>,
    ) -> Appointment {
        Appointment {
            id,
            tracking_code,
            clinic_id: self.clinic_id,
            appointment_date: self.appointment_date,
            token_number,
            status: self.source.initial_status(),
            patient_name: self.patient_name,
            patient_contact: self.patient_contact,
            requested_time: self.requested_time,
            source: self.source,
            fee_amount: self.fee_amount,
            payment_reference: self.payment_reference,
            created_at,
            checked_in_at: None,
            completed_at: None,
            cancelled_at: None,
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Token {ongoing_token} is already ongoing in {scope}")]
    QueueConflict { scope: String, ongoing_token: u32 },

    #[error("Appointment not found: {0}")]
    NotFound(String),
}
