use chrono::{NaiveDate, NaiveTime};
use std::sync::Arc;
use std::time::Duration;

use booking_queue_cell::*;
use clinic_cell::{OperatingHours, TimeWindow, UpsertClinicRequest};

/// Builds a booking service over a fresh in-memory store.
pub struct QueueTestUtils {
    pub store: Arc<InMemoryQueueStore>,
    pub notifier: BroadcastNotifier,
    pub service: Arc<QueueBookingService>,
}

impl QueueTestUtils {
    pub fn new() -> Self {
        Self::with_settings(QueueSettings::default())
    }

    pub fn with_settings(settings: QueueSettings) -> Self {
        let store = Arc::new(InMemoryQueueStore::new(settings.scope_lock_timeout));
        let notifier = BroadcastNotifier::new();
        let service = Arc::new(QueueBookingService::new(
            store.clone(),
            Arc::new(notifier.clone()),
            settings,
        ));

        Self {
            store,
            notifier,
            service,
        }
    }

    /// Clinic open 09:00-12:00 and 18:00-20:00 with 15 minute slots.
    pub async fn register_clinic(&self, clinic_id: &str) {
        self.service
            .register_clinic(
                clinic_id,
                UpsertClinicRequest {
                    name: format!("{} clinic", clinic_id),
                    operating_hours: OperatingHours {
                        morning: TimeWindow::new(time(9, 0), time(12, 0)),
                        evening: TimeWindow::new(time(18, 0), time(20, 0)),
                        slot_duration_minutes: 15,
                    },
                },
            )
            .await
            .expect("Failed to register clinic");
    }

    pub async fn book(&self, clinic_id: &str, patient: &str) -> appointment_cell::Appointment {
        self.service
            .book(clinic_id, booking_request(patient))
            .await
            .expect("Failed to book")
    }
}

pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

pub fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

pub fn booking_request(patient: &str) -> BookingRequest {
    BookingRequest {
        appointment_date: test_date(),
        patient_name: patient.to_string(),
        patient_contact: "555-0100".to_string(),
        requested_time: None,
        source: appointment_cell::BookingSource::Online,
        fee_amount: Some(300.0),
        payment_reference: None,
    }
}

pub fn short_timeout_settings() -> QueueSettings {
    QueueSettings {
        scope_lock_timeout: Duration::from_millis(50),
        ..QueueSettings::default()
    }
}

mod booking_test;
mod lifecycle_test;
