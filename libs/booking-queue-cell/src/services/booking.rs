use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use appointment_cell::{Appointment, AppointmentLifecycleService, AppointmentStatus, ScopeKey};
use clinic_cell::{
    generate_slots, is_offered_slot, validate_operating_hours, Clinic, SlotsResponse, UpsertClinicRequest,
};

use crate::services::allocator::TokenAllocator;
use crate::services::notifier::{QueueEvent, QueueNotifier};
use crate::services::status::{now_serving, QueueStatusEngine};
use crate::{
    BookingQueueError, BookingRequest, CallNextResponse, QueueBoard, QueueSettings, QueueStatus, QueueStore,
};

const MAX_CLINIC_ID_LENGTH: usize = 64;

/// Entry point for everything the booking, front-desk and tracking surfaces do.
pub struct QueueBookingService {
    store: Arc<dyn QueueStore>,
    allocator: TokenAllocator,
    status_engine: QueueStatusEngine,
    lifecycle: AppointmentLifecycleService,
    notifier: Arc<dyn QueueNotifier>,
}

impl QueueBookingService {
    pub fn new(store: Arc<dyn QueueStore>, notifier: Arc<dyn QueueNotifier>, settings: QueueSettings) -> Self {
        Self {
            allocator: TokenAllocator::new(Arc::clone(&store), settings.clone()),
            status_engine: QueueStatusEngine::new(Arc::clone(&store), settings.average_minutes_per_token),
            lifecycle: AppointmentLifecycleService::new(),
            store,
            notifier,
        }
    }

    // ==========================================================================
    // CLINICS
    // ==========================================================================

    #[instrument(skip(self, request))]
    pub async fn register_clinic(
        &self,
        clinic_id: &str,
        request: UpsertClinicRequest,
    ) -> Result<Clinic, BookingQueueError> {
        validate_clinic_id(clinic_id)?;

        let name = request.name.trim();
        if name.is_empty() {
            return Err(BookingQueueError::ValidationError("Clinic name is required".to_string()));
        }
        validate_operating_hours(&request.operating_hours)?;

        let now = Utc::now();
        let created_at = self
            .store
            .get_clinic(clinic_id)
            .await?
            .map(|existing| existing.created_at)
            .unwrap_or(now);

        let clinic = Clinic {
            id: clinic_id.to_string(),
            name: name.to_string(),
            operating_hours: request.operating_hours,
            created_at,
            updated_at: now,
        };
        self.store.put_clinic(&clinic).await?;

        info!("Saved settings for clinic {}", clinic.id);
        Ok(clinic)
    }

    pub async fn get_clinic(&self, clinic_id: &str) -> Result<Clinic, BookingQueueError> {
        self.store
            .get_clinic(clinic_id)
            .await?
            .ok_or_else(|| BookingQueueError::NotFound(format!("clinic {}", clinic_id)))
    }

    pub async fn available_slots(&self, clinic_id: &str) -> Result<SlotsResponse, BookingQueueError> {
        let clinic = self.get_clinic(clinic_id).await?;
        let slots = generate_slots(&clinic.operating_hours)?;

        Ok(SlotsResponse {
            clinic_id: clinic.id,
            slot_duration_minutes: clinic.operating_hours.slot_duration_minutes,
            phone_only: clinic.operating_hours.is_phone_only(),
            slots,
        })
    }

    // ==========================================================================
    // BOOKING
    // ==========================================================================

    #[instrument(skip(self, request), fields(date = %request.appointment_date, source = ?request.source))]
    pub async fn book(&self, clinic_id: &str, request: BookingRequest) -> Result<Appointment, BookingQueueError> {
        let clinic = self.get_clinic(clinic_id).await?;
        let draft = request.into_draft(&clinic.id);

        if draft.patient_name.is_empty() {
            return Err(BookingQueueError::ValidationError("Patient name is required".to_string()));
        }

        if let Some(requested) = draft.requested_time {
            if !is_offered_slot(&clinic.operating_hours, requested)? {
                return Err(BookingQueueError::ValidationError(format!(
                    "{} is not an available slot for clinic {}",
                    requested.format("%H:%M"),
                    clinic.id
                )));
            }
        }

        let appointment = self.allocator.allocate(&draft).await?;
        self.publish(QueueEvent::AppointmentCreated {
            appointment: appointment.clone(),
        })
        .await;

        Ok(appointment)
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, BookingQueueError> {
        self.store
            .get_appointment(appointment_id)
            .await?
            .ok_or_else(|| BookingQueueError::NotFound(format!("appointment {}", appointment_id)))
    }

    // ==========================================================================
    // LIFECYCLE
    // ==========================================================================

    pub async fn check_in(&self, appointment_id: Uuid) -> Result<Appointment, BookingQueueError> {
        self.transition(appointment_id, AppointmentStatus::Ongoing).await
    }

    pub async fn complete(&self, appointment_id: Uuid) -> Result<Appointment, BookingQueueError> {
        self.transition(appointment_id, AppointmentStatus::Completed).await
    }

    /// Cancelling the ongoing appointment does not call anyone else in.
    pub async fn cancel(&self, appointment_id: Uuid) -> Result<Appointment, BookingQueueError> {
        self.transition(appointment_id, AppointmentStatus::Cancelled).await
    }

    #[instrument(skip(self))]
    pub async fn transition(
        &self,
        appointment_id: Uuid,
        target: AppointmentStatus,
    ) -> Result<Appointment, BookingQueueError> {
        let scope = self.get_appointment(appointment_id).await?.scope();
        let lifecycle = self.lifecycle;

        let changed = self
            .store
            .mutate_scope(&scope, &move |snapshot: &[Appointment]| -> Result<Vec<Appointment>, BookingQueueError> {
                let updated = lifecycle.plan_transition(snapshot, appointment_id, target, Utc::now())?;
                Ok(vec![updated])
            })
            .await?;

        let updated = changed
            .into_iter()
            .next()
            .ok_or_else(|| BookingQueueError::StoreError(format!("transition of {} was not persisted", appointment_id)))?;

        self.publish(QueueEvent::StatusChanged {
            appointment: updated.clone(),
        })
        .await;

        Ok(updated)
    }

    /// Complete whoever is ongoing and check in the lowest waiting token, as one step.
    #[instrument(skip(self))]
    pub async fn call_next(&self, clinic_id: &str, date: NaiveDate) -> Result<CallNextResponse, BookingQueueError> {
        self.get_clinic(clinic_id).await?;
        let scope = ScopeKey::new(clinic_id, date);
        let lifecycle = self.lifecycle;

        let changed = self
            .store
            .mutate_scope(&scope, &move |snapshot: &[Appointment]| -> Result<Vec<Appointment>, BookingQueueError> {
                Ok(lifecycle.plan_call_next(snapshot, Utc::now())?.changed())
            })
            .await?;

        let completed = changed
            .iter()
            .find(|a| a.status == AppointmentStatus::Completed)
            .cloned();
        let checked_in = changed
            .iter()
            .find(|a| a.status == AppointmentStatus::Ongoing)
            .cloned();

        let now_serving_token = match (&checked_in, &completed) {
            (Some(next), _) => Some(next.token_number),
            (None, Some(done)) => Some(done.token_number),
            (None, None) => now_serving(&self.store.list_scope(&scope).await?),
        };

        for appointment in changed {
            self.publish(QueueEvent::StatusChanged { appointment }).await;
        }

        if checked_in.is_none() {
            info!("No one waiting in {}", scope);
        }

        Ok(CallNextResponse {
            completed,
            checked_in,
            now_serving_token,
        })
    }

    // ==========================================================================
    // READS
    // ==========================================================================

    pub async fn queue_for_day(&self, clinic_id: &str, date: NaiveDate) -> Result<QueueBoard, BookingQueueError> {
        self.get_clinic(clinic_id).await?;
        let scope = ScopeKey::new(clinic_id, date);
        let appointments = self.store.list_scope(&scope).await?;

        Ok(QueueBoard {
            now_serving_token: now_serving(&appointments),
            waiting_count: appointments.iter().filter(|a| a.is_waiting()).count(),
            scope,
            appointments,
        })
    }

    pub async fn queue_status(&self, tracking_code: &str) -> Result<QueueStatus, BookingQueueError> {
        self.status_engine.get_queue_status(tracking_code).await
    }

    // ==========================================================================
    // ADMINISTRATION
    // ==========================================================================

    /// Remove the record outright. The token is never handed out again.
    #[instrument(skip(self))]
    pub async fn delete_appointment(&self, appointment_id: Uuid) -> Result<Appointment, BookingQueueError> {
        let removed = self
            .store
            .delete_appointment(appointment_id)
            .await?
            .ok_or_else(|| BookingQueueError::NotFound(format!("appointment {}", appointment_id)))?;

        info!("Deleted token {} from {}", removed.token_number, removed.scope());
        self.publish(QueueEvent::AppointmentDeleted {
            appointment_id: removed.id,
            scope: removed.scope(),
        })
        .await;

        Ok(removed)
    }

    async fn publish(&self, event: QueueEvent) {
        if let Err(e) = self.notifier.notify(event).await {
            warn!("Failed to publish queue event: {}", e);
        }
    }
}

/// Clinic ids become part of storage keys; keep them to a plain slug.
fn validate_clinic_id(clinic_id: &str) -> Result<(), BookingQueueError> {
    let valid = !clinic_id.is_empty()
        && clinic_id.len() <= MAX_CLINIC_ID_LENGTH
        && clinic_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(BookingQueueError::ValidationError(format!(
            "Clinic id must be 1-{} letters, digits, '-' or '_'",
            MAX_CLINIC_ID_LENGTH
        )))
    }
}
