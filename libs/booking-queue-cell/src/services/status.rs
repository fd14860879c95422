use std::sync::Arc;
use tracing::{debug, instrument};

use appointment_cell::{ongoing_in, Appointment, AppointmentStatus};

use crate::services::tracking::normalize_tracking_code;
use crate::{BookingQueueError, QueueStatus, QueueStore};

/// Token being attended to: the ongoing one, else the highest completed one.
pub fn now_serving(scope: &[Appointment]) -> Option<u32> {
    ongoing_in(scope).map(|ongoing| ongoing.token_number).or_else(|| {
        scope
            .iter()
            .filter(|appointment| appointment.status == AppointmentStatus::Completed)
            .map(|appointment| appointment.token_number)
            .max()
    })
}

/// Position of `target` within a snapshot of its own scope.
///
/// Only waiting appointments have anyone ahead of them. Before the first patient is
/// called, everyone with a lower token counts as ahead.
pub fn compute_queue_status(
    target: &Appointment,
    scope: &[Appointment],
    average_minutes_per_token: u32,
) -> QueueStatus {
    let now_serving_token = now_serving(scope);

    let positions_ahead = if target.is_waiting() {
        match now_serving_token {
            Some(serving) => target.token_number.saturating_sub(serving),
            None => target.token_number.saturating_sub(1),
        }
    } else {
        0
    };

    QueueStatus {
        clinic_id: target.clinic_id.clone(),
        appointment_date: target.appointment_date,
        your_token: target.token_number,
        now_serving_token,
        positions_ahead,
        estimated_wait_minutes: positions_ahead.saturating_mul(average_minutes_per_token),
        status: target.status,
    }
}

pub struct QueueStatusEngine {
    store: Arc<dyn QueueStore>,
    average_minutes_per_token: u32,
}

impl QueueStatusEngine {
    pub fn new(store: Arc<dyn QueueStore>, average_minutes_per_token: u32) -> Self {
        Self {
            store,
            average_minutes_per_token,
        }
    }

    #[instrument(skip_all)]
    pub async fn get_queue_status(&self, tracking_code: &str) -> Result<QueueStatus, BookingQueueError> {
        let code = normalize_tracking_code(tracking_code);
        let view = self
            .store
            .tracking_view(&code)
            .await?
            .ok_or_else(|| BookingQueueError::NotFound(format!("tracking code {}", code)))?;

        let status = compute_queue_status(&view.appointment, &view.scope, self.average_minutes_per_token);
        debug!(
            "Token {} has {} ahead, now serving {:?}",
            status.your_token, status.positions_ahead, status.now_serving_token
        );
        Ok(status)
    }
}
