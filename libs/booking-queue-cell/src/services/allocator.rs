use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use appointment_cell::{Appointment, NewAppointment};

use crate::services::tracking::generate_tracking_code;
use crate::{BookingQueueError, QueueSettings, QueueStore};

/// Hands out queue tokens.
///
/// Token and appointment record are created together by the store, so a caller either
/// gets a fully persisted appointment or an error; never a bare number.
pub struct TokenAllocator {
    store: Arc<dyn QueueStore>,
    settings: QueueSettings,
}

impl TokenAllocator {
    pub fn new(store: Arc<dyn QueueStore>, settings: QueueSettings) -> Self {
        Self { store, settings }
    }

    #[instrument(skip(self, draft), fields(scope = %draft.scope()))]
    pub async fn allocate(&self, draft: &NewAppointment) -> Result<Appointment, BookingQueueError> {
        let attempts = self.settings.max_conflict_retries.max(1);

        for attempt in 1..=attempts {
            let tracking_code = generate_tracking_code(self.settings.tracking_code_length);

            if let Some(appointment) = self.store.insert_next(draft, &tracking_code).await? {
                info!(
                    "Allocated token {} for {} ({})",
                    appointment.token_number,
                    appointment.scope(),
                    appointment.status
                );
                return Ok(appointment);
            }

            debug!("Tracking code collision on attempt {}", attempt);
        }

        warn!("No free tracking code after {} attempts", attempts);
        Err(BookingQueueError::TooManyConflicts {
            scope: draft.scope().to_string(),
            attempts,
        })
    }
}
