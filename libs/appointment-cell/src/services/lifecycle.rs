// libs/appointment-cell/src/services/lifecycle.rs
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError, AppointmentStatus};

/// Status rules for queue appointments.
///
/// The service never touches storage. Callers hand it a snapshot of the whole
/// (clinic, date) scope taken under the scope's serialization, and persist whatever it
/// returns inside that same critical section.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: &AppointmentStatus,
        new_status: &AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidTransition {
                from: *current_status,
                to: *new_status,
            });
        }

        Ok(())
    }

    /// Get all valid next statuses for a given current status
    pub fn get_valid_transitions(&self, current_status: &AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Booked | AppointmentStatus::Confirmed => vec![
                AppointmentStatus::Ongoing,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Ongoing => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            // Terminal states - no transitions allowed
            AppointmentStatus::Completed => vec![],
            AppointmentStatus::Cancelled => vec![],
        }
    }

    /// Compute the new state of one appointment in `scope` after moving it to `target`.
    ///
    /// Checking in fails with `QueueConflict` while another appointment of the scope is
    /// ongoing; it never demotes or completes the other appointment implicitly.
    pub fn plan_transition(
        &self,
        scope: &[Appointment],
        appointment_id: Uuid,
        target: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let current = scope
            .iter()
            .find(|appointment| appointment.id == appointment_id)
            .ok_or_else(|| AppointmentError::NotFound(appointment_id.to_string()))?;

        self.validate_status_transition(&current.status, &target)?;

        if target == AppointmentStatus::Ongoing {
            if let Some(ongoing) = ongoing_in(scope).filter(|ongoing| ongoing.id != appointment_id) {
                warn!(
                    "Check-in of token {} refused, token {} is still ongoing in {}",
                    current.token_number,
                    ongoing.token_number,
                    current.scope()
                );
                return Err(AppointmentError::QueueConflict {
                    scope: current.scope().to_string(),
                    ongoing_token: ongoing.token_number,
                });
            }
        }

        let mut updated = current.clone();
        stamp(&mut updated, target, now);

        info!(
            "Token {} in {} moved {} -> {}",
            updated.token_number,
            updated.scope(),
            current.status,
            updated.status
        );
        Ok(updated)
    }

    /// "Next patient": complete whoever is ongoing, then check in the lowest waiting token.
    ///
    /// Both halves are optional. An empty plan means the scope has nobody ongoing and
    /// nobody waiting.
    pub fn plan_call_next(
        &self,
        scope: &[Appointment],
        now: DateTime<Utc>,
    ) -> Result<CallNextPlan, AppointmentError> {
        let completed = match ongoing_in(scope) {
            Some(ongoing) => Some(self.plan_transition(scope, ongoing.id, AppointmentStatus::Completed, now)?),
            None => None,
        };

        let next_waiting = scope
            .iter()
            .filter(|appointment| appointment.is_waiting())
            .min_by_key(|appointment| appointment.token_number);

        let checked_in = match next_waiting {
            Some(next) => {
                self.validate_status_transition(&next.status, &AppointmentStatus::Ongoing)?;
                let mut updated = next.clone();
                stamp(&mut updated, AppointmentStatus::Ongoing, now);
                Some(updated)
            }
            None => None,
        };

        Ok(CallNextPlan {
            completed,
            checked_in,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallNextPlan {
    pub completed: Option<Appointment>,
    pub checked_in: Option<Appointment>,
}

impl CallNextPlan {
    pub fn is_empty(&self) -> bool {
        self.completed.is_none() && self.checked_in.is_none()
    }

    pub fn changed(&self) -> Vec<Appointment> {
        self.completed
            .iter()
            .chain(self.checked_in.iter())
            .cloned()
            .collect()
    }
}

/// The appointment currently being attended to in a scope snapshot, if any.
pub fn ongoing_in(scope: &[Appointment]) -> Option<&Appointment> {
    scope
        .iter()
        .find(|appointment| appointment.status == AppointmentStatus::Ongoing)
}

fn stamp(appointment: &mut Appointment, target: AppointmentStatus, now: DateTime<Utc>) {
    appointment.status = target;
    match target {
        AppointmentStatus::Ongoing => appointment.checked_in_at = Some(now),
        AppointmentStatus::Completed => appointment.completed_at = Some(now),
        AppointmentStatus::Cancelled => appointment.cancelled_at = Some(now),
        AppointmentStatus::Booked | AppointmentStatus::Confirmed => {}
    }
}
