//! Persistence port for queue state.
//!
//! Every write to a (clinic, date) scope goes through one of two entry points:
//! [`QueueStore::insert_next`] for allocation and [`QueueStore::mutate_scope`] for status
//! changes. Implementations serialize both per scope, never globally.

pub mod memory;
pub mod redis_store;

use async_trait::async_trait;
use uuid::Uuid;

use appointment_cell::{Appointment, NewAppointment, ScopeKey};
use clinic_cell::Clinic;

use crate::BookingQueueError;

pub use self::memory::InMemoryQueueStore;
pub use self::redis_store::RedisQueueStore;

/// Computes the appointments to rewrite from a consistent snapshot of one scope.
///
/// May be invoked more than once when a store retries after a concurrent write, so it
/// must not have side effects.
pub type ScopeMutation<'a> =
    &'a (dyn Fn(&[Appointment]) -> Result<Vec<Appointment>, BookingQueueError> + Send + Sync);

/// A tracked appointment together with its whole scope, read at one point in time.
#[derive(Debug, Clone)]
pub struct TrackingView {
    pub appointment: Appointment,
    pub scope: Vec<Appointment>,
}

#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn put_clinic(&self, clinic: &Clinic) -> Result<(), BookingQueueError>;

    async fn get_clinic(&self, clinic_id: &str) -> Result<Option<Clinic>, BookingQueueError>;

    /// Take the next token of the draft's scope and persist the appointment in the same
    /// atomic step. Returns `Ok(None)`, consuming nothing, when the tracking code is taken.
    async fn insert_next(
        &self,
        draft: &NewAppointment,
        tracking_code: &str,
    ) -> Result<Option<Appointment>, BookingQueueError>;

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, BookingQueueError>;

    /// All appointments of the scope, ordered by token.
    async fn list_scope(&self, scope: &ScopeKey) -> Result<Vec<Appointment>, BookingQueueError>;

    async fn tracking_view(&self, tracking_code: &str) -> Result<Option<TrackingView>, BookingQueueError>;

    /// Run `mutation` against the scope under its serialization and persist what it returns.
    async fn mutate_scope(
        &self,
        scope: &ScopeKey,
        mutation: ScopeMutation<'_>,
    ) -> Result<Vec<Appointment>, BookingQueueError>;

    /// Administrative removal. The scope's token counter is left untouched.
    async fn delete_appointment(&self, id: Uuid) -> Result<Option<Appointment>, BookingQueueError>;
}

pub(crate) fn sort_by_token(mut appointments: Vec<Appointment>) -> Vec<Appointment> {
    appointments.sort_by_key(|appointment| appointment.token_number);
    appointments
}
