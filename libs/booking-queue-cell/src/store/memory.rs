use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock, RwLockWriteGuard};
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use appointment_cell::{Appointment, NewAppointment, ScopeKey};
use clinic_cell::Clinic;

use super::{QueueStore, ScopeMutation, TrackingView};
use crate::BookingQueueError;

#[derive(Debug, Default)]
struct ScopeState {
    last_token: u32,
    appointments: BTreeMap<u32, Appointment>,
}

#[derive(Debug, Default)]
struct Indexes {
    by_tracking_code: HashMap<String, Uuid>,
    by_id: HashMap<Uuid, ScopeKey>,
}

/// Process-local store. Each scope sits behind its own `RwLock`; writers wait at most
/// `lock_timeout` for it.
///
/// The lookup indexes are never held together with a scope lock. Allocation reserves its
/// tracking code and id first, so the only lock it holds while numbering is its scope's.
pub struct InMemoryQueueStore {
    clinics: RwLock<HashMap<String, Clinic>>,
    scopes: RwLock<HashMap<ScopeKey, Arc<RwLock<ScopeState>>>>,
    indexes: RwLock<Indexes>,
    lock_timeout: Duration,
}

impl InMemoryQueueStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            clinics: RwLock::new(HashMap::new()),
            scopes: RwLock::new(HashMap::new()),
            indexes: RwLock::new(Indexes::default()),
            lock_timeout,
        }
    }

    async fn existing_scope(&self, scope: &ScopeKey) -> Option<Arc<RwLock<ScopeState>>> {
        self.scopes.read().await.get(scope).cloned()
    }

    async fn scope_entry(&self, scope: &ScopeKey) -> Arc<RwLock<ScopeState>> {
        if let Some(existing) = self.existing_scope(scope).await {
            return existing;
        }

        let mut scopes = self.scopes.write().await;
        scopes.entry(scope.clone()).or_default().clone()
    }

    fn timed_out(&self, scope: &ScopeKey) -> BookingQueueError {
        warn!("Timed out waiting for scope {}", scope);
        BookingQueueError::ScopeLockTimeout {
            scope: scope.to_string(),
            timeout_ms: self.lock_timeout.as_millis() as u64,
        }
    }

    async fn lock_scope(
        &self,
        scope: &ScopeKey,
    ) -> Result<OwnedRwLockWriteGuard<ScopeState>, BookingQueueError> {
        timeout(self.lock_timeout, async {
            self.scope_entry(scope).await.write_owned().await
        })
        .await
        .map_err(|_| self.timed_out(scope))
    }

    async fn lock_indexes(&self, scope: &ScopeKey) -> Result<RwLockWriteGuard<'_, Indexes>, BookingQueueError> {
        timeout(self.lock_timeout, self.indexes.write())
            .await
            .map_err(|_| self.timed_out(scope))
    }

    /// Claim `tracking_code` for a not yet numbered appointment. `false` if it is taken.
    async fn reserve(&self, tracking_code: &str, id: Uuid, scope: &ScopeKey) -> Result<bool, BookingQueueError> {
        let mut indexes = self.lock_indexes(scope).await?;
        if indexes.by_tracking_code.contains_key(tracking_code) {
            return Ok(false);
        }
        indexes.by_tracking_code.insert(tracking_code.to_string(), id);
        indexes.by_id.insert(id, scope.clone());
        Ok(true)
    }

    async fn forget(&self, tracking_code: &str, id: Uuid, scope: &ScopeKey) {
        match self.lock_indexes(scope).await {
            Ok(mut indexes) => {
                indexes.by_tracking_code.remove(tracking_code);
                indexes.by_id.remove(&id);
            }
            // Lookups through a stale entry find no appointment and report not found.
            Err(_) => warn!("Left stale index entries for appointment {}", id),
        }
    }

    async fn locate(&self, id: Uuid) -> Option<ScopeKey> {
        self.indexes.read().await.by_id.get(&id).cloned()
    }
}

impl Default for InMemoryQueueStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn put_clinic(&self, clinic: &Clinic) -> Result<(), BookingQueueError> {
        self.clinics
            .write()
            .await
            .insert(clinic.id.clone(), clinic.clone());
        Ok(())
    }

    async fn get_clinic(&self, clinic_id: &str) -> Result<Option<Clinic>, BookingQueueError> {
        Ok(self.clinics.read().await.get(clinic_id).cloned())
    }

    async fn insert_next(
        &self,
        draft: &NewAppointment,
        tracking_code: &str,
    ) -> Result<Option<Appointment>, BookingQueueError> {
        let scope = draft.scope();
        let id = Uuid::new_v4();
        if !self.reserve(tracking_code, id, &scope).await? {
            return Ok(None);
        }

        let mut state = match self.lock_scope(&scope).await {
            Ok(state) => state,
            Err(err) => {
                self.forget(tracking_code, id, &scope).await;
                return Err(err);
            }
        };

        state.last_token += 1;
        let appointment = draft.clone().into_appointment(
            id,
            state.last_token,
            tracking_code.to_string(),
            Utc::now(),
        );
        state
            .appointments
            .insert(appointment.token_number, appointment.clone());

        debug!("Stored token {} in memory", appointment.token_number);
        Ok(Some(appointment))
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, BookingQueueError> {
        let Some(scope) = self.locate(id).await else {
            return Ok(None);
        };
        let Some(entry) = self.existing_scope(&scope).await else {
            return Ok(None);
        };

        let state = entry.read().await;
        Ok(state.appointments.values().find(|a| a.id == id).cloned())
    }

    async fn list_scope(&self, scope: &ScopeKey) -> Result<Vec<Appointment>, BookingQueueError> {
        match self.existing_scope(scope).await {
            Some(entry) => Ok(entry.read().await.appointments.values().cloned().collect()),
            None => Ok(Vec::new()),
        }
    }

    async fn tracking_view(&self, tracking_code: &str) -> Result<Option<TrackingView>, BookingQueueError> {
        let located = {
            let indexes = self.indexes.read().await;
            indexes
                .by_tracking_code
                .get(tracking_code)
                .and_then(|id| indexes.by_id.get(id).map(|scope| (*id, scope.clone())))
        };
        let Some((id, scope)) = located else {
            return Ok(None);
        };
        let Some(entry) = self.existing_scope(&scope).await else {
            return Ok(None);
        };

        let state = entry.read().await;
        let snapshot: Vec<Appointment> = state.appointments.values().cloned().collect();
        Ok(snapshot
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .map(|appointment| TrackingView {
                appointment,
                scope: snapshot,
            }))
    }

    async fn mutate_scope(
        &self,
        scope: &ScopeKey,
        mutation: ScopeMutation<'_>,
    ) -> Result<Vec<Appointment>, BookingQueueError> {
        let mut state = self.lock_scope(scope).await?;
        let snapshot: Vec<Appointment> = state.appointments.values().cloned().collect();

        let changed = mutation(&snapshot)?;
        for appointment in &changed {
            state
                .appointments
                .insert(appointment.token_number, appointment.clone());
        }

        Ok(changed)
    }

    async fn delete_appointment(&self, id: Uuid) -> Result<Option<Appointment>, BookingQueueError> {
        let Some(scope) = self.locate(id).await else {
            return Ok(None);
        };

        let mut state = self.lock_scope(&scope).await?;
        let token = state
            .appointments
            .values()
            .find(|a| a.id == id)
            .map(|a| a.token_number);
        let Some(removed) = token.and_then(|token| state.appointments.remove(&token)) else {
            return Ok(None);
        };
        drop(state);

        self.forget(&removed.tracking_code, removed.id, &scope).await;
        Ok(Some(removed))
    }
}
