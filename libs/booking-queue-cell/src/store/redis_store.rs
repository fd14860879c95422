use async_trait::async_trait;
use chrono::Utc;
use deadpool_redis::{Connection, Pool};
use redis::{AsyncCommands, Script};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use appointment_cell::{Appointment, NewAppointment, ScopeKey};
use clinic_cell::Clinic;
use shared_database::create_redis_pool;

use super::{sort_by_token, QueueStore, ScopeMutation, TrackingView};
use crate::{BookingQueueError, QueueSettings};

// KEYS: counter, scope hash, tracking index, id index
// ARGV: appointment id, appointment json (token placeholder), locator json
// The json is spliced, never decoded, so stored values keep their exact encoding.
const ALLOCATE_LUA: &str = r#"
if redis.call('EXISTS', KEYS[3]) == 1 then
    return false
end
local token = redis.call('INCR', KEYS[1])
local stored = string.gsub(ARGV[2], '"token_number":0', '"token_number":' .. token, 1)
redis.call('HSET', KEYS[2], ARGV[1], stored)
redis.call('SET', KEYS[3], ARGV[3])
redis.call('SET', KEYS[4], ARGV[3])
return token
"#;

/// How an unallocated token serializes; quotes inside string values are always escaped,
/// so this text only ever matches the real field.
const TOKEN_PLACEHOLDER: &str = "\"token_number\":0";

// KEYS: scope hash, tracking index, id index
// ARGV: appointment id
const DELETE_LUA: &str = r#"
local data = redis.call('HGET', KEYS[1], ARGV[1])
if not data then
    return false
end
redis.call('HDEL', KEYS[1], ARGV[1])
redis.call('DEL', KEYS[2], KEYS[3])
return data
"#;

/// Where an appointment lives; stored under both its tracking code and its id.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Locator {
    appointment_id: Uuid,
    scope: ScopeKey,
}

/// Redis-backed queue state.
///
/// Key layout:
/// - `queue:counter:{clinic}:{date}` last token handed out, only ever `INCR`ed
/// - `queue:scope:{clinic}:{date}` hash of appointment id to appointment json
/// - `queue:tracking:{code}` and `queue:appointment:{id}` locators
/// - `queue:clinic:{clinic}` clinic settings json
pub struct RedisQueueStore {
    pool: Pool,
    allocate_script: Script,
    delete_script: Script,
    lock_timeout: Duration,
    max_conflict_retries: u32,
}

impl RedisQueueStore {
    pub fn new(pool: Pool, settings: &QueueSettings) -> Self {
        Self {
            pool,
            allocate_script: Script::new(ALLOCATE_LUA),
            delete_script: Script::new(DELETE_LUA),
            lock_timeout: settings.scope_lock_timeout,
            max_conflict_retries: settings.max_conflict_retries.max(1),
        }
    }

    pub async fn connect(redis_url: &str, settings: &QueueSettings) -> Result<Self, BookingQueueError> {
        let pool = create_redis_pool(redis_url)
            .await
            .map_err(|e| BookingQueueError::StoreError(e.to_string()))?;
        info!("Redis queue store initialized");
        Ok(Self::new(pool, settings))
    }

    async fn get_connection(&self) -> Result<Connection, BookingQueueError> {
        self.pool.get().await.map_err(|e| {
            BookingQueueError::RedisError(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "Failed to get Redis connection",
                e.to_string(),
            )))
        })
    }

    /// Bound a wait on a scope by `deadline`. Only reads and connection checkout go
    /// through here; a write that has been sent is always awaited to completion.
    async fn before_deadline<T, F>(
        &self,
        scope: &ScopeKey,
        deadline: Instant,
        operation: F,
    ) -> Result<T, BookingQueueError>
    where
        F: Future<Output = Result<T, BookingQueueError>>,
    {
        match timeout_at(deadline, operation).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Timed out waiting for scope {}", scope);
                Err(BookingQueueError::ScopeLockTimeout {
                    scope: scope.to_string(),
                    timeout_ms: self.lock_timeout.as_millis() as u64,
                })
            }
        }
    }

    async fn checkout(&self, scope: &ScopeKey) -> Result<Connection, BookingQueueError> {
        let deadline = Instant::now() + self.lock_timeout;
        self.before_deadline(scope, deadline, self.get_connection()).await
    }

    async fn read_locator(&self, conn: &mut Connection, key: &str) -> Result<Option<Locator>, BookingQueueError> {
        let raw: Option<String> = conn.get(key).await?;
        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(BookingQueueError::from)
    }

    async fn read_scope(conn: &mut Connection, hash_key: &str) -> Result<Vec<Appointment>, BookingQueueError> {
        let rows: Vec<String> = conn.hvals(hash_key).await?;
        let appointments = rows
            .iter()
            .map(|row| serde_json::from_str::<Appointment>(row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sort_by_token(appointments))
    }
}

fn counter_key(scope: &ScopeKey) -> String {
    format!("queue:counter:{}", scope)
}

fn scope_key(scope: &ScopeKey) -> String {
    format!("queue:scope:{}", scope)
}

fn tracking_key(code: &str) -> String {
    format!("queue:tracking:{}", code)
}

fn locator_key(id: Uuid) -> String {
    format!("queue:appointment:{}", id)
}

fn clinic_key(clinic_id: &str) -> String {
    format!("queue:clinic:{}", clinic_id)
}

#[async_trait]
impl QueueStore for RedisQueueStore {
    async fn put_clinic(&self, clinic: &Clinic) -> Result<(), BookingQueueError> {
        let mut conn = self.get_connection().await?;
        let _: () = conn
            .set(clinic_key(&clinic.id), serde_json::to_string(clinic)?)
            .await?;
        Ok(())
    }

    async fn get_clinic(&self, clinic_id: &str) -> Result<Option<Clinic>, BookingQueueError> {
        let mut conn = self.get_connection().await?;
        let raw: Option<String> = conn.get(clinic_key(clinic_id)).await?;
        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(BookingQueueError::from)
    }

    async fn insert_next(
        &self,
        draft: &NewAppointment,
        tracking_code: &str,
    ) -> Result<Option<Appointment>, BookingQueueError> {
        let scope = draft.scope();
        let id = Uuid::new_v4();
        let mut appointment = draft
            .clone()
            .into_appointment(id, 0, tracking_code.to_string(), Utc::now());
        let payload = serde_json::to_string(&appointment)?;
        if !payload.contains(TOKEN_PLACEHOLDER) {
            return Err(BookingQueueError::StoreError(
                "appointment json has no token field".to_string(),
            ));
        }
        let locator = serde_json::to_string(&Locator {
            appointment_id: id,
            scope: scope.clone(),
        })?;

        let mut conn = self.checkout(&scope).await?;
        let token: Option<u32> = self
            .allocate_script
            .key(counter_key(&scope))
            .key(scope_key(&scope))
            .key(tracking_key(tracking_code))
            .key(locator_key(id))
            .arg(id.to_string())
            .arg(&payload)
            .arg(&locator)
            .invoke_async(&mut conn)
            .await?;

        Ok(token.map(|token| {
            appointment.token_number = token;
            debug!("Stored token {} in Redis", token);
            appointment
        }))
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, BookingQueueError> {
        let mut conn = self.get_connection().await?;
        let Some(locator) = self.read_locator(&mut conn, &locator_key(id)).await? else {
            return Ok(None);
        };

        let raw: Option<String> = conn.hget(scope_key(&locator.scope), id.to_string()).await?;
        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(BookingQueueError::from)
    }

    async fn list_scope(&self, scope: &ScopeKey) -> Result<Vec<Appointment>, BookingQueueError> {
        let mut conn = self.get_connection().await?;
        Self::read_scope(&mut conn, &scope_key(scope)).await
    }

    async fn tracking_view(&self, tracking_code: &str) -> Result<Option<TrackingView>, BookingQueueError> {
        let mut conn = self.get_connection().await?;
        let Some(locator) = self.read_locator(&mut conn, &tracking_key(tracking_code)).await? else {
            return Ok(None);
        };

        // One HVALS: the target and its neighbours come from the same instant.
        let scope = Self::read_scope(&mut conn, &scope_key(&locator.scope)).await?;
        Ok(scope
            .iter()
            .find(|a| a.id == locator.appointment_id)
            .cloned()
            .map(|appointment| TrackingView { appointment, scope }))
    }

    async fn mutate_scope(
        &self,
        scope: &ScopeKey,
        mutation: ScopeMutation<'_>,
    ) -> Result<Vec<Appointment>, BookingQueueError> {
        let hash_key = scope_key(scope);
        let deadline = Instant::now() + self.lock_timeout;

        let mut conn = self.before_deadline(scope, deadline, self.get_connection()).await?;
        // Pooled connections may carry a WATCH from an abandoned attempt.
        self.before_deadline(scope, deadline, async {
            let _: () = redis::cmd("UNWATCH").query_async(&mut conn).await?;
            Ok::<(), BookingQueueError>(())
        })
        .await?;

        for attempt in 1..=self.max_conflict_retries {
            // Nothing is written before EXEC, so giving up anywhere up to here is safe.
            let snapshot = self
                .before_deadline(scope, deadline, async {
                    let _: () = redis::cmd("WATCH").arg(&hash_key).query_async(&mut conn).await?;
                    Self::read_scope(&mut conn, &hash_key).await
                })
                .await?;

            let changed = match mutation(&snapshot) {
                Ok(changed) if !changed.is_empty() => changed,
                outcome => {
                    let _: () = redis::cmd("UNWATCH").query_async(&mut conn).await?;
                    return outcome;
                }
            };

            let mut pipe = redis::pipe();
            pipe.atomic();
            for appointment in &changed {
                pipe.hset(&hash_key, appointment.id.to_string(), serde_json::to_string(appointment)?)
                    .ignore();
            }

            // A sent EXEC may commit, so its reply is awaited without a deadline.
            let committed: Option<redis::Value> = pipe.query_async(&mut conn).await?;
            if committed.is_some() {
                return Ok(changed);
            }

            debug!("Scope {} changed during attempt {}, retrying", scope, attempt);
        }

        warn!("Scope {} kept changing, giving up after {} attempts", scope, self.max_conflict_retries);
        Err(BookingQueueError::TooManyConflicts {
            scope: scope.to_string(),
            attempts: self.max_conflict_retries,
        })
    }

    async fn delete_appointment(&self, id: Uuid) -> Result<Option<Appointment>, BookingQueueError> {
        let Some(existing) = self.get_appointment(id).await? else {
            return Ok(None);
        };
        let scope = existing.scope();

        let mut conn = self.checkout(&scope).await?;
        let removed: Option<String> = self
            .delete_script
            .key(scope_key(&scope))
            .key(tracking_key(&existing.tracking_code))
            .key(locator_key(id))
            .arg(id.to_string())
            .invoke_async(&mut conn)
            .await?;

        removed
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(BookingQueueError::from)
    }
}
