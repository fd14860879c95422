use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub redis_url: Option<String>,
    pub average_minutes_per_token: u32,
    pub scope_lock_timeout_ms: u64,
    pub max_conflict_retries: u32,
    pub tracking_code_length: usize,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            average_minutes_per_token: 5,
            scope_lock_timeout_ms: 2000,
            max_conflict_retries: 5,
            tracking_code_length: 8,
            port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let redis_url = match env::var("REDIS_URL") {
            Ok(url) if !url.trim().is_empty() => Some(url),
            _ => {
                warn!("REDIS_URL not set, queue state will be kept in memory");
                None
            }
        };

        Self {
            redis_url,
            average_minutes_per_token: parse_or(
                "AVERAGE_MINUTES_PER_TOKEN",
                defaults.average_minutes_per_token,
            ),
            scope_lock_timeout_ms: parse_or("SCOPE_LOCK_TIMEOUT_MS", defaults.scope_lock_timeout_ms),
            max_conflict_retries: parse_or("MAX_CONFLICT_RETRIES", defaults.max_conflict_retries),
            tracking_code_length: parse_or("TRACKING_CODE_LENGTH", defaults.tracking_code_length),
            port: parse_or("PORT", defaults.port),
        }
    }

    pub fn uses_redis(&self) -> bool {
        self.redis_url.is_some()
    }
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display + Copy,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
