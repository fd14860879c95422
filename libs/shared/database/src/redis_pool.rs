use anyhow::{anyhow, Context, Result};
use deadpool_redis::{Config, Pool, Runtime};
use tracing::{debug, info};

use shared_config::AppConfig;

pub type RedisPool = Pool;

/// Build a Redis connection pool and verify it with a PING before handing it out.
pub async fn create_redis_pool(redis_url: &str) -> Result<RedisPool> {
    let cfg = Config::from_url(redis_url);
    let pool = cfg
        .create_pool(Some(Runtime::Tokio1))
        .map_err(|e| anyhow!("Failed to create Redis pool: {}", e))?;

    let mut conn = pool
        .get()
        .await
        .map_err(|e| anyhow!("Failed to connect to Redis: {}", e))?;

    let pong: String = redis::cmd("PING")
        .query_async(&mut conn)
        .await
        .context("Redis did not answer PING")?;
    debug!("Redis answered {}", pong);

    info!("Redis pool initialized");
    Ok(pool)
}

/// Pool for the configured `REDIS_URL`, or `None` when the deployment runs without Redis.
pub async fn pool_from_config(config: &AppConfig) -> Result<Option<RedisPool>> {
    match config.redis_url.as_deref() {
        Some(url) => create_redis_pool(url).await.map(Some),
        None => Ok(None),
    }
}
