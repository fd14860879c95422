pub mod redis_pool;

pub use redis_pool::{create_redis_pool, pool_from_config, RedisPool};
