pub mod models;
pub mod services;
pub mod store;
pub mod error;
pub mod handlers;
pub mod router;

pub use models::*;
pub use error::*;
pub use services::*;
pub use store::{InMemoryQueueStore, QueueStore, RedisQueueStore, ScopeMutation, TrackingView};
pub use router::create_booking_queue_router;
