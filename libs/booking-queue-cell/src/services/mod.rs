pub mod allocator;
pub mod booking;
pub mod notifier;
pub mod status;
pub mod tracking;

pub use allocator::TokenAllocator;
pub use booking::QueueBookingService;
pub use notifier::{BroadcastNotifier, QueueEvent, QueueNotifier};
pub use status::{compute_queue_status, now_serving, QueueStatusEngine};
pub use tracking::{generate_tracking_code, normalize_tracking_code};
