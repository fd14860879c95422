pub mod error;
pub mod models;
pub mod services;

pub use error::ClinicError;
pub use models::*;
pub use services::hours::{generate_slots, is_offered_slot, slots, validate_operating_hours, SlotIter};
