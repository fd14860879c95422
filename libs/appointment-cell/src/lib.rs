pub mod models;
pub mod services;

pub use models::*;
pub use services::lifecycle::{ongoing_in, AppointmentLifecycleService, CallNextPlan};
