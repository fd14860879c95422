use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClinicError {
    #[error("Invalid operating hours configuration: {0}")]
    InvalidConfiguration(String),
}
