use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service-level errors outside the harvest error taxonomy
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Could not read stored samples: {0}")]
    ReadBack(String),

    #[error("Stored sample could not be decoded: {0}")]
    Decode(String),
}
