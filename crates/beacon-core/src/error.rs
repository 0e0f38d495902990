use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("{field} exceeds {max} characters")]
    FieldTooLong { field: &'static str, max: usize },
    #[error("invalid alert status: {0}")]
    InvalidStatus(String),
    #[error("unknown metadata source: {0}")]
    UnknownSource(String),
    #[error("incident is already resolved")]
    IncidentAlreadyResolved,
    #[error("invalid id: {0}")]
    InvalidId(String),
}
