use std::time::Duration;

use beacon_core::error::DomainError;
use beacon_ports::error::{ParseError, PortError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("port error: {0}")]
    Port(#[from] PortError),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("incident not found: {0}")]
    IncidentNotFound(String),
    #[error("batch timed out after {0:?}")]
    Timeout(Duration),
    #[error("batch aborted, {discarded} processed alerts rolled back: {cause}")]
    BatchAborted {
        discarded: usize,
        #[source]
        cause: Box<AppError>,
    },
}

impl AppError {
    /// Structural errors abort the whole unit of work. Everything else is
    /// confined to the alert being processed.
    pub fn is_structural(&self) -> bool {
        match self {
            Self::Port(PortError::Conflict(_) | PortError::Corrupt(_)) => false,
            Self::Port(_) => true,
            Self::IncidentNotFound(_) | Self::Timeout(_) | Self::BatchAborted { .. } => true,
            Self::Domain(_) | Self::Parse(_) => false,
        }
    }
}
