use serde::{Deserialize, Serialize};

use super::fingerprint::Fingerprint;
use super::severity::Severity;
use crate::error::DomainError;

pub const MAX_SERVICE_LEN: usize = 255;
pub const MAX_INSTANCE_LEN: usize = 255;
pub const MAX_MESSAGE_LEN: usize = 1000;

/// The canonical "who is complaining about what" tuple every alert is reduced to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertIdentity {
    namespace: String,
    service: String,
    instance: String,
    severity: Severity,
    message: String,
}

impl AlertIdentity {
    pub fn new(
        namespace: impl Into<String>,
        service: impl Into<String>,
        instance: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let namespace = namespace.into();
        let service = service.into();
        let instance = instance.into();
        let message = message.into();

        if namespace.trim().is_empty() {
            return Err(DomainError::EmptyField("namespace"));
        }
        if service.trim().is_empty() {
            return Err(DomainError::EmptyField("service"));
        }
        if message.trim().is_empty() {
            return Err(DomainError::EmptyField("message"));
        }
        if service.chars().count() > MAX_SERVICE_LEN {
            return Err(DomainError::FieldTooLong {
                field: "service",
                max: MAX_SERVICE_LEN,
            });
        }
        if instance.chars().count() > MAX_INSTANCE_LEN {
            return Err(DomainError::FieldTooLong {
                field: "instance",
                max: MAX_INSTANCE_LEN,
            });
        }
        if message.chars().count() > MAX_MESSAGE_LEN {
            return Err(DomainError::FieldTooLong {
                field: "message",
                max: MAX_MESSAGE_LEN,
            });
        }

        Ok(Self {
            namespace,
            service,
            instance,
            severity,
            message,
        })
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::from_identity(self)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
