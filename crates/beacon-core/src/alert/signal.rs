use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{AlertIdentity, Fingerprint, Status};

/// One normalized, fingerprinted alert notification, ready for the incident
/// state machine.
#[derive(Debug, Clone)]
pub struct AlertSignal {
    pub identity: AlertIdentity,
    pub fingerprint: Fingerprint,
    pub status: Status,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub source: String,
    pub external_id: Option<String>,
    pub payload: Value,
}

impl AlertSignal {
    pub fn new(
        identity: AlertIdentity,
        status: Status,
        starts_at: DateTime<Utc>,
        source: impl Into<String>,
    ) -> Self {
        let fingerprint = identity.fingerprint();
        Self {
            identity,
            fingerprint,
            status,
            starts_at,
            ends_at: None,
            source: source.into(),
            external_id: None,
            payload: Value::Null,
        }
    }

    pub fn with_end(mut self, ends_at: DateTime<Utc>) -> Self {
        self.ends_at = Some(ends_at);
        self
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}
