use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{EventId, IncidentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Fired,
    Resolved,
    Updated,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fired => "fired",
            Self::Resolved => "resolved",
            Self::Updated => "updated",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable ledger entry recording one state-machine decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentEvent {
    id: EventId,
    incident_id: IncidentId,
    kind: EventKind,
    time: DateTime<Utc>,
    payload: Value,
}

impl IncidentEvent {
    pub fn new(incident_id: IncidentId, kind: EventKind, time: DateTime<Utc>, payload: Value) -> Self {
        Self {
            id: EventId::new(),
            incident_id,
            kind,
            time,
            payload,
        }
    }

    pub fn id(&self) -> &EventId {
        &self.id
    }

    pub fn incident_id(&self) -> &IncidentId {
        &self.incident_id
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }
}
