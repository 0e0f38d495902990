use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use beacon_core::alert::Status;

/// How an alert entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intake {
    Webhook,
    Manual,
}

/// Raw alert data from an external source, before domain validation.
#[derive(Debug, Clone)]
pub struct RawAlert {
    pub intake: Intake,
    pub source: String,
    pub status: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub external_id: Option<String>,
    /// Original notification, stored verbatim on the resulting event.
    pub payload: Value,
    /// Why the alert could not be decoded. Such alerts are rejected one by
    /// one instead of failing the whole delivery.
    pub malformed: Option<String>,
}

impl RawAlert {
    pub fn malformed(intake: Intake, source: impl Into<String>, reason: impl Into<String>, payload: Value) -> Self {
        Self {
            intake,
            source: source.into(),
            status: String::new(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            starts_at: None,
            ends_at: None,
            external_id: None,
            payload,
            malformed: Some(reason.into()),
        }
    }
}

/// An alert raised directly through the API rather than a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualAlert {
    #[serde(default)]
    pub namespace: String,
    pub service: String,
    #[serde(default)]
    pub instance: Option<String>,
    pub severity: String,
    pub message: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
}

impl From<ManualAlert> for RawAlert {
    fn from(manual: ManualAlert) -> Self {
        let payload = json!({
            "namespace": manual.namespace,
            "service": manual.service,
            "instance": manual.instance,
            "severity": manual.severity,
            "message": manual.message,
            "source": manual.source,
            "external_id": manual.external_id,
        });

        let mut labels = BTreeMap::from([
            ("namespace".to_string(), manual.namespace),
            ("service".to_string(), manual.service),
            ("severity".to_string(), manual.severity),
        ]);
        if let Some(instance) = manual.instance {
            labels.insert("instance".into(), instance);
        }

        Self {
            intake: Intake::Manual,
            source: manual.source.unwrap_or_else(|| "manual".into()),
            status: Status::Firing.as_str().into(),
            labels,
            annotations: BTreeMap::from([("summary".to_string(), manual.message)]),
            starts_at: None,
            ends_at: None,
            external_id: manual.external_id,
            payload,
            malformed: None,
        }
    }
}

/// Filter criteria for querying incidents.
#[derive(Debug, Clone, Default)]
pub struct IncidentFilter {
    pub status: Option<Status>,
    pub namespace: Option<String>,
    pub service: Option<String>,
    pub fingerprint: Option<String>,
    pub page: u32,
    pub per_page: u32,
}
