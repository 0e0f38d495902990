use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use serde::Deserialize;
use serde_json::Value;

use beacon_ports::error::ParseError;
use beacon_ports::outbound::AlertSourceParser;
use beacon_ports::types::{Intake, RawAlert};

const SOURCE: &str = "alertmanager";

/// Alertmanager webhook delivery. Only `alerts` matters; group metadata is
/// ignored.
#[derive(Debug, Deserialize)]
struct WebhookPayload {
    alerts: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookAlert {
    #[serde(default)]
    status: String,
    #[serde(default)]
    labels: BTreeMap<String, String>,
    #[serde(default)]
    annotations: BTreeMap<String, String>,
    #[serde(default)]
    starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    fingerprint: Option<String>,
}

/// Alertmanager sends `0001-01-01T00:00:00Z` for "not set".
fn meaningful(ts: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    ts.filter(|t| t.year() > 1)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AlertmanagerParser;

impl AlertSourceParser for AlertmanagerParser {
    fn parse(&self, payload: &[u8]) -> Result<Vec<RawAlert>, ParseError> {
        let webhook: WebhookPayload = serde_json::from_slice(payload).map_err(|e| {
            if e.is_data() {
                ParseError::MissingField(e.to_string())
            } else {
                ParseError::InvalidJson(e.to_string())
            }
        })?;

        let alerts = webhook
            .alerts
            .into_iter()
            .enumerate()
            .map(|(index, value)| match serde_json::from_value::<WebhookAlert>(value.clone()) {
                Ok(alert) => RawAlert {
                    intake: Intake::Webhook,
                    source: SOURCE.into(),
                    status: alert.status,
                    labels: alert.labels,
                    annotations: alert.annotations,
                    starts_at: meaningful(alert.starts_at),
                    ends_at: meaningful(alert.ends_at),
                    external_id: alert.fingerprint.filter(|f| !f.is_empty()),
                    payload: value,
                    malformed: None,
                },
                Err(e) => RawAlert::malformed(Intake::Webhook, SOURCE, format!("alerts[{index}]: {e}"), value),
            })
            .collect();
        Ok(alerts)
    }

    fn source_name(&self) -> &str {
        SOURCE
    }
}
