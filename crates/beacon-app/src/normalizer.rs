use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use beacon_core::alert::identity::{MAX_INSTANCE_LEN, MAX_MESSAGE_LEN, MAX_SERVICE_LEN};
use beacon_core::alert::{AlertIdentity, AlertSignal, Severity, Status};
use beacon_core::error::DomainError;
use beacon_core::service::{ServiceKey, ServiceUpdate, TagSource};
use beacon_ports::types::{Intake, RawAlert};

use crate::tag_policy::{first_label, LabelAttributes, TagPolicy};

const SERVICE_LABELS: [&str; 3] = ["service_name", "service", "job"];
const NAMESPACE_LABELS: [&str; 3] = ["namespace", "kubernetes_namespace", "k8s_namespace"];
const MESSAGE_ANNOTATIONS: [&str; 3] = ["summary", "description", "message"];
pub const FALLBACK_MESSAGE: &str = "No description provided";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("malformed alert: {0}")]
    Malformed(String),
    #[error("no service, service_name or job label")]
    MissingService,
    #[error("service name is {0} characters, limit is {max}", max = MAX_SERVICE_LEN)]
    ServiceTooLong(usize),
    #[error("instance is {0} characters, limit is {max}", max = MAX_INSTANCE_LEN)]
    InstanceTooLong(usize),
    #[error("status must be firing or resolved, got {0:?}")]
    InvalidStatus(String),
    #[error("invalid identity: {0}")]
    InvalidIdentity(DomainError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub reasons: Vec<RejectReason>,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reasons: Vec<String> = self.reasons.iter().map(ToString::to_string).collect();
        write!(f, "alert rejected: {}", reasons.join("; "))
    }
}

impl std::error::Error for Rejection {}

/// A validated alert plus what it says about its service.
#[derive(Debug, Clone)]
pub struct NormalizedAlert {
    pub identity: AlertIdentity,
    pub status: Status,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub source: String,
    pub external_id: Option<String>,
    pub service_update: ServiceUpdate,
    pub payload: Value,
    pub warnings: Vec<String>,
}

impl NormalizedAlert {
    pub fn service_key(&self) -> Result<ServiceKey, DomainError> {
        ServiceKey::new(self.identity.namespace(), self.identity.service())
    }

    /// Fingerprints the identity.
    pub fn to_signal(&self) -> AlertSignal {
        let mut signal = AlertSignal::new(
            self.identity.clone(),
            self.status,
            self.starts_at,
            self.source.clone(),
        )
        .with_payload(self.payload.clone());
        signal.ends_at = self.ends_at;
        signal.external_id = self.external_id.clone();
        signal
    }
}

/// Reduces heterogeneous alert payloads to a validated `AlertIdentity`.
#[derive(Debug, Clone)]
pub struct IdentityNormalizer {
    default_namespace: String,
    tags: TagPolicy,
}

impl IdentityNormalizer {
    pub fn new(default_namespace: impl Into<String>, tags: TagPolicy) -> Self {
        Self {
            default_namespace: default_namespace.into(),
            tags,
        }
    }

    pub fn normalize(&self, raw: &RawAlert, now: DateTime<Utc>) -> Result<NormalizedAlert, Rejection> {
        if let Some(reason) = &raw.malformed {
            return Err(self.reject(raw, vec![RejectReason::Malformed(reason.clone())]));
        }

        let mut reasons = Vec::new();

        let service = first_label(&raw.labels, &SERVICE_LABELS);
        match &service {
            None => reasons.push(RejectReason::MissingService),
            Some(name) if name.chars().count() > MAX_SERVICE_LEN => {
                reasons.push(RejectReason::ServiceTooLong(name.chars().count()))
            }
            Some(_) => {}
        }

        let instance = first_label(&raw.labels, &["instance"]).unwrap_or_default();
        if instance.chars().count() > MAX_INSTANCE_LEN {
            reasons.push(RejectReason::InstanceTooLong(instance.chars().count()));
        }

        let status = match raw.status.parse::<Status>() {
            Ok(status) => Some(status),
            Err(_) => {
                reasons.push(RejectReason::InvalidStatus(raw.status.clone()));
                None
            }
        };

        let (Some(service), Some(status), true) = (service, status, reasons.is_empty()) else {
            return Err(self.reject(raw, reasons));
        };

        let mut warnings = Vec::new();
        let namespace = first_label(&raw.labels, &NAMESPACE_LABELS)
            .unwrap_or_else(|| self.default_namespace.clone());
        let severity = Severity::from_label(raw.labels.get("severity").map_or("", String::as_str));

        let mut message = first_label(&raw.annotations, &MESSAGE_ANNOTATIONS)
            .or_else(|| first_label(&raw.labels, &["alertname"]))
            .unwrap_or_else(|| FALLBACK_MESSAGE.to_string());
        if message.chars().count() > MAX_MESSAGE_LEN {
            warnings.push(format!(
                "message truncated from {} to {MAX_MESSAGE_LEN} characters",
                message.chars().count()
            ));
            message = message.chars().take(MAX_MESSAGE_LEN).collect();
        }

        let starts_at = raw.starts_at.unwrap_or(now);
        if let Some(ends_at) = raw.ends_at {
            if status == Status::Resolved && ends_at <= starts_at {
                warnings.push(format!(
                    "end time {ends_at} is not after start time {starts_at}"
                ));
            }
        }

        let identity = AlertIdentity::new(namespace, service, instance, severity, message)
            .map_err(|e| self.reject(raw, vec![RejectReason::InvalidIdentity(e)]))?;

        for warning in &warnings {
            tracing::warn!(
                service = identity.service(),
                namespace = identity.namespace(),
                warning = warning.as_str(),
                "alert normalized with warning"
            );
        }

        Ok(NormalizedAlert {
            service_update: self.service_update(raw),
            identity,
            status,
            starts_at,
            ends_at: raw.ends_at,
            source: raw.source.clone(),
            external_id: raw.external_id.clone(),
            payload: raw.payload.clone(),
            warnings,
        })
    }

    /// Alert-derived metadata always speaks for the alerting tier. Manual alerts
    /// carry no label set, so they assert no tags and retract none.
    fn service_update(&self, raw: &RawAlert) -> ServiceUpdate {
        let attributes = LabelAttributes::from_labels(&raw.labels);
        let tags = match raw.intake {
            Intake::Webhook => Some(self.tags.label_tags(&raw.labels)),
            Intake::Manual => None,
        };
        ServiceUpdate {
            source: TagSource::Alertmanager,
            tags,
            environment: attributes.environment,
            team: attributes.team,
            component_type: attributes.component_type,
        }
    }

    fn reject(&self, raw: &RawAlert, reasons: Vec<RejectReason>) -> Rejection {
        let rejection = Rejection { reasons };
        tracing::warn!(
            source = raw.source.as_str(),
            alertname = raw.labels.get("alertname").map_or("", String::as_str),
            reason = %rejection,
            "alert dropped during normalization"
        );
        rejection
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        chrono::DateTime::parse_from_rfc3339(s)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn now() -> DateTime<Utc> {
        ts("2025-01-15T10:00:00Z")
    }

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn raw(labels: &[(&str, &str)], annotations: &[(&str, &str)]) -> RawAlert {
        RawAlert {
            intake: Intake::Webhook,
            source: "alertmanager".into(),
            status: "firing".into(),
            labels: map(labels),
            annotations: map(annotations),
            starts_at: Some(ts("2025-01-15T09:59:00Z")),
            ends_at: None,
            external_id: None,
            payload: Value::Null,
            malformed: None,
        }
    }

    fn normalizer() -> IdentityNormalizer {
        IdentityNormalizer::new("default", TagPolicy::default())
    }

    #[test]
    fn service_resolution_order() {
        let n = normalizer();
        let alert = raw(&[("service_name", "a"), ("service", "b"), ("job", "c")], &[]);
        assert_eq!(n.normalize(&alert, now()).unwrap().identity.service(), "a");
        let alert = raw(&[("service", "b"), ("job", "c")], &[]);
        assert_eq!(n.normalize(&alert, now()).unwrap().identity.service(), "b");
        let alert = raw(&[("job", "c")], &[]);
        assert_eq!(n.normalize(&alert, now()).unwrap().identity.service(), "c");
    }

    #[test]
    fn undecodable_alert_is_rejected() {
        let alert = RawAlert::malformed(
            Intake::Webhook,
            "alertmanager",
            "startsAt: input contains invalid characters",
            Value::Null,
        );
        let err = normalizer().normalize(&alert, now()).unwrap_err();
        assert_eq!(
            err.reasons,
            vec![RejectReason::Malformed(
                "startsAt: input contains invalid characters".into()
            )]
        );
    }

    #[test]
    fn missing_service_is_rejected() {
        let err = normalizer()
            .normalize(&raw(&[("alertname", "X")], &[]), now())
            .unwrap_err();
        assert_eq!(err.reasons, vec![RejectReason::MissingService]);
    }

    #[test]
    fn namespace_falls_back_to_default() {
        let n = normalizer();
        let alert = raw(&[("service", "api"), ("namespace", " ")], &[]);
        assert_eq!(n.normalize(&alert, now()).unwrap().identity.namespace(), "default");
        let alert = raw(&[("service", "api"), ("kubernetes_namespace", "pay")], &[]);
        assert_eq!(n.normalize(&alert, now()).unwrap().identity.namespace(), "pay");
    }

    #[test]
    fn severity_mapping_and_default() {
        let n = normalizer();
        let alert = raw(&[("service", "api"), ("severity", "EMERGENCY")], &[]);
        assert_eq!(n.normalize(&alert, now()).unwrap().identity.severity(), Severity::Fatal);
        let alert = raw(&[("service", "api"), ("severity", "p1")], &[]);
        assert_eq!(n.normalize(&alert, now()).unwrap().identity.severity(), Severity::Warning);
        let alert = raw(&[("service", "api")], &[]);
        assert_eq!(n.normalize(&alert, now()).unwrap().identity.severity(), Severity::Warning);
    }

    #[test]
    fn message_resolution_order() {
        let n = normalizer();
        let alert = raw(
            &[("service", "api"), ("alertname", "HighCPU")],
            &[("description", "desc"), ("summary", "sum")],
        );
        assert_eq!(n.normalize(&alert, now()).unwrap().identity.message(), "sum");
        let alert = raw(&[("service", "api"), ("alertname", "HighCPU")], &[("message", "msg")]);
        assert_eq!(n.normalize(&alert, now()).unwrap().identity.message(), "msg");
        let alert = raw(&[("service", "api"), ("alertname", "HighCPU")], &[]);
        assert_eq!(n.normalize(&alert, now()).unwrap().identity.message(), "HighCPU");
        let alert = raw(&[("service", "api")], &[]);
        assert_eq!(
            n.normalize(&alert, now()).unwrap().identity.message(),
            FALLBACK_MESSAGE
        );
    }

    #[test]
    fn long_message_truncated_with_warning() {
        let long = "x".repeat(MAX_MESSAGE_LEN + 50);
        let alert = raw(&[("service", "api")], &[("summary", long.as_str())]);
        let normalized = normalizer().normalize(&alert, now()).unwrap();
        assert_eq!(normalized.identity.message().chars().count(), MAX_MESSAGE_LEN);
        assert_eq!(normalized.warnings.len(), 1);
    }

    #[test]
    fn long_service_and_instance_rejected() {
        let service = "s".repeat(MAX_SERVICE_LEN + 1);
        let instance = "i".repeat(MAX_INSTANCE_LEN + 1);
        let alert = raw(&[("service", service.as_str()), ("instance", instance.as_str())], &[]);
        let err = normalizer().normalize(&alert, now()).unwrap_err();
        assert_eq!(
            err.reasons,
            vec![
                RejectReason::ServiceTooLong(MAX_SERVICE_LEN + 1),
                RejectReason::InstanceTooLong(MAX_INSTANCE_LEN + 1)
            ]
        );
    }

    #[test]
    fn unknown_status_rejected() {
        let mut alert = raw(&[("service", "api")], &[]);
        alert.status = "pending".into();
        let err = normalizer().normalize(&alert, now()).unwrap_err();
        assert_eq!(err.reasons, vec![RejectReason::InvalidStatus("pending".into())]);
    }

    #[test]
    fn end_before_start_is_only_a_warning() {
        let mut alert = raw(&[("service", "api")], &[]);
        alert.status = "resolved".into();
        alert.ends_at = Some(ts("2025-01-15T09:00:00Z"));
        let normalized = normalizer().normalize(&alert, now()).unwrap();
        assert_eq!(normalized.status, Status::Resolved);
        assert_eq!(normalized.warnings.len(), 1);
    }

    #[test]
    fn missing_start_uses_now() {
        let mut alert = raw(&[("service", "api")], &[]);
        alert.starts_at = None;
        assert_eq!(normalizer().normalize(&alert, now()).unwrap().starts_at, now());
    }

    #[test]
    fn webhook_alerts_assert_label_tags() {
        let alert = raw(&[("service", "api"), ("tier", "gold"), ("env", "prod")], &[]);
        let update = normalizer().normalize(&alert, now()).unwrap().service_update;
        assert_eq!(update.source, TagSource::Alertmanager);
        assert_eq!(
            update.tags,
            Some(std::collections::BTreeSet::from(["tier:gold".to_string()]))
        );
        assert_eq!(update.environment.as_deref(), Some("prod"));
    }

    #[test]
    fn manual_alerts_assert_no_tags() {
        let mut alert = raw(&[("service", "api"), ("tier", "gold")], &[]);
        alert.intake = Intake::Manual;
        let update = normalizer().normalize(&alert, now()).unwrap().service_update;
        assert!(update.tags.is_none());
    }

    #[test]
    fn signal_carries_fingerprint_of_identity() {
        let alert = raw(&[("service", "api")], &[("summary", "disk at 95% full")]);
        let normalized = normalizer().normalize(&alert, now()).unwrap();
        let signal = normalized.to_signal();
        assert_eq!(signal.fingerprint, normalized.identity.fingerprint());
        assert_eq!(signal.starts_at, ts("2025-01-15T09:59:00Z"));
    }
}
