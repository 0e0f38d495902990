pub mod event;
pub mod lifecycle;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::alert::{AlertSignal, Fingerprint, Severity, Status};
use crate::error::DomainError;
use crate::ids::IncidentId;

pub use event::{EventKind, IncidentEvent};
pub use lifecycle::{transition, Action, Transition};

/// How far before its end an orphaned resolve is assumed to have started.
pub const ORPHAN_START_OFFSET_SECS: i64 = 300;

pub fn orphan_start_offset() -> Duration {
    Duration::seconds(ORPHAN_START_OFFSET_SECS)
}

/// One continuous firing-to-resolution occurrence of a fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    id: IncidentId,
    namespace: String,
    service: String,
    instance: String,
    severity: Severity,
    message: String,
    fingerprint: Fingerprint,
    status: Status,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    acknowledged_at: Option<DateTime<Utc>>,
    acknowledged_by: Option<String>,
    source: String,
    external_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Incident {
    /// A firing incident starting at the signal's start time.
    pub fn open(signal: &AlertSignal, now: DateTime<Utc>) -> Self {
        Self::from_signal(signal, Status::Firing, signal.starts_at, None, now)
    }

    /// An incident that is already over when first seen: the resolve arrived
    /// without the matching fire, so the start is estimated.
    pub fn open_resolved(signal: &AlertSignal, end: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self::from_signal(
            signal,
            Status::Resolved,
            end - orphan_start_offset(),
            Some(end),
            now,
        )
    }

    fn from_signal(
        signal: &AlertSignal,
        status: Status,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        let identity = &signal.identity;
        Self {
            id: IncidentId::new(),
            namespace: identity.namespace().to_string(),
            service: identity.service().to_string(),
            instance: identity.instance().to_string(),
            severity: identity.severity(),
            message: identity.message().to_string(),
            fingerprint: signal.fingerprint.clone(),
            status,
            start_time,
            end_time,
            acknowledged_at: None,
            acknowledged_by: None,
            source: signal.source.clone(),
            external_id: signal.external_id.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Closes the incident. An end before the start is clamped to the start.
    pub fn resolve(&mut self, end: DateTime<Utc>, now: DateTime<Utc>) -> Result<Duration, DomainError> {
        if self.status == Status::Resolved {
            return Err(DomainError::IncidentAlreadyResolved);
        }
        let end = end.max(self.start_time);
        self.status = Status::Resolved;
        self.end_time = Some(end);
        self.updated_at = now;
        Ok(end - self.start_time)
    }

    /// Returns `false` when the incident was already acknowledged.
    pub fn acknowledge(&mut self, by: impl Into<String>, now: DateTime<Utc>) -> Result<bool, DomainError> {
        if self.status == Status::Resolved {
            return Err(DomainError::IncidentAlreadyResolved);
        }
        if self.acknowledged_at.is_some() {
            return Ok(false);
        }
        self.acknowledged_at = Some(now);
        self.acknowledged_by = Some(by.into());
        self.updated_at = now;
        Ok(true)
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    pub fn duration(&self) -> Option<Duration> {
        self.end_time.map(|end| end - self.start_time)
    }

    pub fn is_firing(&self) -> bool {
        self.status == Status::Firing
    }

    pub fn id(&self) -> &IncidentId {
        &self.id
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

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn acknowledged_at(&self) -> Option<DateTime<Utc>> {
        self.acknowledged_at
    }

    pub fn acknowledged_by(&self) -> Option<&str> {
        self.acknowledged_by.as_deref()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertIdentity;

    fn ts(s: &str) -> DateTime<Utc> {
        chrono::DateTime::parse_from_rfc3339(s)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn signal(status: Status) -> AlertSignal {
        let identity =
            AlertIdentity::new("pay", "checkout", "web-01", Severity::Critical, "disk full").unwrap();
        AlertSignal::new(identity, status, ts("2025-01-15T10:00:00Z"), "alertmanager")
            .with_external_id("ext-1")
    }

    #[test]
    fn open_copies_identity() {
        let incident = Incident::open(&signal(Status::Firing), ts("2025-01-15T10:00:01Z"));
        assert_eq!(incident.status(), Status::Firing);
        assert_eq!(incident.service(), "checkout");
        assert_eq!(incident.instance(), "web-01");
        assert_eq!(incident.external_id(), Some("ext-1"));
        assert_eq!(incident.start_time(), ts("2025-01-15T10:00:00Z"));
        assert!(incident.end_time().is_none());
    }

    #[test]
    fn resolve_sets_end_and_duration() {
        let mut incident = Incident::open(&signal(Status::Firing), ts("2025-01-15T10:00:00Z"));
        let duration = incident
            .resolve(ts("2025-01-15T10:30:00Z"), ts("2025-01-15T10:30:01Z"))
            .unwrap();
        assert_eq!(duration, Duration::minutes(30));
        assert_eq!(incident.status(), Status::Resolved);
        assert_eq!(incident.duration(), Some(Duration::minutes(30)));
    }

    #[test]
    fn resolve_twice_fails() {
        let mut incident = Incident::open(&signal(Status::Firing), ts("2025-01-15T10:00:00Z"));
        incident.resolve(ts("2025-01-15T10:30:00Z"), ts("2025-01-15T10:30:00Z")).unwrap();
        let err = incident
            .resolve(ts("2025-01-15T10:40:00Z"), ts("2025-01-15T10:40:00Z"))
            .unwrap_err();
        assert_eq!(err, DomainError::IncidentAlreadyResolved);
    }

    #[test]
    fn resolve_before_start_is_clamped() {
        let mut incident = Incident::open(&signal(Status::Firing), ts("2025-01-15T10:00:00Z"));
        let duration = incident
            .resolve(ts("2025-01-15T09:00:00Z"), ts("2025-01-15T10:00:05Z"))
            .unwrap();
        assert_eq!(duration, Duration::zero());
        assert_eq!(incident.end_time(), Some(incident.start_time()));
    }

    #[test]
    fn orphan_start_is_estimated_before_end() {
        let end = ts("2025-01-15T11:00:00Z");
        let incident = Incident::open_resolved(&signal(Status::Resolved), end, end);
        assert_eq!(incident.status(), Status::Resolved);
        assert!(incident.start_time() < end);
        assert_eq!(incident.start_time(), end - orphan_start_offset());
    }

    #[test]
    fn acknowledge_is_idempotent() {
        let mut incident = Incident::open(&signal(Status::Firing), ts("2025-01-15T10:00:00Z"));
        assert_eq!(incident.acknowledge("alice", ts("2025-01-15T10:05:00Z")), Ok(true));
        assert_eq!(incident.acknowledge("bob", ts("2025-01-15T10:06:00Z")), Ok(false));
        assert_eq!(incident.acknowledged_by(), Some("alice"));
        assert_eq!(incident.acknowledged_at(), Some(ts("2025-01-15T10:05:00Z")));
    }

    #[test]
    fn acknowledge_resolved_fails() {
        let mut incident = Incident::open(&signal(Status::Firing), ts("2025-01-15T10:00:00Z"));
        incident.resolve(ts("2025-01-15T10:01:00Z"), ts("2025-01-15T10:01:00Z")).unwrap();
        assert_eq!(
            incident.acknowledge("alice", ts("2025-01-15T10:02:00Z")),
            Err(DomainError::IncidentAlreadyResolved)
        );
    }
}
