use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::event::{EventKind, IncidentEvent};
use super::Incident;
use crate::alert::{AlertSignal, Status};
use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Created,
    Updated,
    Resolved,
    Reactivated,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Resolved => "resolved",
            Self::Reactivated => "reactivated",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub incident: Incident,
    pub event: IncidentEvent,
    pub action: Action,
    /// The incident row does not exist yet and must be inserted.
    pub is_new_incident: bool,
    /// An existing incident row changed and must be written back.
    pub incident_changed: bool,
    pub duration: Option<Duration>,
}

impl Transition {
    fn new_incident(incident: Incident, event: IncidentEvent, action: Action) -> Self {
        let duration = incident.duration();
        Self {
            incident,
            event,
            action,
            is_new_incident: true,
            incident_changed: false,
            duration,
        }
    }

    fn existing(
        incident: Incident,
        event: IncidentEvent,
        action: Action,
        incident_changed: bool,
        duration: Option<Duration>,
    ) -> Self {
        Self {
            incident,
            event,
            action,
            is_new_incident: false,
            incident_changed,
            duration,
        }
    }
}

/// Decides what an incoming signal does to the fingerprint's incident and
/// returns the incident to persist with the single event recording it.
///
/// `current` must be the fingerprint's firing incident if one exists, and
/// otherwise its most recently started incident.
pub fn transition(
    current: Option<Incident>,
    signal: &AlertSignal,
    now: DateTime<Utc>,
) -> Result<Transition, DomainError> {
    let payload = signal.payload.clone();

    match (current, signal.status) {
        (Some(mut incident), Status::Firing) if incident.is_firing() => {
            incident.touch(now);
            let event = IncidentEvent::new(incident.id().clone(), EventKind::Updated, now, payload);
            Ok(Transition::existing(incident, event, Action::Updated, true, None))
        }
        (Some(mut incident), Status::Resolved) if incident.is_firing() => {
            let end = signal.ends_at.unwrap_or(now);
            let duration = incident.resolve(end, now)?;
            let event = IncidentEvent::new(
                incident.id().clone(),
                EventKind::Resolved,
                incident.end_time().unwrap_or(end),
                payload,
            );
            Ok(Transition::existing(
                incident,
                event,
                Action::Resolved,
                true,
                Some(duration),
            ))
        }
        (Some(_), Status::Firing) => {
            let incident = Incident::open(signal, now);
            let event = IncidentEvent::new(
                incident.id().clone(),
                EventKind::Fired,
                incident.start_time(),
                payload,
            );
            Ok(Transition::new_incident(incident, event, Action::Reactivated))
        }
        (None, Status::Firing) => {
            let incident = Incident::open(signal, now);
            let event = IncidentEvent::new(
                incident.id().clone(),
                EventKind::Fired,
                incident.start_time(),
                payload,
            );
            Ok(Transition::new_incident(incident, event, Action::Created))
        }
        (Some(incident), Status::Resolved) if is_redelivery(&incident, signal) => {
            // The closed incident stays untouched; only the sighting is logged.
            let event = IncidentEvent::new(incident.id().clone(), EventKind::Updated, now, payload);
            Ok(Transition::existing(incident, event, Action::Updated, false, None))
        }
        (_, Status::Resolved) => {
            let end = signal.ends_at.unwrap_or(now);
            let incident = Incident::open_resolved(signal, end, now);
            let event = IncidentEvent::new(incident.id().clone(), EventKind::Resolved, end, payload);
            Ok(Transition::new_incident(incident, event, Action::Resolved))
        }
    }
}

/// A resolve for an occurrence that started no later than the closed
/// incident's end is the same notification delivered again.
fn is_redelivery(closed: &Incident, signal: &AlertSignal) -> bool {
    closed
        .end_time()
        .is_some_and(|end| signal.starts_at <= end)
}
