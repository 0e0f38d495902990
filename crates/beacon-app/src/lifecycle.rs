use chrono::{DateTime, Utc};

use beacon_core::alert::AlertSignal;
use beacon_core::incident::{self, Transition};
use beacon_ports::error::PortError;
use beacon_ports::outbound::{EventLog, IncidentRepository};

use crate::error::AppError;
use crate::report::AlertOutcome;

/// Runs one signal through the state machine against the fingerprint's
/// current incident and persists the result plus its event.
///
/// A conflicting insert means another writer opened a firing incident for the
/// fingerprint in the meantime; the current incident is read again and the
/// signal is applied to it instead.
pub async fn apply<U>(tx: &mut U, signal: &AlertSignal, now: DateTime<Utc>) -> Result<AlertOutcome, AppError>
where
    U: IncidentRepository + EventLog + ?Sized,
{
    let mut retried = false;
    let transition = loop {
        let current = tx.current_for_fingerprint(&signal.fingerprint).await?;
        let transition = incident::transition(current, signal, now)?;

        if !transition.is_new_incident {
            if transition.incident_changed {
                tx.update_incident(&transition.incident).await?;
            }
            break transition;
        }

        match tx.insert_incident(&transition.incident).await {
            Ok(()) => break transition,
            Err(PortError::Conflict(reason)) if !retried => {
                tracing::warn!(
                    fingerprint = %signal.fingerprint,
                    reason = reason.as_str(),
                    "firing incident appeared concurrently, retrying as update"
                );
                retried = true;
            }
            Err(e) => return Err(e.into()),
        }
    };

    tx.append(&transition.event).await?;
    log_transition(signal, &transition);

    Ok(AlertOutcome {
        incident_id: transition.incident.id().clone(),
        event_id: transition.event.id().clone(),
        action: transition.action,
        is_new_incident: transition.is_new_incident,
        duration_secs: transition.duration.map(|d| d.num_seconds()),
    })
}

fn log_transition(signal: &AlertSignal, transition: &Transition) {
    tracing::info!(
        incident_id = %transition.incident.id(),
        fingerprint = %signal.fingerprint,
        service = signal.identity.service(),
        namespace = signal.identity.namespace(),
        action = transition.action.as_str(),
        event = transition.event.kind().as_str(),
        "alert applied"
    );
}
