use chrono::{DateTime, Utc};
use serde_json::json;

use beacon_core::ids::IncidentId;
use beacon_core::incident::{Action, EventKind, Incident, IncidentEvent};
use beacon_ports::outbound::{TransactionManager, UnitOfWork};

use crate::error::AppError;
use crate::report::AlertOutcome;

/// Operator commands against a single incident.
pub struct IncidentService<T: TransactionManager> {
    store: T,
}

impl<T: TransactionManager> IncidentService<T> {
    pub fn new(store: T) -> Self {
        Self { store }
    }

    /// Marks a firing incident as acknowledged. Acknowledging twice keeps the
    /// first acknowledgement and writes nothing.
    pub async fn acknowledge(
        &self,
        id: &IncidentId,
        by: &str,
        now: DateTime<Utc>,
    ) -> Result<Incident, AppError> {
        let mut tx = self.store.begin().await?;
        let result = acknowledge_in(&mut tx, id, by, now).await;
        finish(tx, result).await
    }

    /// Closes an incident by id. `at` defaults to `now`.
    pub async fn resolve_by_id(
        &self,
        id: &IncidentId,
        by: &str,
        at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<AlertOutcome, AppError> {
        let mut tx = self.store.begin().await?;
        let result = resolve_in(&mut tx, id, by, at.unwrap_or(now), now).await;
        finish(tx, result).await
    }
}

async fn load<U: UnitOfWork>(tx: &mut U, id: &IncidentId) -> Result<Incident, AppError> {
    tx.find_incident(id)
        .await?
        .ok_or_else(|| AppError::IncidentNotFound(id.to_string()))
}

async fn acknowledge_in<U: UnitOfWork>(
    tx: &mut U,
    id: &IncidentId,
    by: &str,
    now: DateTime<Utc>,
) -> Result<Incident, AppError> {
    let mut incident = load(tx, id).await?;
    if !incident.acknowledge(by, now)? {
        return Ok(incident);
    }
    tx.update_incident(&incident).await?;
    let event = IncidentEvent::new(
        incident.id().clone(),
        EventKind::Updated,
        now,
        json!({ "acknowledged_by": by }),
    );
    tx.append(&event).await?;
    tracing::info!(incident_id = %id, by, "incident acknowledged");
    Ok(incident)
}

async fn resolve_in<U: UnitOfWork>(
    tx: &mut U,
    id: &IncidentId,
    by: &str,
    at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<AlertOutcome, AppError> {
    let mut incident = load(tx, id).await?;
    let duration = incident.resolve(at, now)?;
    tx.update_incident(&incident).await?;
    let event = IncidentEvent::new(
        incident.id().clone(),
        EventKind::Resolved,
        incident.end_time().unwrap_or(at),
        json!({ "resolved_by": by }),
    );
    tx.append(&event).await?;
    tracing::info!(incident_id = %id, by, duration_secs = duration.num_seconds(), "incident resolved by hand");

    Ok(AlertOutcome {
        incident_id: incident.id().clone(),
        event_id: event.id().clone(),
        action: Action::Resolved,
        is_new_incident: false,
        duration_secs: Some(duration.num_seconds()),
    })
}

async fn finish<U: UnitOfWork, R>(tx: U, result: Result<R, AppError>) -> Result<R, AppError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                tracing::error!(error = %rollback, "rollback failed");
            }
            Err(e)
        }
    }
}
