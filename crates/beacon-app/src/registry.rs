use chrono::{DateTime, Utc};
use serde::Serialize;

use beacon_core::service::{merge, Change, Service, ServiceKey, ServiceUpdate};
use beacon_ports::outbound::ServiceRepository;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsureOutcome {
    pub created: bool,
    pub existed: bool,
    pub tag_changes: Vec<Change>,
    #[serde(skip)]
    pub service: Service,
}

impl EnsureOutcome {
    pub fn change_log(&self) -> Vec<String> {
        self.tag_changes.iter().map(ToString::to_string).collect()
    }
}

/// Creates the service on first sight and folds `update` into it.
pub async fn ensure_service<R>(
    repo: &mut R,
    key: &ServiceKey,
    update: &ServiceUpdate,
    now: DateTime<Utc>,
) -> Result<EnsureOutcome, AppError>
where
    R: ServiceRepository + ?Sized,
{
    let (existing, existed) = match repo.find_service(key).await? {
        Some(service) => (service, true),
        None => (Service::new(key.clone(), now), false),
    };

    let outcome = merge(&existing, update, now);
    repo.save_service(&outcome.service).await?;

    if !existed {
        tracing::info!(service = %key, source = %update.source, "service registered");
    }
    if !outcome.changes.is_empty() {
        tracing::info!(
            service = %key,
            source = %update.source,
            changes = ?outcome.change_log(),
            "service metadata changed"
        );
    }

    Ok(EnsureOutcome {
        created: !existed,
        existed,
        tag_changes: outcome.changes,
        service: outcome.service,
    })
}
