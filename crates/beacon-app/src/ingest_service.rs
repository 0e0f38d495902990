use std::time::Duration;

use chrono::{DateTime, Utc};

use beacon_core::service::{ServiceKey, ServiceUpdate};
use beacon_ports::outbound::{AlertSourceParser, TransactionManager, UnitOfWork};
use beacon_ports::types::{ManualAlert, RawAlert};

use crate::config::EngineConfig;
use crate::error::AppError;
use crate::lifecycle;
use crate::normalizer::{IdentityNormalizer, NormalizedAlert};
use crate::registry::{ensure_service, EnsureOutcome};
use crate::report::{AlertOutcome, AlertResult, BatchReport};

/// Batch ingestion: one unit of work per delivery, one savepoint per alert.
pub struct IngestService<T: TransactionManager> {
    store: T,
    normalizer: IdentityNormalizer,
    timeout: Option<Duration>,
}

impl<T: TransactionManager> IngestService<T> {
    pub fn new(store: T, normalizer: IdentityNormalizer) -> Self {
        Self {
            store,
            normalizer,
            timeout: None,
        }
    }

    pub fn from_config(store: T, config: &EngineConfig) -> Self {
        let normalizer =
            IdentityNormalizer::new(config.ingest.default_namespace.clone(), config.tags.clone());
        let mut service = Self::new(store, normalizer);
        service.timeout = config.ingest.timeout();
        service
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Processes a batch in array order inside one transaction.
    ///
    /// Rejected and failed alerts are reported and skipped; the rest commit
    /// together. A structural failure rolls back the whole batch and returns
    /// `AppError::BatchAborted`.
    pub async fn ingest(&self, alerts: Vec<RawAlert>, now: DateTime<Utc>) -> Result<BatchReport, AppError> {
        let Some(limit) = self.timeout else {
            return self.run_batch(&alerts, now).await;
        };
        // Dropping the in-flight batch drops its transaction, which rolls back.
        match tokio::time::timeout(limit, self.run_batch(&alerts, now)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(alerts = alerts.len(), timeout = ?limit, "batch timed out, rolled back");
                Err(AppError::Timeout(limit))
            }
        }
    }

    pub async fn submit_manual(&self, alert: ManualAlert, now: DateTime<Utc>) -> Result<BatchReport, AppError> {
        self.ingest(vec![alert.into()], now).await
    }

    pub async fn ingest_payload(
        &self,
        parser: &dyn AlertSourceParser,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> Result<BatchReport, AppError> {
        let alerts = parser.parse(payload)?;
        tracing::debug!(source = parser.source_name(), alerts = alerts.len(), "payload parsed");
        self.ingest(alerts, now).await
    }

    /// Folds a standalone metadata update (typically from an operator) into
    /// the service record, creating it if needed.
    pub async fn merge_service(
        &self,
        key: &ServiceKey,
        update: &ServiceUpdate,
        now: DateTime<Utc>,
    ) -> Result<EnsureOutcome, AppError> {
        let mut tx = self.store.begin().await?;
        let outcome = match ensure_service(&mut tx, key, update, now).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::error!(error = %rollback, "rollback failed");
                }
                return Err(e);
            }
        };
        tx.commit().await?;
        Ok(outcome)
    }

    async fn run_batch(&self, alerts: &[RawAlert], now: DateTime<Utc>) -> Result<BatchReport, AppError> {
        let mut tx = self.store.begin().await?;
        let mut results = Vec::with_capacity(alerts.len());

        for (index, raw) in alerts.iter().enumerate() {
            let normalized = match self.normalizer.normalize(raw, now) {
                Ok(normalized) => normalized,
                Err(rejection) => {
                    results.push(AlertResult::rejected(index, &rejection));
                    continue;
                }
            };

            if let Err(e) = tx.savepoint().await {
                return Err(abort(tx, &results, e.into()).await);
            }

            match process(&mut tx, &normalized, now).await {
                Ok(outcome) => {
                    if let Err(e) = tx.release_savepoint().await {
                        return Err(abort(tx, &results, e.into()).await);
                    }
                    results.push(AlertResult::Processed { index, outcome });
                }
                Err(e) if !e.is_structural() => {
                    tracing::warn!(
                        index,
                        service = normalized.identity.service(),
                        error = %e,
                        "alert failed, rolled back to savepoint"
                    );
                    if let Err(rollback) = tx.rollback_to_savepoint().await {
                        return Err(abort(tx, &results, rollback.into()).await);
                    }
                    results.push(AlertResult::Failed {
                        index,
                        error: e.to_string(),
                    });
                }
                Err(e) => return Err(abort(tx, &results, e).await),
            }
        }

        if let Err(e) = tx.commit().await {
            tracing::error!(error = %e, "batch commit failed");
            return Err(AppError::BatchAborted {
                discarded: processed_count(&results),
                cause: Box::new(e.into()),
            });
        }

        let report = BatchReport::from_results(results);
        let s = &report.summary;
        tracing::info!(
            received = s.received,
            parsed = s.parsed,
            rejected = s.rejected,
            failed = s.failed,
            created = s.created,
            updated = s.updated,
            resolved = s.resolved,
            reactivated = s.reactivated,
            "batch committed"
        );
        Ok(report)
    }
}

async fn process<U: UnitOfWork>(
    tx: &mut U,
    alert: &NormalizedAlert,
    now: DateTime<Utc>,
) -> Result<AlertOutcome, AppError> {
    let key = alert.service_key()?;
    ensure_service(tx, &key, &alert.service_update, now).await?;
    lifecycle::apply(tx, &alert.to_signal(), now).await
}

async fn abort<U: UnitOfWork>(tx: U, results: &[AlertResult], cause: AppError) -> AppError {
    let discarded = processed_count(results);
    tracing::error!(discarded, error = %cause, "structural failure, rolling back batch");
    if let Err(e) = tx.rollback().await {
        tracing::error!(error = %e, "rollback failed");
    }
    AppError::BatchAborted {
        discarded,
        cause: Box::new(cause),
    }
}

fn processed_count(results: &[AlertResult]) -> usize {
    results.iter().filter(|r| r.outcome().is_some()).count()
}
