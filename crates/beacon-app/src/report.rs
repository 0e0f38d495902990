use std::collections::BTreeSet;

use serde::Serialize;

use beacon_core::ids::{EventId, IncidentId};
use beacon_core::incident::Action;

use crate::normalizer::Rejection;

/// What the state machine did with one alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertOutcome {
    pub incident_id: IncidentId,
    pub event_id: EventId,
    pub action: Action,
    pub is_new_incident: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AlertResult {
    Processed {
        index: usize,
        #[serde(flatten)]
        outcome: AlertOutcome,
    },
    Rejected {
        index: usize,
        reasons: Vec<String>,
    },
    Failed {
        index: usize,
        error: String,
    },
}

impl AlertResult {
    pub fn rejected(index: usize, rejection: &Rejection) -> Self {
        Self::Rejected {
            index,
            reasons: rejection.reasons.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn outcome(&self) -> Option<&AlertOutcome> {
        match self {
            Self::Processed { outcome, .. } => Some(outcome),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub received: usize,
    pub parsed: usize,
    pub rejected: usize,
    pub failed: usize,
    pub created: usize,
    pub updated: usize,
    pub resolved: usize,
    pub reactivated: usize,
    pub total_processed: usize,
    /// Distinct incidents touched by the batch.
    pub total_incidents: usize,
    pub total_events: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub results: Vec<AlertResult>,
    pub summary: BatchSummary,
}

impl BatchReport {
    pub fn from_results(results: Vec<AlertResult>) -> Self {
        let mut summary = BatchSummary {
            received: results.len(),
            ..BatchSummary::default()
        };
        let mut incidents = BTreeSet::new();

        for result in &results {
            match result {
                AlertResult::Processed { outcome, .. } => {
                    summary.parsed += 1;
                    summary.total_processed += 1;
                    summary.total_events += 1;
                    incidents.insert(outcome.incident_id.to_string());
                    match outcome.action {
                        Action::Created => summary.created += 1,
                        Action::Updated => summary.updated += 1,
                        Action::Resolved => summary.resolved += 1,
                        Action::Reactivated => summary.reactivated += 1,
                    }
                }
                AlertResult::Rejected { .. } => summary.rejected += 1,
                AlertResult::Failed { .. } => {
                    summary.parsed += 1;
                    summary.failed += 1;
                }
            }
        }
        summary.total_incidents = incidents.len();

        Self { results, summary }
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &AlertOutcome> {
        self.results.iter().filter_map(AlertResult::outcome)
    }
}
