use async_trait::async_trait;

use beacon_core::alert::Fingerprint;
use beacon_core::ids::IncidentId;
use beacon_core::incident::{Incident, IncidentEvent};
use beacon_core::service::{Service, ServiceKey};

use crate::error::{ParseError, PortError};
use crate::types::{IncidentFilter, RawAlert};

/// Incident rows, as seen from inside a unit of work.
#[async_trait]
pub trait IncidentRepository: Send {
    /// The fingerprint's firing incident if there is one, otherwise its most
    /// recently started incident.
    async fn current_for_fingerprint(
        &mut self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<Incident>, PortError>;
    async fn find_incident(&mut self, id: &IncidentId) -> Result<Option<Incident>, PortError>;
    /// Fails with `PortError::Conflict` if the fingerprint already has a firing incident.
    async fn insert_incident(&mut self, incident: &Incident) -> Result<(), PortError>;
    async fn update_incident(&mut self, incident: &Incident) -> Result<(), PortError>;
}

/// Append-only event ledger.
#[async_trait]
pub trait EventLog: Send {
    async fn append(&mut self, event: &IncidentEvent) -> Result<(), PortError>;
}

#[async_trait]
pub trait ServiceRepository: Send {
    async fn find_service(&mut self, key: &ServiceKey) -> Result<Option<Service>, PortError>;
    async fn save_service(&mut self, service: &Service) -> Result<(), PortError>;
}

/// One transaction spanning a whole ingestion batch. Dropping it without
/// `commit` discards every write.
#[async_trait]
pub trait UnitOfWork: IncidentRepository + EventLog + ServiceRepository {
    async fn savepoint(&mut self) -> Result<(), PortError>;
    async fn release_savepoint(&mut self) -> Result<(), PortError>;
    async fn rollback_to_savepoint(&mut self) -> Result<(), PortError>;
    async fn commit(self) -> Result<(), PortError>;
    async fn rollback(self) -> Result<(), PortError>;
}

#[async_trait]
pub trait TransactionManager: Send + Sync {
    type Tx: UnitOfWork + 'static;

    async fn begin(&self) -> Result<Self::Tx, PortError>;
}

/// Read side over committed state.
#[async_trait]
pub trait IncidentQuery: Send + Sync {
    async fn get_incident(&self, id: &IncidentId) -> Result<Option<Incident>, PortError>;
    async fn list_incidents(&self, filter: &IncidentFilter) -> Result<Vec<Incident>, PortError>;
    async fn events_for(&self, id: &IncidentId) -> Result<Vec<IncidentEvent>, PortError>;
    async fn get_service(&self, key: &ServiceKey) -> Result<Option<Service>, PortError>;
}

pub trait AlertSourceParser: Send + Sync {
    fn parse(&self, payload: &[u8]) -> Result<Vec<RawAlert>, ParseError>;
    fn source_name(&self) -> &str;
}
