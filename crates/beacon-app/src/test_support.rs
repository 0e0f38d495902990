use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use beacon_core::alert::Fingerprint;
use beacon_core::ids::IncidentId;
use beacon_core::incident::{Incident, IncidentEvent};
use beacon_core::service::{Service, ServiceKey};
use beacon_ports::error::PortError;
use beacon_ports::outbound::{
    EventLog, IncidentRepository, ServiceRepository, TransactionManager, UnitOfWork,
};

#[derive(Debug, Clone, Default)]
struct State {
    incidents: Vec<Incident>,
    events: Vec<IncidentEvent>,
    services: BTreeMap<ServiceKey, Service>,
}

#[derive(Debug, Default)]
struct Faults {
    /// Services whose records fail to decode: a per-alert failure.
    poisoned: HashSet<String>,
    /// Services whose reads fail at the store level: a structural failure.
    broken: HashSet<String>,
    hidden_current_reads: usize,
    stall_begin: Option<Duration>,
}

/// In-memory unit of work for service tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    committed: Arc<Mutex<State>>,
    faults: Arc<Mutex<Faults>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poison_service(&self, service: &str) {
        self.faults.lock().unwrap().poisoned.insert(service.to_string());
    }

    pub fn break_service(&self, service: &str) {
        self.faults.lock().unwrap().broken.insert(service.to_string());
    }

    /// The next current-incident lookup reports nothing, as if another
    /// writer's incident were not yet visible.
    pub fn hide_next_current_read(&self) {
        self.faults.lock().unwrap().hidden_current_reads += 1;
    }

    pub fn stall_begin(&self, delay: Duration) {
        self.faults.lock().unwrap().stall_begin = Some(delay);
    }

    pub fn service(&self, key: &ServiceKey) -> Option<Service> {
        self.committed.lock().unwrap().services.get(key).cloned()
    }

    pub fn incident(&self, id: &IncidentId) -> Option<Incident> {
        self.committed
            .lock()
            .unwrap()
            .incidents
            .iter()
            .find(|i| i.id() == id)
            .cloned()
    }

    pub fn events_of(&self, id: &IncidentId) -> Vec<IncidentEvent> {
        self.committed
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| e.incident_id() == id)
            .cloned()
            .collect()
    }

    pub fn incident_count(&self) -> usize {
        self.committed.lock().unwrap().incidents.len()
    }

    pub fn event_count(&self) -> usize {
        self.committed.lock().unwrap().events.len()
    }

    pub fn firing_count(&self, fingerprint: &Fingerprint) -> usize {
        self.committed
            .lock()
            .unwrap()
            .incidents
            .iter()
            .filter(|i| i.fingerprint() == fingerprint && i.is_firing())
            .count()
    }
}

#[async_trait]
impl TransactionManager for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, PortError> {
        let stall = self.faults.lock().unwrap().stall_begin;
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }
        let working = self.committed.lock().unwrap().clone();
        Ok(MemoryTx {
            store: self.clone(),
            working,
            savepoints: Vec::new(),
        })
    }
}

/// Writes go to a private copy that replaces the committed state on commit.
pub struct MemoryTx {
    store: MemoryStore,
    working: State,
    savepoints: Vec<State>,
}

impl MemoryTx {
    fn check_service(&self, key: &ServiceKey) -> Result<(), PortError> {
        let faults = self.store.faults.lock().unwrap();
        if faults.broken.contains(&key.service) {
            return Err(PortError::Persistence(format!("service table unavailable for {key}")));
        }
        if faults.poisoned.contains(&key.service) {
            return Err(PortError::Corrupt(format!("undecodable service record {key}")));
        }
        Ok(())
    }
}

#[async_trait]
impl IncidentRepository for MemoryTx {
    async fn current_for_fingerprint(
        &mut self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<Incident>, PortError> {
        {
            let mut faults = self.store.faults.lock().unwrap();
            if faults.hidden_current_reads > 0 {
                faults.hidden_current_reads -= 1;
                return Ok(None);
            }
        }
        let candidates = self
            .working
            .incidents
            .iter()
            .filter(|i| i.fingerprint() == fingerprint);
        let firing = candidates.clone().find(|i| i.is_firing());
        Ok(firing
            .or_else(|| candidates.max_by_key(|i| i.start_time()))
            .cloned())
    }

    async fn find_incident(&mut self, id: &IncidentId) -> Result<Option<Incident>, PortError> {
        Ok(self.working.incidents.iter().find(|i| i.id() == id).cloned())
    }

    async fn insert_incident(&mut self, incident: &Incident) -> Result<(), PortError> {
        let duplicate = incident.is_firing()
            && self
                .working
                .incidents
                .iter()
                .any(|i| i.is_firing() && i.fingerprint() == incident.fingerprint());
        if duplicate {
            return Err(PortError::Conflict(format!(
                "fingerprint {} already firing",
                incident.fingerprint()
            )));
        }
        self.working.incidents.push(incident.clone());
        Ok(())
    }

    async fn update_incident(&mut self, incident: &Incident) -> Result<(), PortError> {
        let slot = self
            .working
            .incidents
            .iter_mut()
            .find(|i| i.id() == incident.id())
            .ok_or(PortError::NotFound)?;
        *slot = incident.clone();
        Ok(())
    }
}

#[async_trait]
impl EventLog for MemoryTx {
    async fn append(&mut self, event: &IncidentEvent) -> Result<(), PortError> {
        self.working.events.push(event.clone());
        Ok(())
    }
}

#[async_trait]
impl ServiceRepository for MemoryTx {
    async fn find_service(&mut self, key: &ServiceKey) -> Result<Option<Service>, PortError> {
        self.check_service(key)?;
        Ok(self.working.services.get(key).cloned())
    }

    async fn save_service(&mut self, service: &Service) -> Result<(), PortError> {
        self.check_service(service.key())?;
        self.working
            .services
            .insert(service.key().clone(), service.clone());
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for MemoryTx {
    async fn savepoint(&mut self) -> Result<(), PortError> {
        self.savepoints.push(self.working.clone());
        Ok(())
    }

    async fn release_savepoint(&mut self) -> Result<(), PortError> {
        self.savepoints
            .pop()
            .map(|_| ())
            .ok_or_else(|| PortError::Transaction("no savepoint to release".into()))
    }

    async fn rollback_to_savepoint(&mut self) -> Result<(), PortError> {
        self.working = self
            .savepoints
            .pop()
            .ok_or_else(|| PortError::Transaction("no savepoint to roll back to".into()))?;
        Ok(())
    }

    async fn commit(self) -> Result<(), PortError> {
        *self.store.committed.lock().unwrap() = self.working;
        Ok(())
    }

    async fn rollback(self) -> Result<(), PortError> {
        Ok(())
    }
}
