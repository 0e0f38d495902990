use async_trait::async_trait;

use beacon_core::ids::IncidentId;
use beacon_core::incident::{Incident, IncidentEvent};
use beacon_core::service::{Service, ServiceKey};
use beacon_ports::error::PortError;
use beacon_ports::outbound::IncidentQuery;
use beacon_ports::types::IncidentFilter;

use super::{decode, event, incident, persistence, service, SqliteDb};

const DEFAULT_PAGE_SIZE: u32 = 50;

#[async_trait]
impl IncidentQuery for SqliteDb {
    async fn get_incident(&self, id: &IncidentId) -> Result<Option<Incident>, PortError> {
        incident::find_by_id(&self.pool, id).await
    }

    async fn list_incidents(&self, filter: &IncidentFilter) -> Result<Vec<Incident>, PortError> {
        let mut sql = String::from("SELECT data FROM incidents WHERE 1=1");
        let mut binds: Vec<String> = Vec::new();

        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            binds.push(status.as_str().to_string());
        }
        if let Some(namespace) = &filter.namespace {
            sql.push_str(" AND namespace = ?");
            binds.push(namespace.clone());
        }
        if let Some(service) = &filter.service {
            sql.push_str(" AND service = ?");
            binds.push(service.clone());
        }
        if let Some(fingerprint) = &filter.fingerprint {
            sql.push_str(" AND fingerprint = ?");
            binds.push(fingerprint.clone());
        }

        sql.push_str(" ORDER BY start_ms DESC");

        let per_page = if filter.per_page == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            filter.per_page
        };
        let offset = i64::from(filter.page.saturating_sub(1)).saturating_mul(i64::from(per_page));
        sql.push_str(&format!(" LIMIT {per_page} OFFSET {offset}"));

        let mut query = sqlx::query_as::<_, (String,)>(&sql);
        for b in &binds {
            query = query.bind(b);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(persistence)?;
        rows.iter().map(|(data,)| decode("incidents", data)).collect()
    }

    async fn events_for(&self, id: &IncidentId) -> Result<Vec<IncidentEvent>, PortError> {
        event::for_incident(&self.pool, id).await
    }

    async fn get_service(&self, key: &ServiceKey) -> Result<Option<Service>, PortError> {
        service::find_by_key(&self.pool, key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::alert::{AlertIdentity, AlertSignal, Severity, Status};
    use beacon_ports::outbound::{IncidentRepository, TransactionManager, UnitOfWork};

    fn ts(s: &str) -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::parse_from_rfc3339(s)
            .unwrap()
            .with_timezone(&chrono::Utc)
    }

    fn incident(service: &str, starts_at: &str) -> Incident {
        let identity =
            AlertIdentity::new("pay", service, "", Severity::Warning, "Latency").unwrap();
        let signal = AlertSignal::new(identity, Status::Firing, ts(starts_at), "alertmanager");
        Incident::open(&signal, ts(starts_at))
    }

    async fn seeded() -> (SqliteDb, Vec<Incident>) {
        let db = SqliteDb::new("sqlite::memory:", 1).await.unwrap();
        let mut resolved = incident("cart", "2025-01-15T09:00:00Z");
        resolved.resolve(ts("2025-01-15T09:10:00Z"), ts("2025-01-15T09:10:00Z")).unwrap();
        let incidents = vec![
            incident("checkout", "2025-01-15T10:00:00Z"),
            resolved,
            incident("search", "2025-01-15T11:00:00Z"),
        ];

        let mut tx = db.begin().await.unwrap();
        for i in &incidents {
            tx.insert_incident(i).await.unwrap();
        }
        tx.commit().await.unwrap();
        (db, incidents)
    }

    #[tokio::test]
    async fn list_filters_and_orders_newest_first() {
        let (db, incidents) = seeded().await;

        let all = db.list_incidents(&IncidentFilter::default()).await.unwrap();
        let services: Vec<&str> = all.iter().map(|i| i.service()).collect();
        assert_eq!(services, vec!["search", "checkout", "cart"]);

        let firing = db
            .list_incidents(&IncidentFilter {
                status: Some(Status::Firing),
                ..IncidentFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(firing.len(), 2);

        let by_fingerprint = db
            .list_incidents(&IncidentFilter {
                fingerprint: Some(incidents[1].fingerprint().to_string()),
                ..IncidentFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(by_fingerprint, vec![incidents[1].clone()]);
    }

    #[tokio::test]
    async fn list_paginates() {
        let (db, _) = seeded().await;
        let page = |page| IncidentFilter {
            page,
            per_page: 2,
            ..IncidentFilter::default()
        };
        assert_eq!(db.list_incidents(&page(1)).await.unwrap().len(), 2);
        assert_eq!(db.list_incidents(&page(2)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn page_past_the_end_is_empty() {
        let (db, _) = seeded().await;
        let filter = IncidentFilter {
            page: u32::MAX,
            per_page: u32::MAX,
            ..IncidentFilter::default()
        };
        assert!(db.list_incidents(&filter).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_rows_are_none() {
        let db = SqliteDb::new("sqlite::memory:", 1).await.unwrap();
        assert!(db.get_incident(&IncidentId::new()).await.unwrap().is_none());
        assert!(db.events_for(&IncidentId::new()).await.unwrap().is_empty());
        let key = ServiceKey::new("pay", "checkout").unwrap();
        assert!(db.get_service(&key).await.unwrap().is_none());
    }
}
