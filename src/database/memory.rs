use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{Rfq, RfqStatus, TaskStatus, Tender, TenderStatus, TenderTask, UserAccount};
use crate::database::repository::{Repository, RfqQuery, TaskQuery, TenderQuery};
use crate::types::TenantId;

#[derive(Debug, Default)]
struct TenantData {
    tenders: BTreeMap<Uuid, Tender>,
    tasks: BTreeMap<Uuid, TenderTask>,
    rfqs: BTreeMap<Uuid, Rfq>,
    rfq_assignees: HashMap<Uuid, Vec<Uuid>>,
    users: BTreeMap<Uuid, UserAccount>,
}

/// In-process store used by tests and local runs without Postgres
#[derive(Debug, Default)]
pub struct MemoryRepository {
    tenants: RwLock<HashMap<TenantId, TenantData>>,
    writes: std::sync::atomic::AtomicU64,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the user directory for a tenant
    pub async fn insert_user(&self, tenant: &TenantId, user: UserAccount) {
        let mut tenants = self.tenants.write().await;
        tenants.entry(tenant.clone()).or_default().users.insert(user.id, user);
    }

    /// Number of writes performed so far, to observe that reads stay read-only
    pub fn write_count(&self) -> u64 {
        self.writes.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn find_tenders(&self, tenant: &TenantId, query: &TenderQuery) -> Result<Vec<Tender>, DatabaseError> {
        let tenants = self.tenants.read().await;
        let Some(data) = tenants.get(tenant) else {
            return Ok(vec![]);
        };

        let assigned: HashSet<Uuid> = match query.visible_to {
            Some(user) => data
                .tasks
                .values()
                .filter(|t| t.assignee_id == user && t.status != TaskStatus::Deleted)
                .map(|t| t.tender_id)
                .collect(),
            None => HashSet::new(),
        };

        Ok(data
            .tenders
            .values()
            .filter(|t| query.matches_fields(t))
            .filter(|t| match query.visible_to {
                Some(user) => t.created_by == user || assigned.contains(&t.id),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn get_tender(&self, tenant: &TenantId, id: Uuid) -> Result<Option<Tender>, DatabaseError> {
        let tenants = self.tenants.read().await;
        Ok(tenants.get(tenant).and_then(|d| d.tenders.get(&id).cloned()))
    }

    async fn save_tender(&self, tenant: &TenantId, tender: &Tender) -> Result<(), DatabaseError> {
        let mut tenants = self.tenants.write().await;
        tenants.entry(tenant.clone()).or_default().tenders.insert(tender.id, tender.clone());
        self.record_write();
        Ok(())
    }

    async fn update_tender_status(
        &self,
        tenant: &TenantId,
        id: Uuid,
        status: TenderStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let mut tenants = self.tenants.write().await;
        if let Some(tender) = tenants.get_mut(tenant).and_then(|d| d.tenders.get_mut(&id)) {
            tender.status = status;
            tender.updated_at = now;
            self.record_write();
        }
        Ok(())
    }

    async fn delete_tender(&self, tenant: &TenantId, id: Uuid) -> Result<bool, DatabaseError> {
        let mut tenants = self.tenants.write().await;
        let Some(data) = tenants.get_mut(tenant) else {
            return Ok(false);
        };
        let removed = data.tenders.remove(&id).is_some();
        if removed {
            data.tasks.retain(|_, t| t.tender_id != id);
            self.record_write();
        }
        Ok(removed)
    }

    async fn close_expired_tenders(&self, tenant: &TenantId, now: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let mut tenants = self.tenants.write().await;
        let Some(data) = tenants.get_mut(tenant) else {
            return Ok(0);
        };
        let mut closed = 0;
        for tender in data.tenders.values_mut() {
            if tender.status == TenderStatus::Active && tender.deadline.is_some_and(|d| d < now) {
                tender.status = TenderStatus::Closed;
                tender.updated_at = now;
                closed += 1;
            }
        }
        if closed > 0 {
            self.record_write();
        }
        Ok(closed)
    }

    async fn find_tasks(&self, tenant: &TenantId, query: &TaskQuery) -> Result<Vec<TenderTask>, DatabaseError> {
        let tenants = self.tenants.read().await;
        Ok(tenants
            .get(tenant)
            .map(|d| d.tasks.values().filter(|t| query.matches(t)).cloned().collect())
            .unwrap_or_default())
    }

    async fn get_task(&self, tenant: &TenantId, id: Uuid) -> Result<Option<TenderTask>, DatabaseError> {
        let tenants = self.tenants.read().await;
        Ok(tenants.get(tenant).and_then(|d| d.tasks.get(&id).cloned()))
    }

    async fn save_task(&self, tenant: &TenantId, task: &TenderTask) -> Result<(), DatabaseError> {
        let mut tenants = self.tenants.write().await;
        tenants.entry(tenant.clone()).or_default().tasks.insert(task.id, task.clone());
        self.record_write();
        Ok(())
    }

    async fn delete_task(&self, tenant: &TenantId, id: Uuid) -> Result<bool, DatabaseError> {
        let mut tenants = self.tenants.write().await;
        let removed = tenants
            .get_mut(tenant)
            .map(|d| d.tasks.remove(&id).is_some())
            .unwrap_or(false);
        if removed {
            self.record_write();
        }
        Ok(removed)
    }

    async fn find_rfqs(&self, tenant: &TenantId, query: &RfqQuery) -> Result<Vec<Rfq>, DatabaseError> {
        let tenants = self.tenants.read().await;
        let Some(data) = tenants.get(tenant) else {
            return Ok(vec![]);
        };
        Ok(data
            .rfqs
            .values()
            .filter(|r| query.status.map_or(true, |s| r.status == s))
            .filter(|r| match query.visible_to {
                Some(user) => {
                    r.created_by == user
                        || data.rfq_assignees.get(&r.id).is_some_and(|a| a.contains(&user))
                }
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn get_rfq(&self, tenant: &TenantId, id: Uuid) -> Result<Option<Rfq>, DatabaseError> {
        let tenants = self.tenants.read().await;
        Ok(tenants.get(tenant).and_then(|d| d.rfqs.get(&id).cloned()))
    }

    async fn save_rfq(&self, tenant: &TenantId, rfq: &Rfq) -> Result<(), DatabaseError> {
        let mut tenants = self.tenants.write().await;
        tenants.entry(tenant.clone()).or_default().rfqs.insert(rfq.id, rfq.clone());
        self.record_write();
        Ok(())
    }

    async fn update_rfq_status(
        &self,
        tenant: &TenantId,
        id: Uuid,
        status: RfqStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let mut tenants = self.tenants.write().await;
        if let Some(rfq) = tenants.get_mut(tenant).and_then(|d| d.rfqs.get_mut(&id)) {
            rfq.status = status;
            rfq.updated_at = now;
            self.record_write();
        }
        Ok(())
    }

    async fn delete_rfq(&self, tenant: &TenantId, id: Uuid) -> Result<bool, DatabaseError> {
        let mut tenants = self.tenants.write().await;
        let Some(data) = tenants.get_mut(tenant) else {
            return Ok(false);
        };
        data.rfq_assignees.remove(&id);
        let removed = data.rfqs.remove(&id).is_some();
        if removed {
            self.record_write();
        }
        Ok(removed)
    }

    async fn rfq_assignees(&self, tenant: &TenantId, rfq_id: Uuid) -> Result<Vec<Uuid>, DatabaseError> {
        let tenants = self.tenants.read().await;
        Ok(tenants
            .get(tenant)
            .and_then(|d| d.rfq_assignees.get(&rfq_id).cloned())
            .unwrap_or_default())
    }

    async fn set_rfq_assignees(&self, tenant: &TenantId, rfq_id: Uuid, users: &[Uuid]) -> Result<(), DatabaseError> {
        let mut deduped = users.to_vec();
        deduped.sort();
        deduped.dedup();

        let mut tenants = self.tenants.write().await;
        tenants.entry(tenant.clone()).or_default().rfq_assignees.insert(rfq_id, deduped);
        self.record_write();
        Ok(())
    }

    async fn close_expired_rfqs(&self, tenant: &TenantId, now: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let mut tenants = self.tenants.write().await;
        let Some(data) = tenants.get_mut(tenant) else {
            return Ok(0);
        };
        let mut closed = 0;
        for rfq in data.rfqs.values_mut() {
            if rfq.status == RfqStatus::Active && rfq.close_date < now {
                rfq.status = RfqStatus::Closed;
                rfq.updated_at = now;
                closed += 1;
            }
        }
        if closed > 0 {
            self.record_write();
        }
        Ok(closed)
    }

    async fn get_user(&self, tenant: &TenantId, id: Uuid) -> Result<Option<UserAccount>, DatabaseError> {
        let tenants = self.tenants.read().await;
        Ok(tenants.get(tenant).and_then(|d| d.users.get(&id).cloned()))
    }

    async fn find_users(&self, tenant: &TenantId, ids: &[Uuid]) -> Result<Vec<UserAccount>, DatabaseError> {
        let tenants = self.tenants.read().await;
        Ok(tenants
            .get(tenant)
            .map(|d| ids.iter().filter_map(|id| d.users.get(id).cloned()).collect())
            .unwrap_or_default())
    }
}
