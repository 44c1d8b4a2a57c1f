use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    Rfq, RfqStatus, TaskStatus, Tender, TenderStatus, TenderTask, UserAccount,
};
use crate::types::TenantId;

/// Predicate for tender lookups. Unset fields do not constrain the result.
#[derive(Debug, Clone, Default)]
pub struct TenderQuery {
    pub ids: Option<Vec<Uuid>>,
    pub status: Option<TenderStatus>,
    /// Restrict to tenders the user created or holds at least one task on
    pub visible_to: Option<Uuid>,
    /// Inclusive lower bound on a non-null deadline
    pub deadline_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on a non-null deadline
    pub deadline_to: Option<DateTime<Utc>>,
}

impl TenderQuery {
    pub fn with_status(status: TenderStatus) -> Self {
        Self { status: Some(status), ..Default::default() }
    }

    /// Field-level match. `visible_to` needs task data and is resolved by the store.
    pub fn matches_fields(&self, tender: &Tender) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&tender.id) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if tender.status != status {
                return false;
            }
        }
        if self.deadline_from.is_some() || self.deadline_to.is_some() {
            let Some(deadline) = tender.deadline else {
                return false;
            };
            if self.deadline_from.is_some_and(|from| deadline < from) {
                return false;
            }
            if self.deadline_to.is_some_and(|to| deadline > to) {
                return false;
            }
        }
        true
    }
}

/// Predicate for task lookups
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    pub tender_ids: Option<Vec<Uuid>>,
    pub assignee_id: Option<Uuid>,
    pub status: Option<TaskStatus>,
    /// Exclusive lower bound on a non-null due date
    pub due_after: Option<DateTime<Utc>>,
    /// Inclusive upper bound on a non-null due date
    pub due_until: Option<DateTime<Utc>>,
}

impl TaskQuery {
    pub fn for_tender(tender_id: Uuid) -> Self {
        Self { tender_ids: Some(vec![tender_id]), ..Default::default() }
    }

    pub fn matches(&self, task: &TenderTask) -> bool {
        if let Some(ids) = &self.tender_ids {
            if !ids.contains(&task.tender_id) {
                return false;
            }
        }
        if self.assignee_id.is_some_and(|a| a != task.assignee_id) {
            return false;
        }
        if self.status.is_some_and(|s| s != task.status) {
            return false;
        }
        if self.due_after.is_some() || self.due_until.is_some() {
            let Some(due) = task.due_date else {
                return false;
            };
            if self.due_after.is_some_and(|after| due <= after) {
                return false;
            }
            if self.due_until.is_some_and(|until| due > until) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct RfqQuery {
    pub status: Option<RfqStatus>,
    /// Restrict to RFQs the user created or is assigned to
    pub visible_to: Option<Uuid>,
}

/// Tenant-scoped store for the lifecycle core.
///
/// How tenants are isolated underneath (database per tenant, schema, column)
/// is the implementation's business; callers only pass the `TenantId`.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn find_tenders(&self, tenant: &TenantId, query: &TenderQuery) -> Result<Vec<Tender>, DatabaseError>;
    async fn get_tender(&self, tenant: &TenantId, id: Uuid) -> Result<Option<Tender>, DatabaseError>;
    /// Insert or fully replace a tender
    async fn save_tender(&self, tenant: &TenantId, tender: &Tender) -> Result<(), DatabaseError>;
    /// Write only `status` and `updated_at`; title, deadline and the rest stay as stored.
    /// Last writer wins on status itself.
    async fn update_tender_status(
        &self,
        tenant: &TenantId,
        id: Uuid,
        status: TenderStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;
    /// Remove a tender and its tasks. Returns false when nothing was deleted.
    async fn delete_tender(&self, tenant: &TenantId, id: Uuid) -> Result<bool, DatabaseError>;
    /// Move every `Active` tender with `deadline < now` to `Closed`. Returns the number changed.
    async fn close_expired_tenders(&self, tenant: &TenantId, now: DateTime<Utc>) -> Result<u64, DatabaseError>;

    async fn find_tasks(&self, tenant: &TenantId, query: &TaskQuery) -> Result<Vec<TenderTask>, DatabaseError>;
    async fn get_task(&self, tenant: &TenantId, id: Uuid) -> Result<Option<TenderTask>, DatabaseError>;
    async fn save_task(&self, tenant: &TenantId, task: &TenderTask) -> Result<(), DatabaseError>;
    async fn delete_task(&self, tenant: &TenantId, id: Uuid) -> Result<bool, DatabaseError>;

    async fn find_rfqs(&self, tenant: &TenantId, query: &RfqQuery) -> Result<Vec<Rfq>, DatabaseError>;
    async fn get_rfq(&self, tenant: &TenantId, id: Uuid) -> Result<Option<Rfq>, DatabaseError>;
    async fn save_rfq(&self, tenant: &TenantId, rfq: &Rfq) -> Result<(), DatabaseError>;
    async fn update_rfq_status(
        &self,
        tenant: &TenantId,
        id: Uuid,
        status: RfqStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;
    async fn delete_rfq(&self, tenant: &TenantId, id: Uuid) -> Result<bool, DatabaseError>;
    async fn rfq_assignees(&self, tenant: &TenantId, rfq_id: Uuid) -> Result<Vec<Uuid>, DatabaseError>;
    async fn set_rfq_assignees(&self, tenant: &TenantId, rfq_id: Uuid, users: &[Uuid]) -> Result<(), DatabaseError>;
    async fn close_expired_rfqs(&self, tenant: &TenantId, now: DateTime<Utc>) -> Result<u64, DatabaseError>;

    async fn get_user(&self, tenant: &TenantId, id: Uuid) -> Result<Option<UserAccount>, DatabaseError>;
    async fn find_users(&self, tenant: &TenantId, ids: &[Uuid]) -> Result<Vec<UserAccount>, DatabaseError>;
}
