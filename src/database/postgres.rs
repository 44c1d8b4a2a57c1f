use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::{
    Rfq, RfqItem, RfqStatus, TaskStatus, Tender, TenderStatus, TenderTask, UserAccount,
};
use crate::database::repository::{Repository, RfqQuery, TaskQuery, TenderQuery};
use crate::types::{Role, TenantId};

/// Tables every tenant database carries
const TENANT_SCHEMA: &str = include_str!("schema.sql");

#[derive(Debug, FromRow)]
struct TenderRow {
    id: Uuid,
    title: String,
    description: String,
    deadline: Option<DateTime<Utc>>,
    status: String,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TenderRow> for Tender {
    type Error = DatabaseError;

    fn try_from(row: TenderRow) -> Result<Self, Self::Error> {
        Ok(Tender {
            id: row.id,
            title: row.title,
            description: row.description,
            deadline: row.deadline,
            status: TenderStatus::parse(&row.status)?,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct TaskRow {
    id: Uuid,
    tender_id: Uuid,
    title: String,
    description: String,
    assignee_id: Uuid,
    status: String,
    file_ref: Option<String>,
    due_date: Option<DateTime<Utc>>,
    submitted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for TenderTask {
    type Error = DatabaseError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(TenderTask {
            id: row.id,
            tender_id: row.tender_id,
            title: row.title,
            description: row.description,
            assignee_id: row.assignee_id,
            status: TaskStatus::parse(&row.status)?,
            file_ref: row.file_ref,
            due_date: row.due_date,
            submitted_at: row.submitted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct RfqRow {
    id: Uuid,
    subject: String,
    sender_address: String,
    items: serde_json::Value,
    open_date: DateTime<Utc>,
    close_date: DateTime<Utc>,
    status: String,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RfqRow> for Rfq {
    type Error = DatabaseError;

    fn try_from(row: RfqRow) -> Result<Self, Self::Error> {
        let items: Vec<RfqItem> = serde_json::from_value(row.items)?;
        Ok(Rfq {
            id: row.id,
            subject: row.subject,
            sender_address: row.sender_address,
            items,
            open_date: row.open_date,
            close_date: row.close_date,
            status: RfqStatus::parse(&row.status)?,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: Option<String>,
    access: String,
}

impl From<UserRow> for UserAccount {
    fn from(row: UserRow) -> Self {
        UserAccount {
            id: row.id,
            name: row.name,
            email: row.email,
            role: Role::parse(&row.access),
        }
    }
}

/// Postgres-backed repository. Each tenant lives in its own database,
/// resolved through the pool cache.
pub struct PgRepository {
    manager: DatabaseManager,
}

impl PgRepository {
    pub fn new(manager: DatabaseManager) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &DatabaseManager {
        &self.manager
    }

    async fn pool(&self, tenant: &TenantId) -> Result<PgPool, DatabaseError> {
        self.manager.tenant_pool(tenant).await
    }

    /// Create the lifecycle tables in a tenant database if missing
    pub async fn install_schema(&self, tenant: &TenantId) -> Result<(), DatabaseError> {
        let pool = self.pool(tenant).await?;
        for statement in TENANT_SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&pool).await?;
        }
        tracing::info!("Tenant schema ensured for {}", tenant);
        Ok(())
    }
}

fn push_tender_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &TenderQuery) {
    qb.push(" WHERE 1 = 1");
    if let Some(ids) = &query.ids {
        qb.push(" AND id = ANY(").push_bind(ids.clone()).push(")");
    }
    if let Some(status) = query.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(user) = query.visible_to {
        qb.push(" AND (created_by = ")
            .push_bind(user)
            .push(" OR id IN (SELECT tender_id FROM tender_tasks WHERE status <> 'deleted' AND assignee_id = ")
            .push_bind(user)
            .push("))");
    }
    if query.deadline_from.is_some() || query.deadline_to.is_some() {
        qb.push(" AND deadline IS NOT NULL");
    }
    if let Some(from) = query.deadline_from {
        qb.push(" AND deadline >= ").push_bind(from);
    }
    if let Some(to) = query.deadline_to {
        qb.push(" AND deadline <= ").push_bind(to);
    }
}

fn push_task_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &TaskQuery) {
    qb.push(" WHERE 1 = 1");
    if let Some(ids) = &query.tender_ids {
        qb.push(" AND tender_id = ANY(").push_bind(ids.clone()).push(")");
    }
    if let Some(assignee) = query.assignee_id {
        qb.push(" AND assignee_id = ").push_bind(assignee);
    }
    if let Some(status) = query.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if query.due_after.is_some() || query.due_until.is_some() {
        qb.push(" AND due_date IS NOT NULL");
    }
    if let Some(after) = query.due_after {
        qb.push(" AND due_date > ").push_bind(after);
    }
    if let Some(until) = query.due_until {
        qb.push(" AND due_date <= ").push_bind(until);
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn find_tenders(&self, tenant: &TenantId, query: &TenderQuery) -> Result<Vec<Tender>, DatabaseError> {
        let pool = self.pool(tenant).await?;
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM tenders");
        push_tender_filters(&mut qb, query);
        qb.push(" ORDER BY created_at DESC");

        let rows: Vec<TenderRow> = qb.build_query_as().fetch_all(&pool).await?;
        rows.into_iter().map(Tender::try_from).collect()
    }

    async fn get_tender(&self, tenant: &TenantId, id: Uuid) -> Result<Option<Tender>, DatabaseError> {
        let pool = self.pool(tenant).await?;
        let row: Option<TenderRow> = sqlx::query_as("SELECT * FROM tenders WHERE id = $1")
            .bind(id)
            .fetch_optional(&pool)
            .await?;
        row.map(Tender::try_from).transpose()
    }

    async fn save_tender(&self, tenant: &TenantId, tender: &Tender) -> Result<(), DatabaseError> {
        let pool = self.pool(tenant).await?;
        sqlx::query(
            r#"
            INSERT INTO tenders (id, title, description, deadline, status, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                deadline = EXCLUDED.deadline,
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(tender.id)
        .bind(&tender.title)
        .bind(&tender.description)
        .bind(tender.deadline)
        .bind(tender.status.as_str())
        .bind(tender.created_by)
        .bind(tender.created_at)
        .bind(tender.updated_at)
        .execute(&pool)
        .await?;
        Ok(())
    }

    async fn update_tender_status(
        &self,
        tenant: &TenantId,
        id: Uuid,
        status: TenderStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let pool = self.pool(tenant).await?;
        sqlx::query("UPDATE tenders SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .bind(now)
            .execute(&pool)
            .await?;
        Ok(())
    }

    async fn delete_tender(&self, tenant: &TenantId, id: Uuid) -> Result<bool, DatabaseError> {
        let pool = self.pool(tenant).await?;
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM tender_tasks WHERE tender_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM tenders WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn close_expired_tenders(&self, tenant: &TenantId, now: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let pool = self.pool(tenant).await?;
        let result = sqlx::query(
            "UPDATE tenders SET status = 'closed', updated_at = $1 \
             WHERE status = 'active' AND deadline IS NOT NULL AND deadline < $1",
        )
        .bind(now)
        .execute(&pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn find_tasks(&self, tenant: &TenantId, query: &TaskQuery) -> Result<Vec<TenderTask>, DatabaseError> {
        let pool = self.pool(tenant).await?;
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM tender_tasks");
        push_task_filters(&mut qb, query);
        qb.push(" ORDER BY due_date ASC NULLS LAST, created_at ASC");

        let rows: Vec<TaskRow> = qb.build_query_as().fetch_all(&pool).await?;
        rows.into_iter().map(TenderTask::try_from).collect()
    }

    async fn get_task(&self, tenant: &TenantId, id: Uuid) -> Result<Option<TenderTask>, DatabaseError> {
        let pool = self.pool(tenant).await?;
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tender_tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&pool)
            .await?;
        row.map(TenderTask::try_from).transpose()
    }

    async fn save_task(&self, tenant: &TenantId, task: &TenderTask) -> Result<(), DatabaseError> {
        let pool = self.pool(tenant).await?;
        sqlx::query(
            r#"
            INSERT INTO tender_tasks
                (id, tender_id, title, description, assignee_id, status, file_ref,
                 due_date, submitted_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                assignee_id = EXCLUDED.assignee_id,
                status = EXCLUDED.status,
                file_ref = EXCLUDED.file_ref,
                due_date = EXCLUDED.due_date,
                submitted_at = EXCLUDED.submitted_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(task.id)
        .bind(task.tender_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.assignee_id)
        .bind(task.status.as_str())
        .bind(&task.file_ref)
        .bind(task.due_date)
        .bind(task.submitted_at)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&pool)
        .await?;
        Ok(())
    }

    async fn delete_task(&self, tenant: &TenantId, id: Uuid) -> Result<bool, DatabaseError> {
        let pool = self.pool(tenant).await?;
        let result = sqlx::query("DELETE FROM tender_tasks WHERE id = $1")
            .bind(id)
            .execute(&pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_rfqs(&self, tenant: &TenantId, query: &RfqQuery) -> Result<Vec<Rfq>, DatabaseError> {
        let pool = self.pool(tenant).await?;
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM rfqs WHERE 1 = 1");
        if let Some(status) = query.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(user) = query.visible_to {
            qb.push(" AND (created_by = ")
                .push_bind(user)
                .push(" OR id IN (SELECT rfq_id FROM rfq_assignments WHERE user_id = ")
                .push_bind(user)
                .push("))");
        }
        qb.push(" ORDER BY close_date ASC");

        let rows: Vec<RfqRow> = qb.build_query_as().fetch_all(&pool).await?;
        rows.into_iter().map(Rfq::try_from).collect()
    }

    async fn get_rfq(&self, tenant: &TenantId, id: Uuid) -> Result<Option<Rfq>, DatabaseError> {
        let pool = self.pool(tenant).await?;
        let row: Option<RfqRow> = sqlx::query_as("SELECT * FROM rfqs WHERE id = $1")
            .bind(id)
            .fetch_optional(&pool)
            .await?;
        row.map(Rfq::try_from).transpose()
    }

    async fn save_rfq(&self, tenant: &TenantId, rfq: &Rfq) -> Result<(), DatabaseError> {
        let pool = self.pool(tenant).await?;
        let items = serde_json::to_value(&rfq.items)?;
        sqlx::query(
            r#"
            INSERT INTO rfqs
                (id, subject, sender_address, items, open_date, close_date, status,
                 created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                subject = EXCLUDED.subject,
                sender_address = EXCLUDED.sender_address,
                items = EXCLUDED.items,
                open_date = EXCLUDED.open_date,
                close_date = EXCLUDED.close_date,
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(rfq.id)
        .bind(&rfq.subject)
        .bind(&rfq.sender_address)
        .bind(items)
        .bind(rfq.open_date)
        .bind(rfq.close_date)
        .bind(rfq.status.as_str())
        .bind(rfq.created_by)
        .bind(rfq.created_at)
        .bind(rfq.updated_at)
        .execute(&pool)
        .await?;
        Ok(())
    }

    async fn update_rfq_status(
        &self,
        tenant: &TenantId,
        id: Uuid,
        status: RfqStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let pool = self.pool(tenant).await?;
        sqlx::query("UPDATE rfqs SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .bind(now)
            .execute(&pool)
            .await?;
        Ok(())
    }

    async fn delete_rfq(&self, tenant: &TenantId, id: Uuid) -> Result<bool, DatabaseError> {
        let pool = self.pool(tenant).await?;
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM rfq_assignments WHERE rfq_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM rfqs WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn rfq_assignees(&self, tenant: &TenantId, rfq_id: Uuid) -> Result<Vec<Uuid>, DatabaseError> {
        let pool = self.pool(tenant).await?;
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT user_id FROM rfq_assignments WHERE rfq_id = $1 ORDER BY user_id")
                .bind(rfq_id)
                .fetch_all(&pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn set_rfq_assignees(&self, tenant: &TenantId, rfq_id: Uuid, users: &[Uuid]) -> Result<(), DatabaseError> {
        let pool = self.pool(tenant).await?;
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM rfq_assignments WHERE rfq_id = $1")
            .bind(rfq_id)
            .execute(&mut *tx)
            .await?;
        for user in users {
            sqlx::query(
                "INSERT INTO rfq_assignments (rfq_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(rfq_id)
            .bind(user)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn close_expired_rfqs(&self, tenant: &TenantId, now: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let pool = self.pool(tenant).await?;
        let result = sqlx::query(
            "UPDATE rfqs SET status = 'closed', updated_at = $1 WHERE status = 'active' AND close_date < $1",
        )
        .bind(now)
        .execute(&pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn get_user(&self, tenant: &TenantId, id: Uuid) -> Result<Option<UserAccount>, DatabaseError> {
        let pool = self.pool(tenant).await?;
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, name, email, access FROM users \
             WHERE id = $1 AND trashed_at IS NULL AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&pool)
        .await?;
        Ok(row.map(UserAccount::from))
    }

    async fn find_users(&self, tenant: &TenantId, ids: &[Uuid]) -> Result<Vec<UserAccount>, DatabaseError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let pool = self.pool(tenant).await?;
        let rows: Vec<UserRow> = sqlx::query_as(
            "SELECT id, name, email, access FROM users \
             WHERE id = ANY($1) AND trashed_at IS NULL AND deleted_at IS NULL",
        )
        .bind(ids.to_vec())
        .fetch_all(&pool)
        .await?;
        Ok(rows.into_iter().map(UserAccount::from).collect())
    }
}
