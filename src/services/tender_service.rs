use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::{Tender, TenderStatus};
use crate::database::{Repository, TaskQuery, TenderQuery};
use crate::services::authorization::{can_mutate_tender, can_view_tender, ensure};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::lifecycle::{check_tender_transition, effective_tender_status, heal_tender, heal_tenders};
use crate::services::{double_option, require_text};
use crate::storage::FileStore;
use crate::types::{Principal, SharedClock, TenantId};

#[derive(Debug, Clone, Deserialize)]
pub struct NewTender {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    /// `draft` or `active`; defaults to `active`
    #[serde(default)]
    pub status: Option<TenderStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TenderUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub deadline: Option<Option<DateTime<Utc>>>,
    pub status: Option<TenderStatus>,
}

/// Tender reads and creator mutations. Every read heals stale statuses first.
#[derive(Clone)]
pub struct TenderService {
    repo: Arc<dyn Repository>,
    files: Arc<dyn FileStore>,
    clock: SharedClock,
}

impl TenderService {
    pub fn new(repo: Arc<dyn Repository>, files: Arc<dyn FileStore>, clock: SharedClock) -> Self {
        Self { repo, files, clock }
    }

    pub async fn create(&self, tenant: &TenantId, actor: &Principal, input: NewTender) -> ServiceResult<Tender> {
        require_text("title", &input.title)?;
        let now = self.clock.now();
        let status = input.status.unwrap_or(TenderStatus::Active);
        if !matches!(status, TenderStatus::Draft | TenderStatus::Active) {
            return Err(ServiceError::Validation(format!(
                "a new tender must be draft or active, not {}",
                status.as_str()
            )));
        }
        check_tender_transition(status, status, input.deadline, now)?;

        let tender = Tender::new(input.title.trim(), input.description, input.deadline, status, actor.user_id, now);
        self.repo.save_tender(tenant, &tender).await?;
        tracing::info!("Created tender {} in {}", tender.id, tenant);
        Ok(tender)
    }

    /// Tenders visible to the actor, optionally filtered on their healed status
    pub async fn list(
        &self,
        tenant: &TenantId,
        actor: &Principal,
        status: Option<TenderStatus>,
    ) -> ServiceResult<Vec<Tender>> {
        let now = self.clock.now();
        let query = TenderQuery {
            visible_to: (!actor.is_elevated()).then_some(actor.user_id),
            ..Default::default()
        };
        let tenders = self.repo.find_tenders(tenant, &query).await?;
        let healed = heal_tenders(self.repo.as_ref(), tenant, tenders, now).await?;
        Ok(healed
            .into_iter()
            .filter(|t| status.map_or(true, |s| t.status == s))
            .collect())
    }

    pub async fn get(&self, tenant: &TenantId, actor: &Principal, id: Uuid) -> ServiceResult<Tender> {
        let tender = self.load(tenant, id).await?;
        let tasks = self.repo.find_tasks(tenant, &TaskQuery::for_tender(id)).await?;
        ensure(can_view_tender(&tender, &tasks, actor), "not a participant of this tender")?;
        heal_tender(self.repo.as_ref(), tenant, tender, self.clock.now()).await
    }

    pub async fn update(
        &self,
        tenant: &TenantId,
        actor: &Principal,
        id: Uuid,
        update: TenderUpdate,
    ) -> ServiceResult<Tender> {
        let now = self.clock.now();
        let mut tender = self.load(tenant, id).await?;
        ensure(can_mutate_tender(&tender, actor), "only the creator may change a tender")?;

        let current = effective_tender_status(&tender, now);
        let deadline_changed = update.deadline.is_some();
        let deadline = update.deadline.unwrap_or(tender.deadline);

        let status = match update.status {
            Some(requested) => {
                check_tender_transition(current, requested, deadline, now)?;
                requested
            }
            // Moving a closed tender's deadline into the future reopens it
            None if deadline_changed && current == TenderStatus::Closed && deadline.is_some_and(|d| d >= now) => {
                TenderStatus::Active
            }
            None => current,
        };

        if let Some(title) = update.title {
            require_text("title", &title)?;
            tender.title = title.trim().to_string();
        }
        if let Some(description) = update.description {
            tender.description = description;
        }
        tender.deadline = deadline;
        tender.status = status;
        tender.status = effective_tender_status(&tender, now);
        tender.updated_at = now;

        self.repo.save_tender(tenant, &tender).await?;
        Ok(tender)
    }

    /// Close a tender ahead of its deadline
    pub async fn resolve(&self, tenant: &TenantId, actor: &Principal, id: Uuid) -> ServiceResult<Tender> {
        let update = TenderUpdate {
            status: Some(TenderStatus::Closed),
            ..Default::default()
        };
        self.update(tenant, actor, id, update).await
    }

    /// Hard delete, cascading to tasks and their stored files
    pub async fn delete(&self, tenant: &TenantId, actor: &Principal, id: Uuid) -> ServiceResult<()> {
        let tender = self.load(tenant, id).await?;
        ensure(can_mutate_tender(&tender, actor), "only the creator may delete a tender")?;

        let tasks = self.repo.find_tasks(tenant, &TaskQuery::for_tender(id)).await?;
        if !self.repo.delete_tender(tenant, id).await? {
            return Err(ServiceError::NotFound("Tender"));
        }
        for file in tasks.iter().filter_map(|t| t.file_ref.as_deref()) {
            if let Err(e) = self.files.delete(tenant, file).await {
                tracing::warn!("Failed to remove file {} of deleted tender {}: {}", file, id, e);
            }
        }
        tracing::info!("Deleted tender {} with {} task(s) in {}", id, tasks.len(), tenant);
        Ok(())
    }

    async fn load(&self, tenant: &TenantId, id: Uuid) -> ServiceResult<Tender> {
        self.repo
            .get_tender(tenant, id)
            .await?
            .ok_or(ServiceError::NotFound("Tender"))
    }
}
