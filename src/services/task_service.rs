//! Task assignment, submission and the notifications they trigger.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::{TaskStatus, Tender, TenderTask};
use crate::database::{Repository, TaskQuery};
use crate::notify::{messages, send_best_effort, NotificationSender, OutboundMessage};
use crate::services::authorization::{can_mutate_tender, can_submit_file, can_view_task, ensure, sees_all_tasks};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::{double_option, require_text};
use crate::storage::{sanitize_file_name, FileStore};
use crate::types::{Principal, SharedClock, TenantId};

#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub assignee_id: Uuid,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub assignee_id: Option<Uuid>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

#[derive(Clone)]
pub struct TaskService {
    repo: Arc<dyn Repository>,
    files: Arc<dyn FileStore>,
    sender: Arc<dyn NotificationSender>,
    clock: SharedClock,
}

impl TaskService {
    pub fn new(
        repo: Arc<dyn Repository>,
        files: Arc<dyn FileStore>,
        sender: Arc<dyn NotificationSender>,
        clock: SharedClock,
    ) -> Self {
        Self { repo, files, sender, clock }
    }

    pub async fn create_task(
        &self,
        tenant: &TenantId,
        actor: &Principal,
        tender_id: Uuid,
        input: NewTask,
    ) -> ServiceResult<TenderTask> {
        let tender = self.load_tender(tenant, tender_id).await?;
        ensure(can_mutate_tender(&tender, actor), "only the tender creator may add tasks")?;
        require_text("title", &input.title)?;
        self.check_assignee(tenant, input.assignee_id).await?;

        let task = TenderTask::new(
            tender.id,
            input.title.trim(),
            input.description,
            input.assignee_id,
            input.due_date,
            self.clock.now(),
        );
        self.repo.save_task(tenant, &task).await?;
        tracing::info!("Created task {} on tender {} in {}", task.id, tender.id, tenant);

        self.notify_assigned(tenant, &tender, &task).await;
        Ok(task)
    }

    pub async fn update_task(
        &self,
        tenant: &TenantId,
        actor: &Principal,
        task_id: Uuid,
        update: TaskUpdate,
    ) -> ServiceResult<TenderTask> {
        let mut task = self.load_task(tenant, task_id).await?;
        let tender = self.load_tender(tenant, task.tender_id).await?;
        ensure(can_mutate_tender(&tender, actor), "only the tender creator may edit tasks")?;

        if let Some(title) = &update.title {
            require_text("title", title)?;
        }
        let reassigned = match update.assignee_id {
            Some(assignee) if assignee != task.assignee_id => {
                self.check_assignee(tenant, assignee).await?;
                true
            }
            _ => false,
        };

        if let Some(title) = update.title {
            task.title = title.trim().to_string();
        }
        if let Some(description) = update.description {
            task.description = description;
        }
        if let Some(assignee) = update.assignee_id {
            task.assignee_id = assignee;
        }
        if let Some(due_date) = update.due_date {
            task.due_date = due_date;
        }
        task.updated_at = self.clock.now();
        self.repo.save_task(tenant, &task).await?;

        if reassigned {
            self.notify_assigned(tenant, &tender, &task).await;
        }
        Ok(task)
    }

    /// Store a submitted file, replacing any earlier one, and mark the task submitted
    pub async fn submit_task_file(
        &self,
        tenant: &TenantId,
        actor: &Principal,
        task_id: Uuid,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> ServiceResult<TenderTask> {
        let mut task = self.load_task(tenant, task_id).await?;
        let tender = self.load_tender(tenant, task.tender_id).await?;
        ensure(can_submit_file(&tender, &task, actor), "only the creator or assignee may submit a file")?;
        if bytes.is_empty() {
            return Err(ServiceError::InvalidTransition("cannot submit an empty file".to_string()));
        }

        let path = format!("tasks/{}/{}-{}", task.id, Uuid::new_v4().simple(), sanitize_file_name(file_name));
        self.files.put(tenant, &path, bytes).await?;

        let previous = task.file_ref.take();
        task.mark_submitted(path.clone(), self.clock.now());
        if let Err(e) = self.repo.save_task(tenant, &task).await {
            self.discard_file(tenant, &path).await;
            return Err(e.into());
        }
        if let Some(old) = previous {
            self.discard_file(tenant, &old).await;
        }
        tracing::info!("Task {} submitted in {}", task.id, tenant);

        self.notify_submitted(tenant, &tender, &task).await;
        Ok(task)
    }

    pub async fn clear_task_file(&self, tenant: &TenantId, actor: &Principal, task_id: Uuid) -> ServiceResult<TenderTask> {
        let mut task = self.load_task(tenant, task_id).await?;
        let tender = self.load_tender(tenant, task.tender_id).await?;
        ensure(can_submit_file(&tender, &task, actor), "only the creator or assignee may remove the file")?;

        let previous = task.clear_submission(self.clock.now());
        self.repo.save_task(tenant, &task).await?;
        if let Some(old) = previous {
            self.discard_file(tenant, &old).await;
        }
        Ok(task)
    }

    pub async fn delete_task(&self, tenant: &TenantId, actor: &Principal, task_id: Uuid) -> ServiceResult<()> {
        let task = self.load_task(tenant, task_id).await?;
        let tender = self.load_tender(tenant, task.tender_id).await?;
        ensure(can_mutate_tender(&tender, actor), "only the tender creator may delete tasks")?;

        if !self.repo.delete_task(tenant, task.id).await? {
            return Err(ServiceError::NotFound("Task"));
        }
        if let Some(file) = &task.file_ref {
            self.discard_file(tenant, file).await;
        }
        Ok(())
    }

    /// The creator and elevated roles see every task; an assignee sees their own
    pub async fn list_tasks(&self, tenant: &TenantId, actor: &Principal, tender_id: Uuid) -> ServiceResult<Vec<TenderTask>> {
        let tender = self.load_tender(tenant, tender_id).await?;
        let mut query = TaskQuery::for_tender(tender_id);
        if !sees_all_tasks(&tender, actor) {
            query.assignee_id = Some(actor.user_id);
        }
        let tasks: Vec<TenderTask> = self
            .repo
            .find_tasks(tenant, &query)
            .await?
            .into_iter()
            .filter(|t| t.status != TaskStatus::Deleted)
            .collect();

        if tasks.is_empty() && !sees_all_tasks(&tender, actor) {
            return Err(ServiceError::Forbidden("not a participant of this tender"));
        }
        Ok(tasks)
    }

    pub async fn download_task_file(
        &self,
        tenant: &TenantId,
        actor: &Principal,
        task_id: Uuid,
    ) -> ServiceResult<(TenderTask, Vec<u8>)> {
        let task = self.load_task(tenant, task_id).await?;
        let tender = self.load_tender(tenant, task.tender_id).await?;
        ensure(can_view_task(&tender, &task, actor), "not assigned to this task")?;

        let path = task.file_ref.as_deref().ok_or(ServiceError::NotFound("File"))?;
        let bytes = self.files.get(tenant, path).await?;
        Ok((task, bytes))
    }

    async fn load_tender(&self, tenant: &TenantId, id: Uuid) -> ServiceResult<Tender> {
        self.repo
            .get_tender(tenant, id)
            .await?
            .ok_or(ServiceError::NotFound("Tender"))
    }

    async fn load_task(&self, tenant: &TenantId, id: Uuid) -> ServiceResult<TenderTask> {
        match self.repo.get_task(tenant, id).await? {
            Some(task) if task.status != TaskStatus::Deleted => Ok(task),
            _ => Err(ServiceError::NotFound("Task")),
        }
    }

    async fn check_assignee(&self, tenant: &TenantId, assignee: Uuid) -> ServiceResult<()> {
        match self.repo.get_user(tenant, assignee).await? {
            Some(_) => Ok(()),
            None => Err(ServiceError::InvalidAssignee(assignee)),
        }
    }

    async fn discard_file(&self, tenant: &TenantId, path: &str) {
        if let Err(e) = self.files.delete(tenant, path).await {
            tracing::warn!("Failed to remove stored file {} in {}: {}", path, tenant, e);
        }
    }

    async fn notify_assigned(&self, tenant: &TenantId, tender: &Tender, task: &TenderTask) {
        let user = match self.repo.get_user(tenant, task.assignee_id).await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!("Could not look up assignee {} for notification: {}", task.assignee_id, e);
                return;
            }
        };
        match user.and_then(|u| u.email) {
            Some(email) => {
                let message = messages::task_assigned(&email, tender, task);
                send_best_effort(self.sender.as_ref(), tenant, &message).await;
            }
            None => tracing::debug!("Assignee {} has no email, skipping notification", task.assignee_id),
        }
    }

    /// Tell every assignee on the tender and its creator, once each
    async fn notify_submitted(&self, tenant: &TenantId, tender: &Tender, task: &TenderTask) {
        let recipients = match self.submission_recipients(tenant, tender).await {
            Ok(recipients) => recipients,
            Err(e) => {
                tracing::warn!("Could not resolve recipients for task {}: {}", task.id, e);
                return;
            }
        };
        for email in recipients {
            let message: OutboundMessage = messages::task_submitted(&email, tender, task);
            send_best_effort(self.sender.as_ref(), tenant, &message).await;
        }
    }

    async fn submission_recipients(&self, tenant: &TenantId, tender: &Tender) -> ServiceResult<BTreeSet<String>> {
        let tasks = self.repo.find_tasks(tenant, &TaskQuery::for_tender(tender.id)).await?;
        let mut user_ids: BTreeSet<Uuid> = tasks.iter().map(|t| t.assignee_id).collect();
        user_ids.insert(tender.created_by);

        let ids: Vec<Uuid> = user_ids.into_iter().collect();
        let users = self.repo.find_users(tenant, &ids).await?;
        Ok(users.into_iter().filter_map(|u| u.email).collect())
    }
}
