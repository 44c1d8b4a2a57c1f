use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::{Rfq, RfqItem, RfqStatus};
use crate::database::{Repository, RfqQuery};
use crate::services::authorization::{can_mutate_rfq, can_view_rfq, ensure};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::lifecycle::{check_rfq_send, effective_rfq_status, heal_rfq};
use crate::services::require_text;
use crate::types::{Principal, SharedClock, TenantId};

#[derive(Debug, Clone, Deserialize)]
pub struct NewRfq {
    pub subject: String,
    pub sender_address: String,
    #[serde(default)]
    pub items: Vec<RfqItem>,
    /// Defaults to the time of creation
    #[serde(default)]
    pub open_date: Option<DateTime<Utc>>,
    pub close_date: DateTime<Utc>,
    #[serde(default)]
    pub assignees: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RfqUpdate {
    pub subject: Option<String>,
    pub sender_address: Option<String>,
    pub items: Option<Vec<RfqItem>>,
    pub open_date: Option<DateTime<Utc>>,
    pub close_date: Option<DateTime<Utc>>,
}

/// An RFQ together with its assignment list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RfqView {
    #[serde(flatten)]
    pub rfq: Rfq,
    pub assignees: Vec<Uuid>,
}

#[derive(Clone)]
pub struct RfqService {
    repo: Arc<dyn Repository>,
    clock: SharedClock,
}

impl RfqService {
    pub fn new(repo: Arc<dyn Repository>, clock: SharedClock) -> Self {
        Self { repo, clock }
    }

    pub async fn create(&self, tenant: &TenantId, actor: &Principal, input: NewRfq) -> ServiceResult<RfqView> {
        require_text("subject", &input.subject)?;
        require_text("sender_address", &input.sender_address)?;
        let now = self.clock.now();
        let open_date = input.open_date.unwrap_or(now);
        check_dates(open_date, input.close_date)?;
        let assignees = self.check_assignees(tenant, &input.assignees).await?;

        let mut rfq = Rfq::new(
            input.subject.trim(),
            input.sender_address.trim(),
            input.items,
            open_date,
            input.close_date,
            actor.user_id,
            now,
        );
        rfq.status = effective_rfq_status(&rfq, now);
        self.repo.save_rfq(tenant, &rfq).await?;
        self.repo.set_rfq_assignees(tenant, rfq.id, &assignees).await?;
        tracing::info!("Created RFQ {} in {}", rfq.id, tenant);
        Ok(RfqView { rfq, assignees })
    }

    pub async fn list(&self, tenant: &TenantId, actor: &Principal, status: Option<RfqStatus>) -> ServiceResult<Vec<Rfq>> {
        let now = self.clock.now();
        let query = RfqQuery {
            visible_to: (!actor.is_elevated()).then_some(actor.user_id),
            ..Default::default()
        };
        let mut healed = Vec::new();
        for rfq in self.repo.find_rfqs(tenant, &query).await? {
            let rfq = heal_rfq(self.repo.as_ref(), tenant, rfq, now).await?;
            if status.map_or(true, |s| rfq.status == s) {
                healed.push(rfq);
            }
        }
        Ok(healed)
    }

    pub async fn get(&self, tenant: &TenantId, actor: &Principal, id: Uuid) -> ServiceResult<RfqView> {
        let rfq = self.load(tenant, id).await?;
        let assignees = self.repo.rfq_assignees(tenant, id).await?;
        ensure(can_view_rfq(&rfq, &assignees, actor), "not assigned to this RFQ")?;
        let rfq = heal_rfq(self.repo.as_ref(), tenant, rfq, self.clock.now()).await?;
        Ok(RfqView { rfq, assignees })
    }

    pub async fn update(&self, tenant: &TenantId, actor: &Principal, id: Uuid, update: RfqUpdate) -> ServiceResult<RfqView> {
        let now = self.clock.now();
        let mut rfq = self.load(tenant, id).await?;
        ensure(can_mutate_rfq(&rfq, actor), "only the creator may change an RFQ")?;

        if let Some(subject) = &update.subject {
            require_text("subject", subject)?;
        }
        if let Some(address) = &update.sender_address {
            require_text("sender_address", address)?;
        }
        let open_date = update.open_date.unwrap_or(rfq.open_date);
        let close_date = update.close_date.unwrap_or(rfq.close_date);
        check_dates(open_date, close_date)?;

        let current = effective_rfq_status(&rfq, now);
        // Pushing the close date of an auto-closed RFQ into the future reopens it
        rfq.status = if update.close_date.is_some() && current == RfqStatus::Closed && close_date >= now {
            RfqStatus::Active
        } else {
            current
        };

        if let Some(subject) = update.subject {
            rfq.subject = subject.trim().to_string();
        }
        if let Some(address) = update.sender_address {
            rfq.sender_address = address.trim().to_string();
        }
        if let Some(items) = update.items {
            rfq.items = items;
        }
        rfq.open_date = open_date;
        rfq.close_date = close_date;
        rfq.status = effective_rfq_status(&rfq, now);
        rfq.updated_at = now;

        self.repo.save_rfq(tenant, &rfq).await?;
        let assignees = self.repo.rfq_assignees(tenant, id).await?;
        Ok(RfqView { rfq, assignees })
    }

    /// Record that the RFQ went out to suppliers
    pub async fn mark_sent(&self, tenant: &TenantId, actor: &Principal, id: Uuid) -> ServiceResult<Rfq> {
        let now = self.clock.now();
        let mut rfq = self.load(tenant, id).await?;
        ensure(can_mutate_rfq(&rfq, actor), "only the creator may send an RFQ")?;
        // Rejected sends leave the stored row alone, stale status included
        check_rfq_send(&rfq, now)?;

        self.repo.update_rfq_status(tenant, id, RfqStatus::Sent, now).await?;
        rfq.status = RfqStatus::Sent;
        rfq.updated_at = now;
        Ok(rfq)
    }

    pub async fn delete(&self, tenant: &TenantId, actor: &Principal, id: Uuid) -> ServiceResult<()> {
        let rfq = self.load(tenant, id).await?;
        ensure(can_mutate_rfq(&rfq, actor), "only the creator may delete an RFQ")?;
        if !self.repo.delete_rfq(tenant, id).await? {
            return Err(ServiceError::NotFound("RFQ"));
        }
        Ok(())
    }

    /// Replace the assignment list. Every user must exist in the tenant.
    pub async fn set_assignees(
        &self,
        tenant: &TenantId,
        actor: &Principal,
        id: Uuid,
        users: &[Uuid],
    ) -> ServiceResult<RfqView> {
        let rfq = self.load(tenant, id).await?;
        ensure(can_mutate_rfq(&rfq, actor), "only the creator may assign an RFQ")?;
        let assignees = self.check_assignees(tenant, users).await?;
        self.repo.set_rfq_assignees(tenant, id, &assignees).await?;
        let rfq = heal_rfq(self.repo.as_ref(), tenant, rfq, self.clock.now()).await?;
        Ok(RfqView { rfq, assignees })
    }

    async fn load(&self, tenant: &TenantId, id: Uuid) -> ServiceResult<Rfq> {
        self.repo.get_rfq(tenant, id).await?.ok_or(ServiceError::NotFound("RFQ"))
    }

    async fn check_assignees(&self, tenant: &TenantId, users: &[Uuid]) -> ServiceResult<Vec<Uuid>> {
        let wanted: Vec<Uuid> = users.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        if wanted.is_empty() {
            return Ok(wanted);
        }
        let found: BTreeSet<Uuid> = self.repo.find_users(tenant, &wanted).await?.into_iter().map(|u| u.id).collect();
        match wanted.iter().find(|id| !found.contains(id)) {
            Some(missing) => Err(ServiceError::InvalidAssignee(*missing)),
            None => Ok(wanted),
        }
    }
}

fn check_dates(open_date: DateTime<Utc>, close_date: DateTime<Utc>) -> ServiceResult<()> {
    if close_date < open_date {
        Err(ServiceError::Validation("close_date must not be before open_date".to_string()))
    } else {
        Ok(())
    }
}
