//! Who may see and change tenders, tasks and RFQs.

use uuid::Uuid;

use crate::database::models::{Rfq, Tender, TenderTask};
use crate::services::error::{ServiceError, ServiceResult};
use crate::types::Principal;

/// Elevated roles, the creator, or anyone assigned a task on the tender
pub fn can_view_tender(tender: &Tender, tasks: &[TenderTask], principal: &Principal) -> bool {
    principal.is_elevated()
        || tender.created_by == principal.user_id
        || tasks
            .iter()
            .any(|t| t.tender_id == tender.id && t.assignee_id == principal.user_id)
}

/// Only the creator changes tender or task metadata
pub fn can_mutate_tender(tender: &Tender, principal: &Principal) -> bool {
    tender.created_by == principal.user_id
}

/// The creator or the task's current assignee may upload or clear its file
pub fn can_submit_file(tender: &Tender, task: &TenderTask, principal: &Principal) -> bool {
    can_mutate_tender(tender, principal) || task.assignee_id == principal.user_id
}

/// Whether the principal sees every task on the tender, or only their own
pub fn sees_all_tasks(tender: &Tender, principal: &Principal) -> bool {
    principal.is_elevated() || tender.created_by == principal.user_id
}

/// A single task and its file: whoever sees all tasks, or that task's assignee
pub fn can_view_task(tender: &Tender, task: &TenderTask, principal: &Principal) -> bool {
    sees_all_tasks(tender, principal) || task.assignee_id == principal.user_id
}

pub fn can_view_rfq(rfq: &Rfq, assignees: &[Uuid], principal: &Principal) -> bool {
    principal.is_elevated() || rfq.created_by == principal.user_id || assignees.contains(&principal.user_id)
}

pub fn can_mutate_rfq(rfq: &Rfq, principal: &Principal) -> bool {
    rfq.created_by == principal.user_id
}

pub fn ensure(allowed: bool, reason: &'static str) -> ServiceResult<()> {
    if allowed {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::TenderStatus;
    use crate::types::Role;
    use chrono::Utc;

    fn member() -> Principal {
        Principal::new(Uuid::new_v4(), Role::Member)
    }

    #[test]
    fn view_rules() {
        let creator = member();
        let assignee = member();
        let stranger = member();
        let officer = Principal::new(Uuid::new_v4(), Role::ProcurementOfficer);

        let tender = Tender::new("Fleet", "", None, TenderStatus::Active, creator.user_id, Utc::now());
        let task = TenderTask::new(tender.id, "Fuel quote", "", assignee.user_id, None, Utc::now());
        let tasks = vec![task];

        assert!(can_view_tender(&tender, &tasks, &creator));
        assert!(can_view_tender(&tender, &tasks, &assignee));
        assert!(can_view_tender(&tender, &tasks, &officer));
        assert!(!can_view_tender(&tender, &tasks, &stranger));
    }

    #[test]
    fn assignees_see_only_their_own_task() {
        let creator = member();
        let first = member();
        let second = member();
        let admin = Principal::new(Uuid::new_v4(), Role::Admin);

        let tender = Tender::new("Fleet", "", None, TenderStatus::Active, creator.user_id, Utc::now());
        let task = TenderTask::new(tender.id, "Fuel quote", "", second.user_id, None, Utc::now());

        assert!(can_view_task(&tender, &task, &second));
        assert!(can_view_task(&tender, &task, &creator));
        assert!(can_view_task(&tender, &task, &admin));
        assert!(!can_view_task(&tender, &task, &first));
    }

    #[test]
    fn mutate_is_creator_only_but_files_allow_assignee() {
        let creator = member();
        let assignee = member();
        let admin = Principal::new(Uuid::new_v4(), Role::Admin);

        let tender = Tender::new("Fleet", "", None, TenderStatus::Active, creator.user_id, Utc::now());
        let task = TenderTask::new(tender.id, "Fuel quote", "", assignee.user_id, None, Utc::now());

        assert!(can_mutate_tender(&tender, &creator));
        assert!(!can_mutate_tender(&tender, &assignee));
        assert!(!can_mutate_tender(&tender, &admin));

        assert!(can_submit_file(&tender, &task, &creator));
        assert!(can_submit_file(&tender, &task, &assignee));
        assert!(!can_submit_file(&tender, &task, &admin));

        assert!(sees_all_tasks(&tender, &admin));
        assert!(!sees_all_tasks(&tender, &assignee));
    }
}
