//! Time-driven status rules for tenders and RFQs.
//!
//! The only automatic transition is `Active -> Closed` once the deadline (or
//! RFQ close date) is strictly in the past. Reads correct stale rows on the
//! way out; the scheduler's force-close sweep does the same for rows nobody
//! reads. Both writes set the same value from the same pure function of
//! `now`, so they can race without a lock.

use chrono::{DateTime, Utc};

use crate::database::models::{Rfq, RfqStatus, Tender, TenderStatus};
use crate::database::Repository;
use crate::services::error::{ServiceError, ServiceResult};
use crate::types::TenantId;

/// Status a tender should have at `now`
pub fn effective_tender_status(tender: &Tender, now: DateTime<Utc>) -> TenderStatus {
    match (tender.status, tender.deadline) {
        (TenderStatus::Active, Some(deadline)) if deadline < now => TenderStatus::Closed,
        (status, _) => status,
    }
}

/// Status an RFQ should have at `now`
pub fn effective_rfq_status(rfq: &Rfq, now: DateTime<Utc>) -> RfqStatus {
    if rfq.status == RfqStatus::Active && rfq.close_date < now {
        RfqStatus::Closed
    } else {
        rfq.status
    }
}

/// Validate an explicit status change requested by the creator.
///
/// `deadline` is the deadline the tender will have after the update.
pub fn check_tender_transition(
    from: TenderStatus,
    to: TenderStatus,
    deadline: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> ServiceResult<()> {
    use TenderStatus::*;

    let deadline_passed = deadline.is_some_and(|d| d < now);
    if matches!(to, Closed | Active) && deadline_passed {
        return Err(ServiceError::InvalidTransition(format!(
            "cannot mark tender {} after its deadline has passed",
            to.as_str()
        )));
    }

    let allowed = from == to
        || matches!(
            (from, to),
            (Draft, Active) | (Draft, Cancelled) | (Active, Closed) | (Active, Cancelled) | (Closed, Active)
        );
    if allowed {
        Ok(())
    } else {
        Err(ServiceError::InvalidTransition(format!(
            "tender cannot move from {} to {}",
            from.as_str(),
            to.as_str()
        )))
    }
}

/// An RFQ may be marked sent only while active and before its close date
pub fn check_rfq_send(rfq: &Rfq, now: DateTime<Utc>) -> ServiceResult<()> {
    if rfq.close_date < now {
        return Err(ServiceError::InvalidTransition(
            "cannot mark RFQ sent after its close date has passed".to_string(),
        ));
    }
    if rfq.status != RfqStatus::Active {
        return Err(ServiceError::InvalidTransition(format!(
            "RFQ cannot move from {} to sent",
            rfq.status.as_str()
        )));
    }
    Ok(())
}

/// Correct one tender's stored status if stale, returning the healed tender
pub async fn heal_tender(
    repo: &dyn Repository,
    tenant: &TenantId,
    mut tender: Tender,
    now: DateTime<Utc>,
) -> ServiceResult<Tender> {
    let effective = effective_tender_status(&tender, now);
    if effective != tender.status {
        tracing::debug!(
            "Self-heal tender {} in {}: {} -> {}",
            tender.id,
            tenant,
            tender.status.as_str(),
            effective.as_str()
        );
        repo.update_tender_status(tenant, tender.id, effective, now).await?;
        tender.status = effective;
        tender.updated_at = now;
    }
    Ok(tender)
}

pub async fn heal_tenders(
    repo: &dyn Repository,
    tenant: &TenantId,
    tenders: Vec<Tender>,
    now: DateTime<Utc>,
) -> ServiceResult<Vec<Tender>> {
    let mut healed = Vec::with_capacity(tenders.len());
    for tender in tenders {
        healed.push(heal_tender(repo, tenant, tender, now).await?);
    }
    Ok(healed)
}

pub async fn heal_rfq(
    repo: &dyn Repository,
    tenant: &TenantId,
    mut rfq: Rfq,
    now: DateTime<Utc>,
) -> ServiceResult<Rfq> {
    let effective = effective_rfq_status(&rfq, now);
    if effective != rfq.status {
        tracing::debug!("Self-heal RFQ {} in {}: {} -> {}", rfq.id, tenant, rfq.status.as_str(), effective.as_str());
        repo.update_rfq_status(tenant, rfq.id, effective, now).await?;
        rfq.status = effective;
        rfq.updated_at = now;
    }
    Ok(rfq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryRepository;
    use chrono::Duration;
    use uuid::Uuid;

    fn tender(status: TenderStatus, deadline: Option<DateTime<Utc>>) -> Tender {
        Tender::new("Cleaning services", "", deadline, status, Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn only_active_past_deadline_closes() {
        let now = Utc::now();
        let past = Some(now - Duration::minutes(1));
        let future = Some(now + Duration::minutes(1));

        assert_eq!(effective_tender_status(&tender(TenderStatus::Active, past), now), TenderStatus::Closed);
        assert_eq!(effective_tender_status(&tender(TenderStatus::Active, future), now), TenderStatus::Active);
        assert_eq!(effective_tender_status(&tender(TenderStatus::Active, None), now), TenderStatus::Active);
        assert_eq!(effective_tender_status(&tender(TenderStatus::Draft, past), now), TenderStatus::Draft);
        assert_eq!(effective_tender_status(&tender(TenderStatus::Cancelled, past), now), TenderStatus::Cancelled);
    }

    #[test]
    fn deadline_equal_to_now_is_still_open() {
        let now = Utc::now();
        assert_eq!(effective_tender_status(&tender(TenderStatus::Active, Some(now)), now), TenderStatus::Active);
    }

    #[test]
    fn resolving_after_deadline_is_rejected_even_when_closed() {
        let now = Utc::now();
        let past = Some(now - Duration::hours(1));
        for from in [TenderStatus::Active, TenderStatus::Closed] {
            let err = check_tender_transition(from, TenderStatus::Closed, past, now).unwrap_err();
            assert!(matches!(err, ServiceError::InvalidTransition(_)));
        }
        assert!(check_tender_transition(TenderStatus::Active, TenderStatus::Closed, Some(now + Duration::hours(1)), now).is_ok());
    }

    #[test]
    fn transition_table() {
        let now = Utc::now();
        let ok = |from, to| check_tender_transition(from, to, None, now).is_ok();
        assert!(ok(TenderStatus::Draft, TenderStatus::Active));
        assert!(ok(TenderStatus::Active, TenderStatus::Cancelled));
        assert!(ok(TenderStatus::Closed, TenderStatus::Active));
        assert!(!ok(TenderStatus::Cancelled, TenderStatus::Active));
        assert!(!ok(TenderStatus::Closed, TenderStatus::Draft));
        assert!(!ok(TenderStatus::Draft, TenderStatus::Closed));
    }

    #[tokio::test]
    async fn heal_persists_once_then_is_a_no_op() {
        let repo = MemoryRepository::new();
        let tenant = TenantId::new("acme");
        let now = Utc::now();
        let stale = tender(TenderStatus::Active, Some(now - Duration::hours(1)));
        repo.save_tender(&tenant, &stale).await.unwrap();
        let writes = repo.write_count();

        let healed = heal_tender(&repo, &tenant, stale.clone(), now).await.unwrap();
        assert_eq!(healed.status, TenderStatus::Closed);
        assert_eq!(repo.write_count(), writes + 1);

        let stored = repo.get_tender(&tenant, stale.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TenderStatus::Closed);

        heal_tender(&repo, &tenant, stored, now).await.unwrap();
        assert_eq!(repo.write_count(), writes + 1);
    }
}
