use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use uuid::Uuid;

use super::guard::SingleFlight;
use super::tier::{ReminderTier, SweepJob};
use super::{SchedulerConfig, SweepError, SweepReport};
use crate::config::SchedulerSettings;
use crate::database::models::{TaskStatus, Tender, TenderStatus, TenderTask};
use crate::database::{Repository, TaskQuery, TenderQuery};
use crate::notify::{messages, send_best_effort, NotificationSender};
use crate::types::{SharedClock, TenantId};

/// Reminder and force-close sweeps for one tenant
pub struct ReminderScheduler {
    tenant: TenantId,
    settings: SchedulerSettings,
    repo: Arc<dyn Repository>,
    sender: Arc<dyn NotificationSender>,
    clock: SharedClock,
    imminent: SingleFlight,
    upcoming: SingleFlight,
    long_range: SingleFlight,
    deadline: SingleFlight,
    force_close: SingleFlight,
}

impl ReminderScheduler {
    pub fn new(
        config: SchedulerConfig,
        repo: Arc<dyn Repository>,
        sender: Arc<dyn NotificationSender>,
        clock: SharedClock,
    ) -> Self {
        Self {
            tenant: config.tenant,
            settings: config.settings,
            repo,
            sender,
            clock,
            imminent: SingleFlight::new(),
            upcoming: SingleFlight::new(),
            long_range: SingleFlight::new(),
            deadline: SingleFlight::new(),
            force_close: SingleFlight::new(),
        }
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub(crate) fn flight(&self, job: SweepJob) -> &SingleFlight {
        match job {
            SweepJob::Tier(ReminderTier::Imminent) => &self.imminent,
            SweepJob::Tier(ReminderTier::Upcoming) => &self.upcoming,
            SweepJob::Tier(ReminderTier::LongRange) => &self.long_range,
            SweepJob::DeadlineReminder => &self.deadline,
            SweepJob::ForceClose => &self.force_close,
        }
    }

    /// Run one job now, unless a run of the same job is in progress
    pub async fn trigger(&self, job: SweepJob) -> Result<SweepReport, SweepError> {
        let Some(_running) = self.flight(job).try_acquire() else {
            return Err(SweepError::AlreadyRunning(job.as_str()));
        };
        let now = self.clock.now();
        match job {
            SweepJob::Tier(tier) => self.sweep_tier(tier, now).await,
            SweepJob::DeadlineReminder => self.sweep_deadlines(now).await,
            SweepJob::ForceClose => self.force_close(now).await,
        }
    }

    /// Select pending tasks due inside the tier window and send one digest per recipient per tender
    pub async fn sweep_tier(&self, tier: ReminderTier, now: DateTime<Utc>) -> Result<SweepReport, SweepError> {
        let mut report = SweepReport::new(SweepJob::Tier(tier));
        self.require_credentials()?;

        let open: HashMap<Uuid, Tender> = self
            .repo
            .find_tenders(&self.tenant, &TenderQuery::with_status(TenderStatus::Active))
            .await?
            .into_iter()
            .filter(|t| t.deadline.map_or(true, |d| d >= now))
            .map(|t| (t.id, t))
            .collect();
        if open.is_empty() {
            return Ok(report);
        }

        let (after, until) = tier.window(&self.settings, now);
        let query = TaskQuery {
            tender_ids: Some(open.keys().copied().collect()),
            status: Some(TaskStatus::Pending),
            due_after: Some(after),
            due_until: until,
            ..Default::default()
        };
        let tasks = self.repo.find_tasks(&self.tenant, &query).await?;
        report.matched = tasks.len();

        let assignee_ids: Vec<Uuid> = tasks.iter().map(|t| t.assignee_id).collect::<BTreeSet<_>>().into_iter().collect();
        let emails: HashMap<Uuid, String> = self
            .repo
            .find_users(&self.tenant, &assignee_ids)
            .await?
            .into_iter()
            .filter_map(|u| u.email.map(|e| (u.id, e)))
            .collect();

        let mut digests: BTreeMap<(&str, Uuid), Vec<&TenderTask>> = BTreeMap::new();
        for task in &tasks {
            match emails.get(&task.assignee_id) {
                Some(email) => digests.entry((email.as_str(), task.tender_id)).or_default().push(task),
                None => report.skipped_no_email += 1,
            }
        }

        for ((email, tender_id), items) in &digests {
            let Some(tender) = open.get(tender_id) else { continue };
            let message = messages::task_digest(email, tier.label(), tender, items);
            report.digests += 1;
            if send_best_effort(self.sender.as_ref(), &self.tenant, &message).await {
                report.delivered += 1;
            } else {
                report.failed += 1;
            }
        }

        tracing::info!(
            tenant = %self.tenant,
            tier = tier.as_str(),
            matched = report.matched,
            digests = report.digests,
            failed = report.failed,
            skipped_no_email = report.skipped_no_email,
            "Reminder sweep finished"
        );
        Ok(report)
    }

    /// One reminder to the creator of each active tender whose deadline is near or just passed
    pub async fn sweep_deadlines(&self, now: DateTime<Utc>) -> Result<SweepReport, SweepError> {
        let mut report = SweepReport::new(SweepJob::DeadlineReminder);
        self.require_credentials()?;

        let query = TenderQuery {
            status: Some(TenderStatus::Active),
            deadline_from: Some(now - Duration::hours(self.settings.deadline_lookback_hours)),
            deadline_to: Some(now + Duration::hours(self.settings.deadline_lookahead_hours)),
            ..Default::default()
        };
        let tenders = self.repo.find_tenders(&self.tenant, &query).await?;
        report.matched = tenders.len();

        let creator_ids: Vec<Uuid> = tenders.iter().map(|t| t.created_by).collect::<BTreeSet<_>>().into_iter().collect();
        let emails: HashMap<Uuid, String> = self
            .repo
            .find_users(&self.tenant, &creator_ids)
            .await?
            .into_iter()
            .filter_map(|u| u.email.map(|e| (u.id, e)))
            .collect();

        for tender in &tenders {
            let Some(email) = emails.get(&tender.created_by) else {
                report.skipped_no_email += 1;
                continue;
            };
            report.digests += 1;
            let message = messages::deadline_reminder(email, tender, now);
            if send_best_effort(self.sender.as_ref(), &self.tenant, &message).await {
                report.delivered += 1;
            } else {
                report.failed += 1;
            }
        }

        tracing::info!(
            tenant = %self.tenant,
            matched = report.matched,
            delivered = report.delivered,
            failed = report.failed,
            "Deadline reminder sweep finished"
        );
        Ok(report)
    }

    /// Close every active tender and RFQ whose deadline has passed, read or not
    pub async fn force_close(&self, now: DateTime<Utc>) -> Result<SweepReport, SweepError> {
        let mut report = SweepReport::new(SweepJob::ForceClose);
        report.closed_tenders = self.repo.close_expired_tenders(&self.tenant, now).await?;
        report.closed_rfqs = self.repo.close_expired_rfqs(&self.tenant, now).await?;
        if report.closed_tenders + report.closed_rfqs > 0 {
            tracing::info!(
                "Force-closed {} tender(s) and {} RFQ(s) in {}",
                report.closed_tenders,
                report.closed_rfqs,
                self.tenant
            );
        }
        Ok(report)
    }

    fn require_credentials(&self) -> Result<(), SweepError> {
        if self.sender.is_configured(&self.tenant) {
            Ok(())
        } else {
            let err = SweepError::ConfigurationMissing(self.tenant.clone());
            tracing::warn!("{}; skipping sweep", err);
            Err(err)
        }
    }

    /// A scheduled tick. The daily long-range run also sends deadline reminders and force-closes.
    async fn tick(&self, job: SweepJob) {
        let chained: &[SweepJob] = match job {
            SweepJob::Tier(ReminderTier::LongRange) => &[
                SweepJob::Tier(ReminderTier::LongRange),
                SweepJob::DeadlineReminder,
                SweepJob::ForceClose,
            ],
            _ => std::slice::from_ref(&job),
        };
        for &step in chained {
            match self.trigger(step).await {
                Ok(_) => {}
                Err(SweepError::AlreadyRunning(name)) => {
                    tracing::debug!("Skipping {} tick for {}: previous run still in progress", name, self.tenant);
                }
                // Already logged as a warning
                Err(SweepError::ConfigurationMissing(_)) => {}
                Err(e) => tracing::error!("{} sweep failed for {}: {}", step.as_str(), self.tenant, e),
            }
        }
    }

    /// Start one interval loop per job. Force close runs once at startup; the rest wait a full period.
    pub fn spawn(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let mut loops: Vec<(SweepJob, u64, bool)> = ReminderTier::ALL
            .iter()
            .map(|&tier| (SweepJob::Tier(tier), tier.interval_secs(&self.settings), false))
            .collect();
        loops.push((SweepJob::ForceClose, self.settings.force_close_interval_secs, true));

        tracing::info!("Starting reminder scheduler for tenant {}", self.tenant);
        loops
            .into_iter()
            .map(|(job, secs, immediate)| {
                let scheduler = Arc::clone(self);
                let period = StdDuration::from_secs(secs.max(1));
                let start = if immediate { Instant::now() } else { Instant::now() + period };
                tokio::spawn(async move {
                    let mut ticker = time::interval_at(start, period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    loop {
                        ticker.tick().await;
                        scheduler.tick(job).await;
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::UserAccount;
    use crate::database::MemoryRepository;
    use crate::notify::RecordingSender;
    use crate::types::{FixedClock, Role};

    struct Fixture {
        repo: Arc<MemoryRepository>,
        sender: Arc<RecordingSender>,
        scheduler: Arc<ReminderScheduler>,
        tenant: TenantId,
        now: DateTime<Utc>,
    }

    fn fixture() -> Fixture {
        let now = Utc::now();
        let tenant = TenantId::new("acme");
        let repo = Arc::new(MemoryRepository::new());
        let sender = Arc::new(RecordingSender::new());
        let scheduler = Arc::new(ReminderScheduler::new(
            SchedulerConfig { tenant: tenant.clone(), settings: SchedulerSettings::defaults() },
            repo.clone(),
            sender.clone(),
            Arc::new(FixedClock(now)),
        ));
        Fixture { repo, sender, scheduler, tenant, now }
    }

    async fn user(f: &Fixture, email: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        f.repo
            .insert_user(&f.tenant, UserAccount { id, name: "U".to_string(), email: email.map(str::to_string), role: Role::Member })
            .await;
        id
    }

    async fn tender(f: &Fixture, deadline: Option<DateTime<Utc>>, creator: Uuid) -> Tender {
        let tender = Tender::new("Fit-out", "", deadline, TenderStatus::Active, creator, f.now);
        f.repo.save_tender(&f.tenant, &tender).await.unwrap();
        tender
    }

    async fn task(f: &Fixture, tender: &Tender, assignee: Uuid, due_in: Duration) -> TenderTask {
        let task = TenderTask::new(tender.id, format!("Task due {}h", due_in.num_hours()), "", assignee, Some(f.now + due_in), f.now);
        f.repo.save_task(&f.tenant, &task).await.unwrap();
        task
    }

    #[tokio::test]
    async fn task_due_in_twelve_hours_is_imminent_only() {
        let f = fixture();
        let creator = user(&f, Some("owner@acme.test")).await;
        let u1 = user(&f, Some("u1@acme.test")).await;
        let t1 = tender(&f, Some(f.now + Duration::days(2)), creator).await;
        task(&f, &t1, u1, Duration::hours(12)).await;

        let imminent = f.scheduler.sweep_tier(ReminderTier::Imminent, f.now).await.unwrap();
        let upcoming = f.scheduler.sweep_tier(ReminderTier::Upcoming, f.now).await.unwrap();

        assert_eq!(imminent.matched, 1);
        assert_eq!(imminent.delivered, 1);
        assert_eq!(upcoming.matched, 0);
        assert_eq!(f.sender.sent_to("u1@acme.test").len(), 1);
    }

    #[tokio::test]
    async fn window_edges_are_lower_exclusive_upper_inclusive() {
        let f = fixture();
        let creator = user(&f, None).await;
        let u1 = user(&f, Some("u1@acme.test")).await;
        let t = tender(&f, None, creator).await;
        task(&f, &t, u1, Duration::hours(24)).await;

        let imminent = f.scheduler.sweep_tier(ReminderTier::Imminent, f.now).await.unwrap();
        let upcoming = f.scheduler.sweep_tier(ReminderTier::Upcoming, f.now).await.unwrap();
        assert_eq!((imminent.matched, upcoming.matched), (1, 0));
    }

    #[tokio::test]
    async fn three_tasks_one_digest() {
        let f = fixture();
        let creator = user(&f, None).await;
        let u1 = user(&f, Some("u1@acme.test")).await;
        let t = tender(&f, Some(f.now + Duration::days(30)), creator).await;
        for h in [30, 50, 70] {
            task(&f, &t, u1, Duration::hours(h)).await;
        }

        let report = f.scheduler.sweep_tier(ReminderTier::Upcoming, f.now).await.unwrap();
        assert_eq!(report.matched, 3);
        assert_eq!(report.digests, 1);

        let sent = f.sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body.lines().filter(|l| l.starts_with("- ")).count(), 3);
    }

    #[tokio::test]
    async fn separate_tenders_get_separate_digests() {
        let f = fixture();
        let creator = user(&f, None).await;
        let u1 = user(&f, Some("u1@acme.test")).await;
        let a = tender(&f, None, creator).await;
        let b = tender(&f, None, creator).await;
        task(&f, &a, u1, Duration::hours(2)).await;
        task(&f, &b, u1, Duration::hours(3)).await;

        let report = f.scheduler.sweep_tier(ReminderTier::Imminent, f.now).await.unwrap();
        assert_eq!(report.digests, 2);
    }

    #[tokio::test]
    async fn skips_closed_or_expired_tenders_submitted_tasks_and_missing_emails() {
        let f = fixture();
        let creator = user(&f, None).await;
        let u1 = user(&f, Some("u1@acme.test")).await;
        let no_mail = user(&f, None).await;

        let expired = tender(&f, Some(f.now - Duration::hours(1)), creator).await;
        task(&f, &expired, u1, Duration::hours(2)).await;

        let draft = Tender::new("Draft", "", None, TenderStatus::Draft, creator, f.now);
        f.repo.save_tender(&f.tenant, &draft).await.unwrap();
        task(&f, &draft, u1, Duration::hours(2)).await;

        let live = tender(&f, None, creator).await;
        let mut done = task(&f, &live, u1, Duration::hours(2)).await;
        done.mark_submitted("tasks/x/done.pdf".to_string(), f.now);
        f.repo.save_task(&f.tenant, &done).await.unwrap();
        task(&f, &live, no_mail, Duration::hours(2)).await;

        let report = f.scheduler.sweep_tier(ReminderTier::Imminent, f.now).await.unwrap();
        assert_eq!(report.matched, 1);
        assert_eq!(report.skipped_no_email, 1);
        assert_eq!(report.digests, 0);
        assert!(f.sender.sent().is_empty());
    }

    #[tokio::test]
    async fn one_failed_recipient_does_not_abort_the_sweep() {
        let f = fixture();
        let creator = user(&f, None).await;
        let u1 = user(&f, Some("u1@acme.test")).await;
        let u2 = user(&f, Some("u2@acme.test")).await;
        let t = tender(&f, None, creator).await;
        task(&f, &t, u1, Duration::hours(2)).await;
        task(&f, &t, u2, Duration::hours(2)).await;
        f.sender.fail_for("u1@acme.test");

        let report = f.scheduler.sweep_tier(ReminderTier::Imminent, f.now).await.unwrap();
        assert_eq!(report.digests, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(f.sender.sent_to("u2@acme.test").len(), 1);
    }

    #[tokio::test]
    async fn missing_credentials_stop_sweep_before_querying() {
        let f = fixture();
        f.sender.unconfigure(&f.tenant);
        let err = f.scheduler.sweep_tier(ReminderTier::Imminent, f.now).await.unwrap_err();
        assert!(matches!(err, SweepError::ConfigurationMissing(_)));
        assert!(matches!(
            f.scheduler.sweep_deadlines(f.now).await,
            Err(SweepError::ConfigurationMissing(_))
        ));

        // Force close needs no credentials
        assert!(f.scheduler.force_close(f.now).await.is_ok());
    }

    #[tokio::test]
    async fn deadline_reminder_goes_to_creator_inside_window() {
        let f = fixture();
        let creator = user(&f, Some("owner@acme.test")).await;
        tender(&f, Some(f.now + Duration::hours(6)), creator).await;
        tender(&f, Some(f.now - Duration::days(2)), creator).await;
        tender(&f, Some(f.now + Duration::days(3)), creator).await;
        tender(&f, Some(f.now - Duration::days(8)), creator).await;
        tender(&f, None, creator).await;

        let report = f.scheduler.sweep_deadlines(f.now).await.unwrap();
        assert_eq!(report.matched, 2);
        assert_eq!(f.sender.sent_to("owner@acme.test").len(), 2);
    }

    #[tokio::test]
    async fn force_close_closes_unread_expired_tenders() {
        let f = fixture();
        let creator = user(&f, None).await;
        let t2 = tender(&f, Some(f.now - Duration::hours(1)), creator).await;
        let open = tender(&f, Some(f.now + Duration::hours(1)), creator).await;

        let report = f.scheduler.trigger(SweepJob::ForceClose).await.unwrap();
        assert_eq!(report.closed_tenders, 1);

        let stored = f.repo.get_tender(&f.tenant, t2.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TenderStatus::Closed);
        let untouched = f.repo.get_tender(&f.tenant, open.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, TenderStatus::Active);
    }

    #[tokio::test]
    async fn trigger_rejects_concurrent_run_of_same_job() {
        let f = fixture();
        let job = SweepJob::Tier(ReminderTier::Imminent);
        let held = f.scheduler.flight(job).try_acquire();
        assert!(held.is_some());

        assert!(matches!(f.scheduler.trigger(job).await, Err(SweepError::AlreadyRunning("imminent"))));
        // Other jobs are independent
        assert!(f.scheduler.trigger(SweepJob::Tier(ReminderTier::Upcoming)).await.is_ok());

        drop(held);
        assert!(f.scheduler.trigger(job).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_loop_force_closes_on_startup() {
        let f = fixture();
        let creator = user(&f, None).await;
        let t = tender(&f, Some(f.now - Duration::hours(1)), creator).await;

        let handles = f.scheduler.spawn();
        assert_eq!(handles.len(), 4);
        tokio::time::sleep(StdDuration::from_millis(10)).await;

        let stored = f.repo.get_tender(&f.tenant, t.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TenderStatus::Closed);
        for handle in handles {
            handle.abort();
        }
    }
}
