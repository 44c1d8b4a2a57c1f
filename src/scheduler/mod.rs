//! Recurring reminder sweeps.
//!
//! One [`ReminderScheduler`] per tenant, each holding the tenant it sends
//! for. Loops are plain `tokio::time::interval` tasks; nothing is persisted
//! between ticks.

pub mod guard;
pub mod reminder;
pub mod tier;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use thiserror::Error;

use crate::config::SchedulerSettings;
use crate::database::{DatabaseError, Repository};
use crate::notify::NotificationSender;
use crate::types::{SharedClock, TenantId};

pub use guard::SingleFlight;
pub use reminder::ReminderScheduler;
pub use tier::{ReminderTier, SweepJob};

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("No notification credentials configured for tenant {0}")]
    ConfigurationMissing(TenantId),

    #[error("The {0} sweep is already running")]
    AlreadyRunning(&'static str),

    #[error(transparent)]
    Repository(#[from] DatabaseError),
}

/// Outcome of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub job: String,
    /// Rows selected by the sweep query
    pub matched: usize,
    pub digests: usize,
    pub delivered: usize,
    pub failed: usize,
    pub skipped_no_email: usize,
    pub closed_tenders: u64,
    pub closed_rfqs: u64,
}

impl SweepReport {
    pub fn new(job: SweepJob) -> Self {
        Self { job: job.as_str().to_string(), ..Default::default() }
    }
}

/// Construction input for one tenant's scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tenant: TenantId,
    pub settings: SchedulerSettings,
}

/// Schedulers by tenant, shared between the background loops and the admin trigger
pub struct SchedulerRegistry {
    settings: SchedulerSettings,
    repo: Arc<dyn Repository>,
    sender: Arc<dyn NotificationSender>,
    clock: SharedClock,
    schedulers: RwLock<HashMap<TenantId, Arc<ReminderScheduler>>>,
}

impl SchedulerRegistry {
    pub fn new(
        settings: SchedulerSettings,
        repo: Arc<dyn Repository>,
        sender: Arc<dyn NotificationSender>,
        clock: SharedClock,
    ) -> Self {
        Self {
            settings,
            repo,
            sender,
            clock,
            schedulers: RwLock::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// The tenant's scheduler, created on first use
    pub fn for_tenant(&self, tenant: &TenantId) -> Arc<ReminderScheduler> {
        if let Some(existing) = self
            .schedulers
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(tenant)
        {
            return Arc::clone(existing);
        }

        let mut schedulers = self.schedulers.write().unwrap_or_else(|p| p.into_inner());
        let scheduler = schedulers.entry(tenant.clone()).or_insert_with(|| {
            Arc::new(ReminderScheduler::new(
                SchedulerConfig { tenant: tenant.clone(), settings: self.settings.clone() },
                Arc::clone(&self.repo),
                Arc::clone(&self.sender),
                Arc::clone(&self.clock),
            ))
        });
        Arc::clone(scheduler)
    }

    /// Start background loops for every tenant listed in the settings
    pub fn spawn_configured(&self) -> Vec<tokio::task::JoinHandle<()>> {
        if !self.settings.enabled {
            tracing::info!("Reminder scheduler disabled");
            return vec![];
        }
        let tenants = self.settings.tenants.clone();
        tenants
            .iter()
            .flat_map(|name| self.for_tenant(&TenantId::new(name.as_str())).spawn())
            .collect()
    }
}
