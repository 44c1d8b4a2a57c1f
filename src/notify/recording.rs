use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{DeliveryError, NotificationSender, OutboundMessage};
use crate::types::TenantId;

/// Captures messages in memory. Can be told to reject particular recipients
/// or to report a tenant as unconfigured.
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(TenantId, OutboundMessage)>>,
    failing: Mutex<HashSet<String>>,
    unconfigured: Mutex<HashSet<TenantId>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send to this address returns a transport error
    pub fn fail_for(&self, address: &str) {
        lock(&self.failing).insert(address.to_string());
    }

    pub fn unconfigure(&self, tenant: &TenantId) {
        lock(&self.unconfigured).insert(tenant.clone());
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        lock(&self.sent).iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn sent_to(&self, address: &str) -> Vec<OutboundMessage> {
        lock(&self.sent).iter().filter(|(_, m)| m.to == address).map(|(_, m)| m.clone()).collect()
    }

    pub fn clear(&self) {
        lock(&self.sent).clear();
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(&self, tenant: &TenantId, message: &OutboundMessage) -> Result<(), DeliveryError> {
        if lock(&self.failing).contains(&message.to) {
            return Err(DeliveryError::Transport(format!("rejected recipient {}", message.to)));
        }
        lock(&self.sent).push((tenant.clone(), message.clone()));
        Ok(())
    }

    fn is_configured(&self, tenant: &TenantId) -> bool {
        !lock(&self.unconfigured).contains(tenant)
    }
}
