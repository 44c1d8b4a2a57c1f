//! Outbound notifications.
//!
//! Delivery is best effort everywhere in the crate: a failed send is logged
//! and never fails the operation that triggered it.

pub mod logging;
pub mod messages;
pub mod recording;
pub mod smtp;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::TenantId;

pub use logging::LogSender;
pub use recording::RecordingSender;
pub use smtp::SmtpSender;

/// A fully composed message addressed to one recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("No mail credentials configured for tenant {0}")]
    NotConfigured(TenantId),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, tenant: &TenantId, message: &OutboundMessage) -> Result<(), DeliveryError>;

    /// Whether this sender holds credentials for the tenant
    fn is_configured(&self, tenant: &TenantId) -> bool;
}

/// Send and swallow the error. Returns whether delivery succeeded.
pub async fn send_best_effort(sender: &dyn NotificationSender, tenant: &TenantId, message: &OutboundMessage) -> bool {
    match sender.send(tenant, message).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Notification to {} in {} failed: {}", message.to, tenant, e);
            false
        }
    }
}
