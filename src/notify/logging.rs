use async_trait::async_trait;

use super::{DeliveryError, NotificationSender, OutboundMessage};
use crate::types::TenantId;

/// Writes messages to the log instead of delivering them. Used when no SMTP host is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSender;

#[async_trait]
impl NotificationSender for LogSender {
    async fn send(&self, tenant: &TenantId, message: &OutboundMessage) -> Result<(), DeliveryError> {
        tracing::info!(
            tenant = %tenant,
            to = %message.to,
            subject = %message.subject,
            "Notification (log only)"
        );
        Ok(())
    }

    fn is_configured(&self, _tenant: &TenantId) -> bool {
        true
    }
}
