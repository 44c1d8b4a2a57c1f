use std::collections::BTreeMap;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{DeliveryError, NotificationSender, OutboundMessage};
use crate::config::{MailConfig, MailCredential};
use crate::types::TenantId;

/// SMTP delivery with per-tenant credentials over STARTTLS
#[derive(Debug, Clone)]
pub struct SmtpSender {
    host: String,
    port: u16,
    from: Mailbox,
    credentials: BTreeMap<String, MailCredential>,
}

impl SmtpSender {
    /// Returns `None` when no SMTP host is configured
    pub fn from_config(config: &MailConfig) -> Result<Option<Self>, DeliveryError> {
        let Some(host) = config.smtp_host.clone() else {
            return Ok(None);
        };
        let from: Mailbox = config
            .from_address
            .parse()
            .map_err(|e| DeliveryError::InvalidAddress(format!("{}: {}", config.from_address, e)))?;

        Ok(Some(Self {
            host,
            port: config.smtp_port,
            from,
            credentials: config.credentials.clone(),
        }))
    }

    fn build(&self, message: &OutboundMessage) -> Result<Message, DeliveryError> {
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| DeliveryError::InvalidAddress(format!("{}: {}", message.to, e)))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|e| DeliveryError::Transport(format!("Build email: {}", e)))
    }
}

#[async_trait]
impl NotificationSender for SmtpSender {
    async fn send(&self, tenant: &TenantId, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let credential = self
            .credentials
            .get(tenant.as_str())
            .ok_or_else(|| DeliveryError::NotConfigured(tenant.clone()))?;

        let email = self.build(message)?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
            .map_err(|e| DeliveryError::Transport(format!("SMTP relay: {}", e)))?
            .port(self.port)
            .credentials(Credentials::new(credential.username.clone(), credential.password.clone()))
            .build();

        mailer
            .send(email)
            .await
            .map_err(|e| DeliveryError::Transport(format!("SMTP send: {}", e)))?;

        tracing::info!("Email sent to {} for tenant {}", message.to, tenant);
        Ok(())
    }

    fn is_configured(&self, tenant: &TenantId) -> bool {
        self.credentials.contains_key(tenant.as_str())
    }
}
