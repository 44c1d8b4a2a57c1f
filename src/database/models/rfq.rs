use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UnknownStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RfqStatus {
    Active,
    Sent,
    Closed,
}

impl RfqStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RfqStatus::Active => "active",
            RfqStatus::Sent => "sent",
            RfqStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Result<Self, UnknownStatus> {
        match s {
            "active" => Ok(RfqStatus::Active),
            "sent" => Ok(RfqStatus::Sent),
            "closed" => Ok(RfqStatus::Closed),
            other => Err(UnknownStatus { kind: "rfq", value: other.to_string() }),
        }
    }
}

/// One requested line on a request for quotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfqItem {
    pub description: String,
    pub quantity: f64,
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rfq {
    pub id: Uuid,
    pub subject: String,
    pub sender_address: String,
    pub items: Vec<RfqItem>,
    pub open_date: DateTime<Utc>,
    pub close_date: DateTime<Utc>,
    pub status: RfqStatus,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rfq {
    pub fn new(
        subject: impl Into<String>,
        sender_address: impl Into<String>,
        items: Vec<RfqItem>,
        open_date: DateTime<Utc>,
        close_date: DateTime<Utc>,
        created_by: Uuid,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject: subject.into(),
            sender_address: sender_address.into(),
            items,
            open_date,
            close_date,
            status: RfqStatus::Active,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}
