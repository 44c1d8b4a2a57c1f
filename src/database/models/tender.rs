use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UnknownStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenderStatus {
    Draft,
    Active,
    Closed,
    Cancelled,
}

impl TenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenderStatus::Draft => "draft",
            TenderStatus::Active => "active",
            TenderStatus::Closed => "closed",
            TenderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Result<Self, UnknownStatus> {
        match s {
            "draft" => Ok(TenderStatus::Draft),
            "active" => Ok(TenderStatus::Active),
            "closed" => Ok(TenderStatus::Closed),
            "cancelled" => Ok(TenderStatus::Cancelled),
            other => Err(UnknownStatus { kind: "tender", value: other.to_string() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tender {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub deadline: Option<DateTime<Utc>>,
    pub status: TenderStatus,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tender {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        deadline: Option<DateTime<Utc>>,
        status: TenderStatus,
        created_by: Uuid,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            deadline,
            status,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}
