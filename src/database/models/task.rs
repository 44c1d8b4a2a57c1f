use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UnknownStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Submitted,
    Deleted,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Submitted => "submitted",
            TaskStatus::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Result<Self, UnknownStatus> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "submitted" => Ok(TaskStatus::Submitted),
            "deleted" => Ok(TaskStatus::Deleted),
            other => Err(UnknownStatus { kind: "task", value: other.to_string() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenderTask {
    pub id: Uuid,
    pub tender_id: Uuid,
    pub title: String,
    pub description: String,
    pub assignee_id: Uuid,
    pub status: TaskStatus,
    pub file_ref: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenderTask {
    pub fn new(
        tender_id: Uuid,
        title: impl Into<String>,
        description: impl Into<String>,
        assignee_id: Uuid,
        due_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tender_id,
            title: title.into(),
            description: description.into(),
            assignee_id,
            status: TaskStatus::Pending,
            file_ref: None,
            due_date,
            submitted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a submitted file. Status, file and timestamp always move together.
    pub fn mark_submitted(&mut self, file_ref: String, now: DateTime<Utc>) {
        self.file_ref = Some(file_ref);
        self.submitted_at = Some(now);
        self.status = TaskStatus::Submitted;
        self.updated_at = now;
    }

    /// Drop the submitted file and fall back to pending. Returns the old file reference.
    pub fn clear_submission(&mut self, now: DateTime<Utc>) -> Option<String> {
        let previous = self.file_ref.take();
        self.submitted_at = None;
        self.status = TaskStatus::Pending;
        self.updated_at = now;
        previous
    }

    /// `Submitted` iff both file and submission time are present
    pub fn submission_is_consistent(&self) -> bool {
        match self.status {
            TaskStatus::Submitted => self.file_ref.is_some() && self.submitted_at.is_some(),
            TaskStatus::Pending => self.file_ref.is_none() && self.submitted_at.is_none(),
            TaskStatus::Deleted => true,
        }
    }
}
