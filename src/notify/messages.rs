//! Subject and body composition for every notification the crate sends.

use chrono::{DateTime, Utc};

use super::OutboundMessage;
use crate::database::models::{Tender, TenderTask};

fn due_label(due: Option<DateTime<Utc>>) -> String {
    match due {
        Some(d) => d.format("%Y-%m-%d %H:%M UTC").to_string(),
        None => "no due date".to_string(),
    }
}

pub fn task_assigned(to: &str, tender: &Tender, task: &TenderTask) -> OutboundMessage {
    OutboundMessage {
        to: to.to_string(),
        subject: format!("New task assigned: {}", task.title),
        body: format!(
            "You have been assigned \"{}\" on tender \"{}\".\nDue: {}\n\n{}",
            task.title,
            tender.title,
            due_label(task.due_date),
            task.description
        ),
    }
}

pub fn task_submitted(to: &str, tender: &Tender, task: &TenderTask) -> OutboundMessage {
    OutboundMessage {
        to: to.to_string(),
        subject: format!("Task submitted: {} ({})", task.title, tender.title),
        body: format!(
            "A file was submitted for \"{}\" on tender \"{}\" at {}.",
            task.title,
            tender.title,
            due_label(task.submitted_at)
        ),
    }
}

/// One digest for one recipient and one tender, listing every matched task
pub fn task_digest(to: &str, tier_label: &str, tender: &Tender, tasks: &[&TenderTask]) -> OutboundMessage {
    let mut body = format!(
        "The following tasks on tender \"{}\" are {}:\n\n",
        tender.title, tier_label
    );
    for task in tasks {
        body.push_str(&format!("- {} (due {})\n", task.title, due_label(task.due_date)));
    }
    OutboundMessage {
        to: to.to_string(),
        subject: format!("Reminder: {} task(s) {} on {}", tasks.len(), tier_label, tender.title),
        body,
    }
}

pub fn deadline_reminder(to: &str, tender: &Tender, now: DateTime<Utc>) -> OutboundMessage {
    let passed = tender.deadline.is_some_and(|d| d < now);
    let subject = if passed {
        format!("Tender deadline passed: {}", tender.title)
    } else {
        format!("Tender deadline approaching: {}", tender.title)
    };
    OutboundMessage {
        to: to.to_string(),
        subject,
        body: format!(
            "Tender \"{}\" has its deadline at {}. Review the submitted tasks and resolve it.",
            tender.title,
            due_label(tender.deadline)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::TenderStatus;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    #[test]
    fn digest_lists_every_task() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let tender = Tender::new("Office fit-out", "", None, TenderStatus::Active, Uuid::new_v4(), now);
        let a = TenderTask::new(tender.id, "Electrical", "", Uuid::new_v4(), Some(now + Duration::hours(2)), now);
        let b = TenderTask::new(tender.id, "Flooring", "", a.assignee_id, None, now);

        let msg = task_digest("x@example.com", "due within 24 hours", &tender, &[&a, &b]);
        assert_eq!(msg.subject, "Reminder: 2 task(s) due within 24 hours on Office fit-out");
        assert!(msg.body.contains("- Electrical (due 2025-03-01 11:00 UTC)"));
        assert!(msg.body.contains("- Flooring (due no due date)"));
    }

    #[test]
    fn deadline_subject_depends_on_time() {
        let now = Utc::now();
        let mut tender = Tender::new("Catering", "", Some(now + Duration::hours(3)), TenderStatus::Active, Uuid::new_v4(), now);
        assert!(deadline_reminder("c@example.com", &tender, now).subject.contains("approaching"));
        tender.deadline = Some(now - Duration::hours(3));
        assert!(deadline_reminder("c@example.com", &tender, now).subject.contains("passed"));
    }
}
