use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SchedulerSettings;

/// Due-date bands swept by the reminder loops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReminderTier {
    Imminent,
    Upcoming,
    LongRange,
}

impl ReminderTier {
    pub const ALL: [ReminderTier; 3] = [ReminderTier::Imminent, ReminderTier::Upcoming, ReminderTier::LongRange];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderTier::Imminent => "imminent",
            ReminderTier::Upcoming => "upcoming",
            ReminderTier::LongRange => "long-range",
        }
    }

    /// Phrase used in digest subjects
    pub fn label(&self) -> &'static str {
        match self {
            ReminderTier::Imminent => "due within 24 hours",
            ReminderTier::Upcoming => "due this week",
            ReminderTier::LongRange => "due later",
        }
    }

    /// Due-date window `(lower, upper]` at `now`. Long-range has no upper edge.
    pub fn window(&self, settings: &SchedulerSettings, now: DateTime<Utc>) -> (DateTime<Utc>, Option<DateTime<Utc>>) {
        let imminent = Duration::hours(settings.imminent_window_hours);
        let upcoming = Duration::hours(settings.upcoming_window_hours);
        match self {
            ReminderTier::Imminent => (now, Some(now + imminent)),
            ReminderTier::Upcoming => (now + imminent, Some(now + upcoming)),
            ReminderTier::LongRange => (now + upcoming, None),
        }
    }

    pub fn interval_secs(&self, settings: &SchedulerSettings) -> u64 {
        match self {
            ReminderTier::Imminent => settings.imminent_interval_secs,
            ReminderTier::Upcoming => settings.upcoming_interval_secs,
            ReminderTier::LongRange => settings.long_range_interval_secs,
        }
    }
}

/// Anything the scheduler can run, by itself or on demand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SweepJob {
    Tier(ReminderTier),
    DeadlineReminder,
    ForceClose,
}

impl SweepJob {
    pub fn as_str(&self) -> &'static str {
        match self {
            SweepJob::Tier(tier) => tier.as_str(),
            SweepJob::DeadlineReminder => "deadline",
            SweepJob::ForceClose => "force-close",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "imminent" => Some(SweepJob::Tier(ReminderTier::Imminent)),
            "upcoming" => Some(SweepJob::Tier(ReminderTier::Upcoming)),
            "long-range" | "long_range" => Some(SweepJob::Tier(ReminderTier::LongRange)),
            "deadline" => Some(SweepJob::DeadlineReminder),
            "force-close" | "force_close" => Some(SweepJob::ForceClose),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_tile_the_future() {
        let settings = SchedulerSettings::defaults();
        let now = Utc::now();
        let (i_lo, i_hi) = ReminderTier::Imminent.window(&settings, now);
        let (u_lo, u_hi) = ReminderTier::Upcoming.window(&settings, now);
        let (l_lo, l_hi) = ReminderTier::LongRange.window(&settings, now);

        assert_eq!(i_lo, now);
        assert_eq!(i_hi, Some(u_lo));
        assert_eq!(u_hi, Some(l_lo));
        assert_eq!(l_lo, now + Duration::days(7));
        assert!(l_hi.is_none());
    }

    #[test]
    fn job_names_round_trip() {
        for name in ["imminent", "upcoming", "long-range", "deadline", "force-close"] {
            assert_eq!(SweepJob::parse(name).map(|j| j.as_str()), Some(name));
        }
        assert!(SweepJob::parse("hourly").is_none());
    }
}
