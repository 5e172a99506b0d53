//! Same-day deduplication.
//!
//! "Today" is the calendar date in one configured reference timezone,
//! shared by every subscriber.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rainalert_core::NotificationJob;
use tracing::info;

/// True when `last_notified` falls on the same calendar day as `now` in `tz`.
pub fn already_notified_today(last_notified: Option<DateTime<Utc>>, now: DateTime<Utc>, tz: Tz) -> bool {
    match last_notified {
        Some(last) => last.with_timezone(&tz).date_naive() == now.with_timezone(&tz).date_naive(),
        None => false,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DedupFilter {
    tz: Tz,
}

impl DedupFilter {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Pass the job through unless the subscriber was already notified today.
    pub fn admit(
        &self,
        job: NotificationJob,
        last_notified: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<NotificationJob> {
        if already_notified_today(last_notified, now, self.tz) {
            info!(subscriber_id = %job.subscriber_id, "already notified today");
            return None;
        }
        Some(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Asia::Kolkata;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn job() -> NotificationJob {
        NotificationJob {
            subscriber_id: "s-1".into(),
            destination: "+919812345678".into(),
            message: "rain".into(),
        }
    }

    #[test]
    fn never_notified_passes() {
        assert!(!already_notified_today(None, utc(2026, 7, 14, 1, 30), Kolkata));
    }

    #[test]
    fn same_reference_day_is_dropped() {
        // 01:30 UTC = 07:00 IST; 17:00 UTC = 22:30 IST, same IST date.
        let last = utc(2026, 7, 14, 1, 30);
        let now = utc(2026, 7, 14, 17, 0);
        assert!(already_notified_today(Some(last), now, Kolkata));
    }

    #[test]
    fn day_boundary_follows_reference_timezone() {
        // 20:00 UTC on the 13th is already 01:30 IST on the 14th.
        let last = utc(2026, 7, 13, 20, 0);
        let now = utc(2026, 7, 14, 1, 30);
        assert!(already_notified_today(Some(last), now, Kolkata));
        // In UTC those are different days.
        assert!(!already_notified_today(Some(last), now, chrono_tz::UTC));
    }

    #[test]
    fn yesterday_passes() {
        let last = utc(2026, 7, 13, 1, 30);
        let now = utc(2026, 7, 14, 1, 30);
        assert!(!already_notified_today(Some(last), now, Kolkata));
    }

    #[test]
    fn admit_returns_job_unchanged() {
        let filter = DedupFilter::new(Kolkata);
        let now = utc(2026, 7, 14, 1, 30);
        assert_eq!(filter.admit(job(), None, now), Some(job()));
        assert_eq!(filter.admit(job(), Some(now), now), None);
    }
}
