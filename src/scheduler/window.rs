// ABOUTME: Pure time-window evaluation for campaign schedules in named timezones
// ABOUTME: Decides start, stop, and resume eligibility from wall-clock arithmetic
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence

//! Time-window evaluation
//!
//! All decisions convert `now` to wall clock in the campaign's timezone and
//! compare naive local times. Windows whose end precedes their start roll
//! past midnight. A window opened more than thirty minutes ago is not
//! retroactively dialed; the grace exists so a restarted process can pick
//! up windows it just missed.
//!
//! DST transitions inside a window get best-effort wall-clock behavior; no
//! adjustment is attempted for skipped or repeated local hours.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::constants::defaults;
use crate::models::Schedule;

/// Whether a scheduled campaign should open its window now
///
/// True from the scheduled instant until thirty minutes after it, and never
/// at or past the end of the window.
#[must_use]
pub fn should_start(schedule: &Schedule, now: DateTime<Utc>) -> bool {
    let local = local_now(schedule, now);
    let start = schedule.scheduled_date.and_time(schedule.scheduled_time);
    let grace_end = start + Duration::minutes(defaults::START_GRACE_MINUTES);

    if local < start || local >= grace_end {
        return false;
    }

    match end_for_start(schedule, start) {
        Some(end) => local < end,
        None => true,
    }
}

/// Whether an active campaign's window has closed
///
/// Only meaningful when the schedule has an end time; outbound campaigns
/// always carry one.
#[must_use]
pub fn should_stop(schedule: &Schedule, now: DateTime<Utc>) -> bool {
    let local = local_now(schedule, now);
    let start = schedule.scheduled_date.and_time(schedule.scheduled_time);

    end_for_start(schedule, start).is_some_and(|end| local >= end)
}

/// Whether a parked campaign may resume inside today's window
///
/// Evaluated against today's start and end in the target timezone, so a
/// campaign parked at yesterday's close reopens at the same daily hour.
#[must_use]
pub fn can_resume_in_window(schedule: &Schedule, now: DateTime<Utc>) -> bool {
    let local = local_now(schedule, now);
    let start_today = local.date().and_time(schedule.scheduled_time);

    let Some(end_today) = end_for_start(schedule, start_today) else {
        return false;
    };

    if start_today <= local && local < end_today {
        return true;
    }

    // A past-midnight window that opened yesterday is still in progress
    // during the early hours of today.
    if schedule.end_time.is_some_and(|e| e < schedule.scheduled_time) {
        let start_yesterday = start_today - Duration::days(1);
        if let Some(end_yesterday) = end_for_start(schedule, start_yesterday) {
            return start_yesterday <= local && local < end_yesterday;
        }
    }

    false
}

/// Resolve the schedule's timezone, degrading to UTC on unknown names
fn zone_of(schedule: &Schedule) -> Tz {
    schedule.timezone.parse().unwrap_or_else(|_| {
        warn!(
            timezone = %schedule.timezone,
            "unknown timezone, falling back to UTC"
        );
        Tz::UTC
    })
}

fn local_now(schedule: &Schedule, now: DateTime<Utc>) -> NaiveDateTime {
    now.with_timezone(&zone_of(schedule)).naive_local()
}

/// End instant for a window starting at `start`, rolling past midnight when
/// the end time precedes the start time
fn end_for_start(schedule: &Schedule, start: NaiveDateTime) -> Option<NaiveDateTime> {
    let end_time = schedule.end_time?;
    let mut end = start.date().and_time(end_time);
    if end < start {
        end += Duration::days(1);
    }
    Some(end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, TimeZone};

    fn schedule(date: &str, start: &str, end: Option<&str>, tz: &str) -> Schedule {
        Schedule {
            scheduled_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            scheduled_time: NaiveTime::parse_from_str(start, "%H:%M").unwrap(),
            end_time: end.map(|e| NaiveTime::parse_from_str(e, "%H:%M").unwrap()),
            timezone: tz.to_owned(),
        }
    }

    /// Interpret a wall-clock string in New York and return the UTC instant
    fn ny(datetime: &str) -> DateTime<Utc> {
        let naive =
            NaiveDateTime::parse_from_str(datetime, "%Y-%m-%d %H:%M").unwrap();
        chrono_tz::America::New_York
            .from_local_datetime(&naive)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_should_start_inside_grace() {
        let s = schedule("2026-06-15", "10:00", Some("18:00"), "America/New_York");
        assert!(!should_start(&s, ny("2026-06-15 09:59")));
        assert!(should_start(&s, ny("2026-06-15 10:00")));
        assert!(should_start(&s, ny("2026-06-15 10:29")));
        assert!(!should_start(&s, ny("2026-06-15 10:30")));
        assert!(!should_start(&s, ny("2026-06-15 14:00")));
    }

    #[test]
    fn test_should_start_respects_end() {
        // Window so short that the grace outlives it
        let s = schedule("2026-06-15", "10:00", Some("10:05"), "America/New_York");
        assert!(should_start(&s, ny("2026-06-15 10:04")));
        assert!(!should_start(&s, ny("2026-06-15 10:06")));
    }

    #[test]
    fn test_should_stop() {
        let s = schedule("2026-06-15", "10:00", Some("18:00"), "America/New_York");
        assert!(!should_stop(&s, ny("2026-06-15 17:59")));
        assert!(should_stop(&s, ny("2026-06-15 18:00")));
        assert!(should_stop(&s, ny("2026-06-16 09:00")));
    }

    #[test]
    fn test_should_stop_without_end_time() {
        let s = schedule("2026-06-15", "10:00", None, "America/New_York");
        assert!(!should_stop(&s, ny("2026-06-16 23:00")));
    }

    #[test]
    fn test_past_midnight_window() {
        let s = schedule("2026-06-15", "22:00", Some("02:00"), "America/New_York");
        assert!(!should_stop(&s, ny("2026-06-15 23:30")));
        assert!(!should_stop(&s, ny("2026-06-16 01:30")));
        // Start day evaluation: 02:00 the next day closes the window
        assert!(should_stop(&s, ny("2026-06-16 02:00")));
    }

    #[test]
    fn test_can_resume_on_later_day() {
        let s = schedule("2026-06-15", "10:00", Some("18:00"), "America/New_York");
        // Parked at close on the 15th; next day same window reopens
        assert!(!can_resume_in_window(&s, ny("2026-06-16 09:00")));
        assert!(can_resume_in_window(&s, ny("2026-06-16 10:00")));
        assert!(can_resume_in_window(&s, ny("2026-06-16 14:00")));
        assert!(!can_resume_in_window(&s, ny("2026-06-16 18:00")));
    }

    #[test]
    fn test_can_resume_past_midnight_early_hours() {
        let s = schedule("2026-06-15", "22:00", Some("02:00"), "America/New_York");
        // 01:00 is inside the window that opened yesterday at 22:00
        assert!(can_resume_in_window(&s, ny("2026-06-17 01:00")));
        assert!(can_resume_in_window(&s, ny("2026-06-17 23:00")));
        assert!(!can_resume_in_window(&s, ny("2026-06-17 12:00")));
    }

    #[test]
    fn test_unknown_timezone_falls_back_to_utc() {
        let s = schedule("2026-06-15", "10:00", Some("18:00"), "Mars/Olympus_Mons");
        let utc_noon = Utc.with_ymd_and_hms(2026, 6, 15, 10, 5, 0).unwrap();
        assert!(should_start(&s, utc_noon));
    }
}
