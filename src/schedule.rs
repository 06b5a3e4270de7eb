//! Digest scheduling: when a subscriber is due and when the next send
//! lands.
//!
//! Cadence thresholds are expressed in whole hours against the gap
//! since the last successful send. Monthly follows the calendar: its
//! threshold is the hour count of the current month, and advancing by
//! a month clamps to the shorter month's end (Jan 31 → Feb 29).

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, Timelike, Utc};

use crate::dates::elapsed_between;
use crate::model::{Cadence, Subscriber, SubscriberWithTopics};

/// Hour-of-day used when a subscriber has no preferred send time.
pub const DEFAULT_SEND_HOUR: u32 = 17;

fn default_send_time() -> NaiveTime {
    NaiveTime::from_hms_opt(DEFAULT_SEND_HOUR, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// The subscriber's preferred send time, falling back to the default.
pub fn effective_send_time(subscriber: &Subscriber) -> NaiveTime {
    subscriber
        .preferred_send_time
        .unwrap_or_else(default_send_time)
}

/// Days in the month `now` falls in.
pub fn days_in_month(now: DateTime<Utc>) -> i64 {
    let date = now.date_naive();
    let (next_year, next_month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    match (
        NaiveDate::from_ymd_opt(date.year(), date.month(), 1),
        NaiveDate::from_ymd_opt(next_year, next_month, 1),
    ) {
        (Some(first), Some(next_first)) => (next_first - first).num_days(),
        _ => 30,
    }
}

/// Hours that must elapse since the last send before a cadence is due.
pub fn cadence_threshold_hours(cadence: Cadence, now: DateTime<Utc>) -> i64 {
    match cadence {
        Cadence::Daily => 24,
        Cadence::Weekly => 7 * 24,
        Cadence::Monthly => days_in_month(now) * 24,
    }
}

/// Whether the subscriber's cadence gap has elapsed. A subscriber who
/// has never been sent a digest is always due. The threshold is
/// inclusive: exactly 24 elapsed hours makes a daily subscriber due.
pub fn is_due(subscriber: &Subscriber, now: DateTime<Utc>) -> bool {
    let Some(last_sent) = subscriber.last_sent else {
        return true;
    };
    let threshold = cadence_threshold_hours(subscriber.cadence, now);
    elapsed_between(now, last_sent).hours >= threshold
}

/// Whether `now` falls within an hour of the subscriber's preferred
/// send time. Hour distance does not wrap around midnight: 23:00
/// against a 00:00 preference is 23 hours apart, not one.
pub fn in_send_window(subscriber: &Subscriber, now: DateTime<Utc>) -> bool {
    let preferred = effective_send_time(subscriber);
    let diff = (now.hour() as i64 - preferred.hour() as i64).abs();
    diff <= 1
}

/// Subscribers who should receive a digest right now: cadence elapsed
/// and inside the send window. A subscriber following no topics is
/// never selected, even on their first send.
pub fn select_due(
    subscribers: Vec<SubscriberWithTopics>,
    now: DateTime<Utc>,
) -> Vec<SubscriberWithTopics> {
    subscribers
        .into_iter()
        .filter(|entry| {
            !entry.topics.is_empty()
                && is_due(&entry.subscriber, now)
                && in_send_window(&entry.subscriber, now)
        })
        .collect()
}

/// Next scheduled send: one cadence unit past the last send (or past
/// now when none), pinned to the preferred time of day with seconds
/// zeroed.
pub fn next_run_time(subscriber: &Subscriber, now: DateTime<Utc>) -> DateTime<Utc> {
    let base = subscriber.last_sent.unwrap_or(now);
    let advanced = match subscriber.cadence {
        Cadence::Daily => base + Duration::days(1),
        Cadence::Weekly => base + Duration::days(7),
        Cadence::Monthly => base.checked_add_months(Months::new(1)).unwrap_or(base),
    };

    let preferred = effective_send_time(subscriber);
    let pinned = NaiveTime::from_hms_opt(preferred.hour(), preferred.minute(), 0)
        .unwrap_or(NaiveTime::MIN);
    advanced.date_naive().and_time(pinned).and_utc()
}
