//! Timestamp value object for immutable points in time.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Immutable point in time, always UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a timestamp from a DateTime<Utc>.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the inner DateTime.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Checks if this timestamp is before another.
    pub fn is_before(&self, other: &Timestamp) -> bool {
        self.0 < other.0
    }

    /// Checks if this timestamp is after another.
    pub fn is_after(&self, other: &Timestamp) -> bool {
        self.0 > other.0
    }

    /// Returns the duration from another timestamp to this one.
    ///
    /// Returns negative duration if other is after self.
    pub fn duration_since(&self, other: &Timestamp) -> Duration {
        self.0.signed_duration_since(other.0)
    }

    /// Creates a new timestamp by adding the specified number of days.
    ///
    /// Negative values subtract days.
    pub fn add_days(&self, days: i64) -> Self {
        Self(self.0 + Duration::days(days))
    }

    /// Creates a new timestamp by subtracting the specified number of days.
    pub fn minus_days(&self, days: i64) -> Self {
        Self(self.0 - Duration::days(days))
    }

    /// Creates a new timestamp by adding the specified number of seconds.
    pub fn plus_secs(&self, secs: u64) -> Self {
        Self(self.0 + Duration::seconds(secs as i64))
    }

    /// Creates a new timestamp by subtracting the specified number of seconds.
    pub fn minus_secs(&self, secs: u64) -> Self {
        Self(self.0 - Duration::seconds(secs as i64))
    }

    /// Creates a timestamp from Unix milliseconds.
    ///
    /// Payme transaction times are Unix-epoch milliseconds.
    pub fn from_unix_millis(millis: i64) -> Self {
        use chrono::TimeZone;
        Self(Utc.timestamp_millis_opt(millis).single().unwrap_or_default())
    }

    /// Returns the timestamp as Unix milliseconds.
    pub fn as_unix_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Returns the timestamp as Unix seconds.
    pub fn as_unix_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// Whole days until `other`, clamped at zero when `other` is in the past.
    pub fn days_until(&self, other: &Timestamp) -> i64 {
        other.duration_since(self).num_days().max(0)
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    /// RFC 3339, matching the serialized form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_now_creates_current_time() {
        let before = Utc::now();
        let ts = Timestamp::now();
        let after = Utc::now();

        assert!(ts.as_datetime() >= &before);
        assert!(ts.as_datetime() <= &after);
    }

    #[test]
    fn add_days_moves_forward() {
        let ts = Timestamp::now();
        let later = ts.add_days(30);
        assert!(later.is_after(&ts));
        assert_eq!(later.duration_since(&ts).num_days(), 30);
    }

    #[test]
    fn minus_days_moves_backward() {
        let ts = Timestamp::now();
        let earlier = ts.minus_days(3);
        assert!(earlier.is_before(&ts));
    }

    #[test]
    fn unix_millis_round_trip() {
        let ts = Timestamp::from_unix_millis(1_704_067_200_000);
        assert_eq!(ts.as_unix_millis(), 1_704_067_200_000);
    }

    #[test]
    fn days_until_clamps_to_zero_for_past() {
        let ts = Timestamp::now();
        let past = ts.minus_days(5);
        assert_eq!(ts.days_until(&past), 0);
    }

    #[test]
    fn days_until_counts_whole_days() {
        let ts = Timestamp::now();
        let future = ts.add_days(7);
        assert_eq!(ts.days_until(&future), 7);
    }

    #[test]
    fn display_is_rfc3339() {
        let ts = Timestamp::from_unix_millis(1_704_067_200_000);
        assert_eq!(format!("{}", ts), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn ordering_follows_time() {
        let earlier = Timestamp::now();
        let later = earlier.plus_secs(60);
        assert!(earlier < later);
    }
}
