use std::{
    fmt::Display,
    ops::{Add, Sub},
};

use chrono::Timelike;
use tokio::task_local;

use super::{Duration, Time};

task_local! {
    pub static FIXED_NOW: DateTime;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct DateTime {
    delegate: chrono::DateTime<chrono::Local>,
}

impl DateTime {
    fn new<T: chrono::TimeZone>(delegate: chrono::DateTime<T>) -> Self {
        Self {
            delegate: delegate.with_timezone(&chrono::Local),
        }
    }

    pub fn now() -> Self {
        FIXED_NOW
            .try_with(|t| *t)
            .unwrap_or_else(|_| chrono::Local::now().into())
    }

    pub fn from_iso(iso8601: &str) -> anyhow::Result<Self> {
        Ok(chrono::DateTime::parse_from_rfc3339(iso8601)?.into())
    }

    pub fn to_human_readable(&self) -> String {
        chrono_humanize::HumanTime::from(self.delegate).to_string()
    }

    pub fn hour(&self) -> u32 {
        self.delegate.hour()
    }

    pub fn at(&self, time: Time) -> anyhow::Result<Self> {
        let dt = self
            .delegate
            .with_time(time.delegate())
            .earliest()
            .ok_or_else(|| anyhow::anyhow!("Error combining time {:?} with date-time {:?}", time, self))?;

        Ok(dt.into())
    }

    /// Number of hours the calendar day of this instant has. 23 or 25 on
    /// DST-transition days, 24 otherwise.
    pub fn hours_in_day(&self) -> usize {
        let start = self
            .delegate
            .with_time(chrono::NaiveTime::MIN)
            .earliest()
            .unwrap_or(self.delegate);
        let next = start.checked_add_signed(chrono::Duration::days(1)).unwrap();
        let next_start = next.with_time(chrono::NaiveTime::MIN).earliest().unwrap_or(next);

        (next_start - start).num_hours() as usize
    }

    pub fn elapsed_since(&self, since: Self) -> Duration {
        Duration::new(self.delegate - since.delegate)
    }

    pub fn elapsed(&self) -> Duration {
        Self::now().elapsed_since(*self)
    }
}

impl Display for DateTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.delegate)
    }
}

impl<T: chrono::TimeZone> From<chrono::DateTime<T>> for DateTime {
    fn from(value: chrono::DateTime<T>) -> Self {
        Self::new(value)
    }
}

impl Add<Duration> for DateTime {
    type Output = DateTime;

    fn add(self, rhs: Duration) -> Self::Output {
        Self::new(self.delegate + rhs.into_delegate())
    }
}

impl Sub<Duration> for DateTime {
    type Output = DateTime;

    fn sub(self, rhs: Duration) -> Self::Output {
        Self::new(self.delegate - rhs.into_delegate())
    }
}

impl Sub<DateTime> for DateTime {
    type Output = Duration;

    fn sub(self, rhs: DateTime) -> Self::Output {
        Duration::new(self.delegate - rhs.delegate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combining_a_day_with_a_time_truncates_to_local_midnight() {
        use chrono::TimeZone;

        let dt: DateTime = chrono::Local.with_ymd_and_hms(2024, 1, 26, 13, 2, 37).unwrap().into();
        let midnight = dt.at(Time::at(0, 0).unwrap()).unwrap();

        let expected: DateTime = chrono::Local.with_ymd_and_hms(2024, 1, 26, 0, 0, 0).unwrap().into();
        assert_eq!(midnight, expected);
        assert_eq!(midnight.hour(), 0);
    }

    #[test]
    fn regular_day_has_24_hours() {
        let dt = DateTime::from_iso("2024-01-26T13:02:00+01:00").unwrap();
        assert_eq!(dt.hours_in_day(), 24);
    }

    #[tokio::test]
    async fn now_follows_fixed_clock() {
        let fixed = DateTime::from_iso("2023-12-15T00:03:00+01:00").unwrap();

        FIXED_NOW
            .scope(fixed, async {
                assert_eq!(DateTime::now(), fixed);
            })
            .await;
    }
}
