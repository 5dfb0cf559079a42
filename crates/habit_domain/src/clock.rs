use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};

/// Time source injected into the service so date arithmetic stays
/// deterministic. "Today" is whatever calendar date the clock reports;
/// embedders wanting local-day semantics supply their own implementation.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// Wall-clock time at minute precision, as recorded on log entries.
    fn time_of_day(&self) -> NaiveTime {
        let now = self.now().time();
        NaiveTime::from_hms_opt(now.hour(), now.minute(), 0).unwrap_or(now)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a fixed instant, for tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: DateTime<Utc>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    /// Noon UTC on the given date.
    pub fn on_date(date: NaiveDate) -> Self {
        let noon = date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default());
        Self {
            now: Utc.from_utc_datetime(&noon),
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_reports_its_date() {
        let date = NaiveDate::from_ymd_opt(2025, 11, 7).expect("date");
        let clock = FixedClock::on_date(date);
        assert_eq!(clock.today(), date);
    }

    #[test]
    fn time_of_day_truncates_to_minutes() {
        let instant = Utc
            .with_ymd_and_hms(2025, 11, 7, 21, 41, 59)
            .single()
            .expect("instant");
        let clock = FixedClock::at(instant);
        assert_eq!(
            clock.time_of_day(),
            NaiveTime::from_hms_opt(21, 41, 0).expect("time")
        );
    }
}
