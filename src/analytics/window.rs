use chrono::{DateTime, Datelike, Days, NaiveTime, SecondsFormat, TimeZone, Utc};

/// Time range covered by an analytics query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    /// Beginning of the window (inclusive)
    pub start: DateTime<Utc>,
    /// End of the window (inclusive)
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Window from Monday 00:00 UTC of the ISO week containing `now` up to `now`
    pub fn week_to_date(now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        let days_since_monday = u64::from(today.weekday().num_days_from_monday());
        let start = today
            .checked_sub_days(Days::new(days_since_monday))
            .unwrap_or(today)
            .and_time(NaiveTime::MIN);

        Self {
            start: Utc.from_utc_datetime(&start),
            end: now,
        }
    }

    /// Window covering the `length` preceding `now`
    pub fn trailing(now: DateTime<Utc>, length: chrono::Duration) -> Self {
        Self {
            start: now - length,
            end: now,
        }
    }

    /// Start of the window as expected by the analytics API
    pub fn start_param(&self) -> String {
        format_timestamp(self.start)
    }

    /// End of the window as expected by the analytics API
    pub fn end_param(&self) -> String {
        format_timestamp(self.end)
    }
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start_param(), self.end_param())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn week_starts_on_monday() {
        // Thursday
        let window = TimeWindow::week_to_date(at("2026-10-22T13:45:12Z"));
        assert_eq!(window.start_param(), "2026-10-19T00:00:00Z");
        assert_eq!(window.end_param(), "2026-10-22T13:45:12Z");

        // Sunday still belongs to the week started the previous Monday
        let window = TimeWindow::week_to_date(at("2026-10-25T23:59:59Z"));
        assert_eq!(window.start_param(), "2026-10-19T00:00:00Z");

        // Monday itself
        let window = TimeWindow::week_to_date(at("2026-10-19T00:00:01Z"));
        assert_eq!(window.start_param(), "2026-10-19T00:00:00Z");
    }

    #[test]
    fn week_across_year_boundary() {
        // 2027-01-01 is a Friday, ISO week 53 of 2026 started on Monday 2026-12-28
        let window = TimeWindow::week_to_date(at("2027-01-01T08:00:00Z"));
        assert_eq!(window.start_param(), "2026-12-28T00:00:00Z");
    }

    #[test]
    fn week_uses_utc_date() {
        // Monday 01:30 at +02:00 is still Sunday in UTC
        let now = DateTime::parse_from_rfc3339("2026-10-19T01:30:00+02:00")
            .unwrap()
            .with_timezone(&Utc);
        let window = TimeWindow::week_to_date(now);
        assert_eq!(window.start_param(), "2026-10-12T00:00:00Z");
    }

    #[test]
    fn trailing_minute() {
        let window =
            TimeWindow::trailing(at("2026-10-19T10:00:30Z"), chrono::Duration::seconds(60));
        assert_eq!(window.start_param(), "2026-10-19T09:59:30Z");
        assert_eq!(window.end_param(), "2026-10-19T10:00:30Z");
    }

    #[test]
    fn params_drop_subseconds() {
        let window = TimeWindow::trailing(
            at("2026-10-19T10:00:30.987654Z"),
            chrono::Duration::seconds(60),
        );
        assert_eq!(window.end_param(), "2026-10-19T10:00:30Z");
        assert_eq!(
            window.to_string(),
            "[2026-10-19T09:59:30Z, 2026-10-19T10:00:30Z]"
        );
    }
}
