// 📅 Period Filter
// Relative calendar windows (today / this week / ...) evaluated against a single "now".

use crate::expense::Dated;
use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    All,
    Today,
    Week,
    Month,
    Year,
}

impl Period {
    /// All periods in display order
    pub const ALL: [Period; 5] = [
        Period::All,
        Period::Today,
        Period::Week,
        Period::Month,
        Period::Year,
    ];

    /// Keyword accepted by `FromStr`
    pub fn keyword(&self) -> &'static str {
        match self {
            Period::All => "all",
            Period::Today => "today",
            Period::Week => "week",
            Period::Month => "month",
            Period::Year => "year",
        }
    }

    /// Human-readable name for display
    pub fn label(&self) -> &'static str {
        match self {
            Period::All => "All Time",
            Period::Today => "Today",
            Period::Week => "This Week",
            Period::Month => "This Month",
            Period::Year => "This Year",
        }
    }

    /// Inclusive lower bound of the window, `None` for `All`.
    ///
    /// Boundaries are calendar midnights in the time zone of `now`; weeks start on Sunday.
    pub fn window_start<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Utc>> {
        let today = now.date_naive();
        let first_day = match self {
            Period::All => return None,
            Period::Today => today,
            Period::Week => {
                today - Duration::days(i64::from(today.weekday().num_days_from_sunday()))
            }
            Period::Month => {
                NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today)
            }
            Period::Year => NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
        };

        Some(start_of_day(&now.timezone(), first_day))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for Period {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Period::ALL
            .into_iter()
            .find(|p| p.keyword() == wanted)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown period '{}' (expected one of: all, today, week, month, year)",
                    s
                )
            })
    }
}

/// First instant of `date` in `tz`.
///
/// When midnight falls into a DST gap the first valid local minute of the day is used.
fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);

    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => (1..=24 * 60)
            .find_map(|minutes| {
                tz.from_local_datetime(&(midnight + Duration::minutes(minutes)))
                    .earliest()
            })
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&midnight)),
    }
}

/// Keep records dated at or after the start of `period`, preserving input order.
pub fn filter_by_period_at<'a, T: Dated, Tz: TimeZone>(
    records: &'a [T],
    period: Period,
    now: &DateTime<Tz>,
) -> Vec<&'a T> {
    match period.window_start(now) {
        None => records.iter().collect(),
        Some(start) => records.iter().filter(|r| r.date() >= start).collect(),
    }
}

/// Same as `filter_by_period_at`, with "now" taken from the local wall clock
pub fn filter_by_period<T: Dated>(records: &[T], period: Period) -> Vec<&T> {
    filter_by_period_at(records, period, &chrono::Local::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expense::{Expense, NewExpense};
    use chrono::FixedOffset;

    fn expense_at(id: &str, date: DateTime<Utc>) -> Expense {
        Expense::from_candidate(id.to_string(), NewExpense::new(id, 10.0, "Food", date))
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    // Wednesday, 2024-05-15 14:00 UTC
    fn now() -> DateTime<Utc> {
        utc(2024, 5, 15, 14, 0, 0)
    }

    fn sample() -> Vec<Expense> {
        vec![
            expense_at("today", utc(2024, 5, 15, 8, 0, 0)),
            expense_at("sunday", utc(2024, 5, 12, 0, 0, 0)),
            expense_at("saturday", utc(2024, 5, 11, 23, 59, 59)),
            expense_at("first-of-month", utc(2024, 5, 1, 0, 0, 0)),
            expense_at("april", utc(2024, 4, 30, 12, 0, 0)),
            expense_at("new-year", utc(2024, 1, 1, 0, 0, 0)),
            expense_at("last-year", utc(2023, 12, 31, 23, 59, 59)),
        ]
    }

    fn ids(records: &[&Expense]) -> Vec<String> {
        records.iter().map(|e| e.id.clone()).collect()
    }

    #[test]
    fn test_all_is_identity() {
        let records = sample();
        let filtered = filter_by_period_at(&records, Period::All, &now());
        assert_eq!(filtered.len(), records.len());
        assert!(filtered.iter().zip(records.iter()).all(|(a, b)| *a == b));
    }

    #[test]
    fn test_today() {
        let records = sample();
        let filtered = filter_by_period_at(&records, Period::Today, &now());
        assert_eq!(ids(&filtered), vec!["today"]);
    }

    #[test]
    fn test_week_starts_sunday_inclusive() {
        let records = sample();
        let filtered = filter_by_period_at(&records, Period::Week, &now());
        assert_eq!(ids(&filtered), vec!["today", "sunday"]);
    }

    #[test]
    fn test_week_on_sunday_is_just_today() {
        let sunday_noon = utc(2024, 5, 12, 12, 0, 0);
        assert_eq!(
            Period::Week.window_start(&sunday_noon),
            Some(utc(2024, 5, 12, 0, 0, 0))
        );
    }

    #[test]
    fn test_month_and_year() {
        let records = sample();

        let month = filter_by_period_at(&records, Period::Month, &now());
        assert_eq!(
            ids(&month),
            vec!["today", "sunday", "saturday", "first-of-month"]
        );

        let year = filter_by_period_at(&records, Period::Year, &now());
        assert_eq!(year.len(), 6);
        assert!(!ids(&year).contains(&"last-year".to_string()));
    }

    #[test]
    fn test_boundaries_follow_clock_timezone() {
        // 2024-05-15 01:00 at UTC+02:00 is still 2024-05-14 23:00 UTC
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let local_now = offset.with_ymd_and_hms(2024, 5, 15, 1, 0, 0).unwrap();

        assert_eq!(
            Period::Today.window_start(&local_now),
            Some(utc(2024, 5, 14, 22, 0, 0))
        );
    }

    #[test]
    fn test_filter_is_idempotent() {
        let records = sample();
        let once = filter_by_period_at(&records, Period::Today, &now());
        let twice: Vec<&Expense> = filter_by_period_at(&once, Period::Today, &now())
            .into_iter()
            .copied()
            .collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty_input() {
        let records: Vec<Expense> = Vec::new();
        for period in Period::ALL {
            assert!(filter_by_period_at(&records, period, &now()).is_empty());
        }
    }

    #[test]
    fn test_parse_keywords() {
        assert_eq!("week".parse::<Period>().unwrap(), Period::Week);
        assert_eq!(" Month ".parse::<Period>().unwrap(), Period::Month);
        assert!("decade".parse::<Period>().is_err());
        assert_eq!(Period::Year.label(), "This Year");
        assert_eq!(Period::default(), Period::All);
    }
}
