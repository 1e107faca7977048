//! Lightweight cron expression parser.
//! Supports: "MIN HOUR DOM MON DOW" (5-field, no seconds)
//! Fields: *, */N, N, A-B, comma lists; DOW also takes SUN..SAT.
//! Example: "0 12 * * MON,WED" = Mondays and Wednesdays at 12:00 UTC
//!
//! No cron crate dependency.

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Timelike, Utc};
use lunchpair_core::{LunchError, Result, Weekday};

/// How far ahead `next_after` searches before giving up (covers Feb 29).
const MAX_SEARCH_DAYS: u32 = 366 * 5;

/// A parsed cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    minutes: Vec<u32>,
    hours: Vec<u32>,
    days_of_month: Vec<u32>,
    months: Vec<u32>,
    days_of_week: Vec<u32>,
    /// Cron semantics: when both DOM and DOW are restricted, either may match.
    dom_restricted: bool,
    dow_restricted: bool,
}

impl CronSchedule {
    /// Parse a five-field expression.
    pub fn parse(expression: &str) -> Result<Self> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(LunchError::InvalidCron(format!(
                "'{expression}' (need 5 fields: MIN HOUR DOM MON DOW)"
            )));
        }

        let field = |text: &str, min: u32, max: u32, name: &str| {
            parse_field(text, min, max).ok_or_else(|| {
                LunchError::InvalidCron(format!("'{expression}': bad {name} field '{text}'"))
            })
        };

        let minutes = field(parts[0], 0, 59, "minute")?;
        let hours = field(parts[1], 0, 23, "hour")?;
        let days_of_month = field(parts[2], 1, 31, "day-of-month")?;
        let months = field(parts[3], 1, 12, "month")?;
        let days_of_week = parse_dow(parts[4]).ok_or_else(|| {
            LunchError::InvalidCron(format!("'{expression}': bad day-of-week field '{}'", parts[4]))
        })?;

        Ok(Self {
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week,
            // `*/N` counts as unrestricted, as in Vixie cron.
            dom_restricted: !parts[2].starts_with('*'),
            dow_restricted: !parts[4].starts_with('*'),
        })
    }

    /// First matching minute strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        // Start at the next whole minute.
        let start = after + Duration::minutes(1);
        let start = start
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(start);

        let mut date = start.date_naive();
        let mut from_time = start.time();

        for _ in 0..MAX_SEARCH_DAYS {
            if self.day_matches(date) {
                if let Some(time) = self.first_time_at_or_after(from_time) {
                    return Some(Utc.from_utc_datetime(&date.and_time(time)));
                }
            }
            date = date.succ_opt()?;
            from_time = NaiveTime::MIN;
        }

        None
    }

    fn day_matches(&self, date: chrono::NaiveDate) -> bool {
        if !self.months.contains(&date.month()) {
            return false;
        }
        let dom = self.days_of_month.contains(&date.day());
        let dow = self
            .days_of_week
            .contains(&Weekday::from(date.weekday()).number());
        match (self.dom_restricted, self.dow_restricted) {
            (true, true) => dom || dow,
            _ => dom && dow,
        }
    }

    fn first_time_at_or_after(&self, from: NaiveTime) -> Option<NaiveTime> {
        // Both lists are sorted, so the first hit is the earliest.
        for &h in &self.hours {
            if h < from.hour() {
                continue;
            }
            for &m in &self.minutes {
                if h == from.hour() && m < from.minute() {
                    continue;
                }
                return NaiveTime::from_hms_opt(h, m, 0);
            }
        }
        None
    }
}

/// Parse a cron field into a sorted list of matching values.
fn parse_field(field: &str, min: u32, max: u32) -> Option<Vec<u32>> {
    let mut values = Vec::new();
    for part in field.split(',') {
        values.extend(parse_part(part.trim(), min, max, |s| s.parse().ok())?);
    }
    finish(values)
}

/// Day-of-week accepts names and 0-7 (7 = Sunday).
fn parse_dow(field: &str) -> Option<Vec<u32>> {
    // Raw value: 7 stays 7 so a range can end on it.
    let raw = |s: &str| -> Option<u32> {
        match s.parse::<u32>() {
            Ok(n) => (n <= 7).then_some(n),
            Err(_) => s.parse::<Weekday>().ok().map(|d| d.number()),
        }
    };
    let token = |s: &str| raw(s).and_then(Weekday::from_number).map(|d| d.number());

    let mut values = Vec::new();
    for part in field.split(',') {
        // Ranges like FRI-SUN may wrap the week.
        if let Some((a, b)) = part.trim().split_once('-') {
            let (a, b) = (raw(a)? % 7, raw(b)?);
            if b == 7 {
                values.extend(a..=6);
                values.push(0);
            } else if a <= b {
                values.extend(a..=b);
            } else {
                values.extend(a..=6);
                values.extend(0..=b);
            }
            continue;
        }
        values.extend(parse_part(part.trim(), 0, 6, token)?);
    }
    finish(values)
}

fn parse_part(
    part: &str,
    min: u32,
    max: u32,
    value: impl Fn(&str) -> Option<u32>,
) -> Option<Vec<u32>> {
    if part == "*" {
        return Some((min..=max).collect());
    }

    // */N: every N
    if let Some(step) = part.strip_prefix("*/") {
        let n: u32 = step.parse().ok()?;
        if n == 0 {
            return None;
        }
        return Some((min..=max).step_by(n as usize).collect());
    }

    // A-B
    if let Some((a, b)) = part.split_once('-') {
        let (a, b) = (value(a)?, value(b)?);
        if a > b || a < min || b > max {
            return None;
        }
        return Some((a..=b).collect());
    }

    let n = value(part)?;
    (n >= min && n <= max).then(|| vec![n])
}

fn finish(mut values: Vec<u32>) -> Option<Vec<u32>> {
    values.sort_unstable();
    values.dedup();
    (!values.is_empty()).then_some(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn next(expression: &str, after: DateTime<Utc>) -> DateTime<Utc> {
        CronSchedule::parse(expression)
            .unwrap()
            .next_after(after)
            .unwrap()
    }

    #[test]
    fn test_top_of_the_hour() {
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 10, 30, 0).unwrap();
        assert_eq!(
            next("0 * * * *", after),
            Utc.with_ymd_and_hms(2026, 2, 22, 11, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_daily_lunch_time() {
        let before = Utc.with_ymd_and_hms(2026, 2, 22, 11, 59, 30).unwrap();
        assert_eq!(
            next("0 12 * * *", before),
            Utc.with_ymd_and_hms(2026, 2, 22, 12, 0, 0).unwrap()
        );

        // Past today's slot rolls to tomorrow.
        let late = Utc.with_ymd_and_hms(2026, 2, 22, 12, 0, 1).unwrap();
        assert_eq!(
            next("0 12 * * *", late),
            Utc.with_ymd_and_hms(2026, 2, 23, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_minute_step() {
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 10, 47, 0).unwrap();
        assert_eq!(
            next("*/20 * * * *", after),
            Utc.with_ymd_and_hms(2026, 2, 22, 11, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_weekly_lunch() {
        // 2026-02-22 is a Sunday.
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 13, 0, 0).unwrap();
        let first = next("0 12 * * MON,WED", after);
        assert_eq!(first, Utc.with_ymd_and_hms(2026, 2, 23, 12, 0, 0).unwrap());
        assert_eq!(
            next("0 12 * * MON,WED", first),
            Utc.with_ymd_and_hms(2026, 2, 25, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_strictly_after() {
        let at = Utc.with_ymd_and_hms(2026, 2, 23, 12, 0, 0).unwrap();
        assert_eq!(
            next("0 12 * * MON", at),
            Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_dow_numbers_and_ranges() {
        let names = CronSchedule::parse("0 12 * * MON-FRI").unwrap();
        let numbers = CronSchedule::parse("0 12 * * 1-5").unwrap();
        assert_eq!(names, numbers);

        let sunday = CronSchedule::parse("0 12 * * 7").unwrap();
        assert_eq!(sunday, CronSchedule::parse("0 12 * * SUN").unwrap());

        // Wrapping range: Friday through Sunday.
        let weekend = CronSchedule::parse("0 12 * * FRI-SUN").unwrap();
        assert_eq!(weekend, CronSchedule::parse("0 12 * * 0,5,6").unwrap());
    }

    #[test]
    fn test_dow_range_ending_on_seven() {
        let every_day = CronSchedule::parse("0 12 * * 0-6").unwrap();
        assert_eq!(CronSchedule::parse("0 12 * * 0-7").unwrap(), every_day);

        let fri_to_sun = CronSchedule::parse("0 12 * * 5-7").unwrap();
        assert_eq!(fri_to_sun, CronSchedule::parse("0 12 * * FRI,SAT,SUN").unwrap());

        // A 0-7 rule fires daily, not once a week.
        let sunday = Utc.with_ymd_and_hms(2026, 2, 22, 13, 0, 0).unwrap();
        assert_eq!(
            next("0 12 * * 0-7", sunday),
            Utc.with_ymd_and_hms(2026, 2, 23, 12, 0, 0).unwrap()
        );
        assert!(CronSchedule::parse("0 12 * * 1-8").is_err());
    }

    #[test]
    fn test_stepped_wildcard_is_unrestricted() {
        // `*/1` in day-of-month must not turn a Monday rule into a daily one.
        let sunday = Utc.with_ymd_and_hms(2026, 2, 22, 13, 0, 0).unwrap();
        let tuesday = Utc.with_ymd_and_hms(2026, 2, 24, 0, 0, 0).unwrap();
        assert_eq!(
            next("0 12 */1 * MON", sunday),
            Utc.with_ymd_and_hms(2026, 2, 23, 12, 0, 0).unwrap()
        );
        assert_eq!(
            next("0 12 */1 * MON", tuesday),
            Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
        );
        assert_eq!(
            CronSchedule::parse("0 12 */1 * MON").unwrap(),
            CronSchedule::parse("0 12 * * MON").unwrap()
        );
    }

    #[test]
    fn test_day_of_month() {
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 0, 0, 0).unwrap();
        assert_eq!(
            next("30 9 1 * *", after),
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_leap_day() {
        let after = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(
            next("0 0 29 2 *", after),
            Utc.with_ymd_and_hms(2028, 2, 29, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_rejects_malformed_fields() {
        for bad in [
            "bad",
            "0 25 * * *",
            "0 12 * * FUNDAY",
            "*/0 * * * *",
            "0 12 * *",
            "0 12 * * 8",
        ] {
            assert!(
                matches!(CronSchedule::parse(bad), Err(LunchError::InvalidCron(_))),
                "{bad} should be rejected"
            );
        }
    }
}
