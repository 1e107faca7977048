//! Rule creation: turns a schedule request into a weekly cron expression.

use lunchpair_core::{LunchError, Result, ScheduleRequest, Weekday};

use crate::cron::CronSchedule;

/// Parse weekday tokens, rejecting an empty set or unknown tokens.
/// Duplicates collapse; the result is in week order (SUN first).
pub fn parse_days(days: &[String]) -> Result<Vec<Weekday>> {
    if days.is_empty() {
        return Err(LunchError::Validation("field days is required".into()));
    }
    let mut parsed = days
        .iter()
        .map(|d| d.parse::<Weekday>())
        .collect::<Result<Vec<_>>>()?;
    parsed.sort_unstable();
    parsed.dedup();
    Ok(parsed)
}

/// Build "<minute> <hour> * * DAY,DAY" for the given weekdays.
pub fn weekly_expression(days: &[Weekday], hour: u32, minute: u32) -> Result<String> {
    if days.is_empty() {
        return Err(LunchError::Validation("field days is required".into()));
    }
    let tokens: Vec<&str> = days.iter().map(|d| d.token()).collect();
    let expression = format!("{minute} {hour} * * {}", tokens.join(","));
    // Out-of-range times surface here rather than at registration.
    CronSchedule::parse(&expression)?;
    Ok(expression)
}

/// Validate a request and produce the expression to persist.
pub fn expression_for(request: &ScheduleRequest, hour: u32, minute: u32) -> Result<String> {
    let days = parse_days(&request.days)?;
    weekly_expression(&days, hour, minute)
}
