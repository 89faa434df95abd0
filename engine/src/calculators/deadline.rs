// Working-time arithmetic: deadlines in business days or business hours, and
// business days between two dates. Weekends and listed holidays are skipped.
use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::models::{Report, Section};
use shared::utils::{format_two_decimals, parse_iso_date};

use super::{decode, require_positive, Calculator};
use crate::config::settings::Defaults;
use crate::data::form;
use crate::error::{CalcError, CalcResult};

const MAX_BUSINESS_DAYS: f64 = 10_000.0;
const MAX_BUSINESS_HOURS: f64 = 100_000.0;
const MAX_RANGE_DAYS: i64 = 36_600;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeadlineDefaults {
    pub workday_start: String,
    pub workday_end: String,
    pub start_time: String,
    pub exclude_weekends: bool,
}

impl Default for DeadlineDefaults {
    fn default() -> Self {
        Self {
            workday_start: "09:00".to_string(),
            workday_end: "17:00".to_string(),
            start_time: "09:00".to_string(),
            exclude_weekends: true,
        }
    }
}

/// Which days count as working days.
#[derive(Debug, Clone, Default)]
pub struct WorkCalendar {
    pub exclude_weekends: bool,
    pub holidays: BTreeSet<NaiveDate>,
}

impl WorkCalendar {
    /// Builds the holiday set from `YYYY-MM-DD` strings; anything else is ignored.
    pub fn new(exclude_weekends: bool, holidays: &[String]) -> Self {
        Self {
            exclude_weekends,
            holidays: holidays.iter().filter_map(|h| parse_iso_date(h)).collect(),
        }
    }

    pub fn is_weekend(date: NaiveDate) -> bool {
        matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        !(self.exclude_weekends && Self::is_weekend(date)) && !self.holidays.contains(&date)
    }

    /// `date` itself when it is a working day, otherwise the next one.
    pub fn next_working_day(&self, date: NaiveDate) -> NaiveDate {
        let mut day = date;
        // Holidays are finite so at most holidays + 2 weekend days are skipped in a row
        while !self.is_working_day(day) {
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
        day
    }

    pub fn add_business_days(&self, start: NaiveDateTime, days: u32) -> NaiveDateTime {
        let time = start.time();
        let mut day = self.next_working_day(start.date());
        let mut remaining = days;
        while remaining > 0 {
            day = match day.succ_opt() {
                Some(d) => d,
                None => break,
            };
            if self.is_working_day(day) {
                remaining -= 1;
            }
        }
        day.and_time(time)
    }

    pub fn add_business_hours(&self, start: NaiveDateTime, minutes: i64, window: &WorkWindow) -> NaiveDateTime {
        let mut current = self.clamp_to_window(start, window);
        let mut remaining = minutes;
        while remaining > 0 {
            let available = window.end_minutes() - minutes_of_day(current);
            if available <= 0 {
                current = self.clamp_to_window(current, window);
                continue;
            }
            let consume = remaining.min(available);
            current += Duration::minutes(consume);
            remaining -= consume;
            if remaining > 0 {
                current = self.start_of_next_working_day(current.date(), window);
            }
        }
        current
    }

    fn start_of_next_working_day(&self, date: NaiveDate, window: &WorkWindow) -> NaiveDateTime {
        let next = date.succ_opt().unwrap_or(date);
        self.next_working_day(next).and_time(window.start)
    }

    /// Moves `at` into the next open stretch of the work window.
    pub fn clamp_to_window(&self, at: NaiveDateTime, window: &WorkWindow) -> NaiveDateTime {
        if !self.is_working_day(at.date()) {
            return self.next_working_day(at.date()).and_time(window.start);
        }
        let now = minutes_of_day(at);
        if now < window.start_minutes() {
            at.date().and_time(window.start)
        } else if now >= window.end_minutes() {
            self.start_of_next_working_day(at.date(), window)
        } else {
            at
        }
    }
}

fn minutes_of_day(at: NaiveDateTime) -> i64 {
    (at.hour() * 60 + at.minute()) as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl WorkWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> CalcResult<Self> {
        if end <= start {
            return Err(CalcError::invalid(
                "Workday end time must be later than the workday start time.",
            ));
        }
        Ok(Self { start, end })
    }

    fn start_minutes(&self) -> i64 {
        (self.start.hour() * 60 + self.start.minute()) as i64
    }

    fn end_minutes(&self) -> i64 {
        (self.end.hour() * 60 + self.end.minute()) as i64
    }
}

pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationUnit {
    BusinessDays,
    BusinessHours,
}

impl DurationUnit {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace('-', "_").as_str() {
            "business_days" | "businessdays" | "days" => Some(DurationUnit::BusinessDays),
            "business_hours" | "businesshours" | "hours" => Some(DurationUnit::BusinessHours),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeadlineInput {
    #[serde(default, deserialize_with = "form::optional_text")]
    pub start_date: Option<String>,
    #[serde(default, deserialize_with = "form::optional_text")]
    pub start_time: Option<String>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub duration: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_text")]
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "form::optional_flag")]
    pub exclude_weekends: Option<bool>,
    #[serde(default, deserialize_with = "form::text_list")]
    pub holidays: Vec<String>,
    #[serde(default, deserialize_with = "form::optional_text")]
    pub workday_start: Option<String>,
    #[serde(default, deserialize_with = "form::optional_text")]
    pub workday_end: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeadlineResult {
    pub start: NaiveDateTime,
    pub deadline: NaiveDateTime,
    pub duration: f64,
    pub unit: DurationUnit,
    pub window: (NaiveTime, NaiveTime),
    pub exclude_weekends: bool,
    pub holidays: usize,
    /// Business-day counting moved off a non-working start date.
    pub start_shifted: bool,
}

impl DeadlineResult {
    pub fn elapsed_hours(&self) -> f64 {
        (self.deadline - self.start).num_minutes() as f64 / 60.0
    }
}

pub fn calculate(input: &DeadlineInput, defaults: &DeadlineDefaults) -> CalcResult<DeadlineResult> {
    let start_date = input
        .start_date
        .as_deref()
        .and_then(parse_iso_date)
        .ok_or_else(|| CalcError::invalid("Enter a valid start date in the format YYYY-MM-DD."))?;
    let start_time = parse_time(input.start_time.as_deref().unwrap_or(&defaults.start_time))
        .ok_or_else(|| CalcError::invalid("Enter a valid start time in the format HH:MM (24-hour)."))?;
    let duration = require_positive(input.duration, "duration")?;

    let unit = match input.unit.as_deref() {
        None => DurationUnit::BusinessDays,
        Some(raw) => DurationUnit::parse(raw)
            .ok_or_else(|| CalcError::invalid("Select a unit: business_days or business_hours."))?,
    };

    let (Some(work_start), Some(work_end)) = (
        parse_time(input.workday_start.as_deref().unwrap_or(&defaults.workday_start)),
        parse_time(input.workday_end.as_deref().unwrap_or(&defaults.workday_end)),
    ) else {
        return Err(CalcError::invalid("Enter valid working hours in the format HH:MM (24-hour)."));
    };
    let window = WorkWindow::new(work_start, work_end)?;

    let exclude_weekends = input.exclude_weekends.unwrap_or(defaults.exclude_weekends);
    let calendar = WorkCalendar::new(exclude_weekends, &input.holidays);
    let start = start_date.and_time(start_time);

    let deadline = match unit {
        DurationUnit::BusinessDays => {
            if (duration - duration.floor()).abs() > 1e-9 {
                return Err(CalcError::invalid(
                    "Business days must be a whole number. Use business hours for fractional time.",
                ));
            }
            if duration > MAX_BUSINESS_DAYS {
                return Err(CalcError::out_of_range("Enter 10,000 business days or fewer."));
            }
            calendar.add_business_days(start, duration as u32)
        }
        DurationUnit::BusinessHours => {
            if duration > MAX_BUSINESS_HOURS {
                return Err(CalcError::out_of_range("Enter 100,000 business hours or fewer."));
            }
            calendar.add_business_hours(start, (duration * 60.0).round() as i64, &window)
        }
    };

    let start_shifted = unit == DurationUnit::BusinessDays && calendar.next_working_day(start_date) != start_date;

    Ok(DeadlineResult {
        start,
        deadline,
        duration,
        unit,
        window: (window.start, window.end),
        exclude_weekends,
        holidays: calendar.holidays.len(),
        start_shifted,
    })
}

impl DeadlineResult {
    pub fn to_report(&self, calculator: &str) -> Report {
        let hours = self.elapsed_hours();
        let unit = match self.unit {
            DurationUnit::BusinessDays => "business day(s)",
            DurationUnit::BusinessHours => "business hour(s)",
        };
        let mut section = Section::titled("Result")
            .field("Deadline", self.deadline.format("%Y-%m-%d %H:%M").to_string())
            .field("Duration added", format!("{} {}", self.duration, unit))
            .field(
                "Calendar time elapsed",
                format!("{} hours ({} days)", format_two_decimals(hours), format_two_decimals(hours / 24.0)),
            );
        if self.unit == DurationUnit::BusinessHours {
            section = section.field(
                "Working window used",
                format!("{} to {}", self.window.0.format("%H:%M"), self.window.1.format("%H:%M")),
            );
        }
        section = section
            .field("Weekends", if self.exclude_weekends { "Excluded" } else { "Included" })
            .field(
                "Holidays skipped",
                if self.holidays > 0 { self.holidays.to_string() } else { "None".to_string() },
            );
        if self.start_shifted {
            section = section.note("Your start date lands on a non-working day, so counting begins on the next working day.");
        }
        Report::success(calculator, "Deadline").with_section(section)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BusinessDaysInput {
    #[serde(default, deserialize_with = "form::optional_text")]
    pub start_date: Option<String>,
    #[serde(default, deserialize_with = "form::optional_text")]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "form::optional_flag")]
    pub include_start: Option<bool>,
    #[serde(default, deserialize_with = "form::optional_flag")]
    pub include_end: Option<bool>,
    #[serde(default, deserialize_with = "form::text_list")]
    pub holidays: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BusinessDaysResult {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub include_start: bool,
    pub include_end: bool,
    pub total_days: u32,
    pub weekend_days: u32,
    pub holidays_excluded: u32,
    pub business_days: u32,
    pub holidays_applied: bool,
}

fn required_date(raw: Option<&str>, label: &str) -> CalcResult<NaiveDate> {
    let raw = raw.ok_or_else(|| CalcError::invalid(format!("Enter a valid {} in YYYY-MM-DD format.", label)))?;
    parse_iso_date(raw).ok_or_else(|| CalcError::invalid(format!("Enter a real calendar date for {}.", label)))
}

pub fn count_business_days(input: &BusinessDaysInput) -> CalcResult<BusinessDaysResult> {
    let start = required_date(input.start_date.as_deref(), "start date")?;
    let end = required_date(input.end_date.as_deref(), "end date")?;
    if end < start {
        return Err(CalcError::invalid("End date must be the same as or later than the start date."));
    }
    if (end - start).num_days() > MAX_RANGE_DAYS {
        return Err(CalcError::out_of_range("Enter a date range of 100 years or less."));
    }

    let include_start = input.include_start.unwrap_or(true);
    let include_end = input.include_end.unwrap_or(true);
    let first = if include_start { start } else { start + Duration::days(1) };
    let last = if include_end { end } else { end - Duration::days(1) };
    if last < first {
        return Err(CalcError::invalid(
            "With your include/exclude settings, there are no days to count in this range.",
        ));
    }

    // Weekends are always removed here; holidays only matter on weekdays
    let calendar = WorkCalendar::new(true, &input.holidays);
    let mut result = BusinessDaysResult {
        start,
        end,
        include_start,
        include_end,
        total_days: 0,
        weekend_days: 0,
        holidays_excluded: 0,
        business_days: 0,
        holidays_applied: !calendar.holidays.is_empty(),
    };
    for day in first.iter_days().take_while(|d| *d <= last) {
        result.total_days += 1;
        if WorkCalendar::is_weekend(day) {
            result.weekend_days += 1;
        } else if calendar.holidays.contains(&day) {
            result.holidays_excluded += 1;
        } else {
            result.business_days += 1;
        }
    }
    Ok(result)
}

impl BusinessDaysResult {
    pub fn to_report(&self, calculator: &str) -> Report {
        let bounds = format!(
            "{}, {}",
            if self.include_start { "including start" } else { "excluding start" },
            if self.include_end { "including end" } else { "excluding end" }
        );
        let holidays = if self.holidays_applied {
            self.holidays_excluded.to_string()
        } else {
            "0 (not applied)".to_string()
        };
        Report::success(calculator, "Business Days Between Dates").with_section(
            Section::titled("Result")
                .field("Business days", self.business_days.to_string())
                .field(
                    "Date range",
                    format!("{} to {} ({})", self.start.format("%Y-%m-%d"), self.end.format("%Y-%m-%d"), bounds),
                )
                .field("Total counted days", self.total_days.to_string())
                .field("Weekend days removed", self.weekend_days.to_string())
                .field("Holidays excluded", holidays),
        )
    }
}

pub struct DeadlineCalculator;

impl Calculator for DeadlineCalculator {
    fn name(&self) -> &str {
        "deadline"
    }

    fn description(&self) -> &str {
        "Deadline after a number of business days or business hours"
    }

    fn run(&self, params: &Value, defaults: &Defaults) -> CalcResult<Report> {
        let input: DeadlineInput = decode(params)?;
        Ok(calculate(&input, &defaults.deadline)?.to_report(self.name()))
    }
}

pub struct BusinessDaysCalculator;

impl Calculator for BusinessDaysCalculator {
    fn name(&self) -> &str {
        "business-days-between"
    }

    fn description(&self) -> &str {
        "Business days between two dates, excluding weekends and holidays"
    }

    fn run(&self, params: &Value, _defaults: &Defaults) -> CalcResult<Report> {
        let input: BusinessDaysInput = decode(params)?;
        Ok(count_business_days(&input)?.to_report(self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(s: &str) -> NaiveDate {
        parse_iso_date(s).unwrap()
    }

    fn days_input(start: &str, days: f64) -> DeadlineInput {
        DeadlineInput {
            start_date: Some(start.into()),
            duration: Some(days),
            ..Default::default()
        }
    }

    #[test]
    fn test_saturday_start_counts_from_monday() {
        // 2026-10-17 is a Saturday
        let result = calculate(&days_input("2026-10-17", 1.0), &DeadlineDefaults::default()).unwrap();
        assert!(result.start_shifted);
        assert_eq!(result.deadline, date("2026-10-20").and_hms_opt(9, 0, 0).unwrap());
        let report = result.to_report("deadline");
        assert_eq!(report.field("Deadline"), Some("2026-10-20 09:00"));
        assert_eq!(report.sections[0].notes.len(), 1);
    }

    #[test]
    fn test_holidays_are_skipped() {
        let mut input = days_input("2026-10-16", 1.0);
        input.holidays = vec!["2026-10-19".into(), "not-a-date".into()];
        let result = calculate(&input, &DeadlineDefaults::default()).unwrap();
        assert_eq!(result.deadline.date(), date("2026-10-20"));
        assert_eq!(result.holidays, 1);
        assert!(!result.start_shifted);
    }

    #[test]
    fn test_weekends_included_when_asked() {
        let mut input = days_input("2026-10-16", 2.0);
        input.exclude_weekends = Some(false);
        let result = calculate(&input, &DeadlineDefaults::default()).unwrap();
        assert_eq!(result.deadline.date(), date("2026-10-18"));
    }

    #[test]
    fn test_business_hours_roll_over_the_weekend() {
        let mut input = days_input("2026-10-16", 2.0);
        input.start_time = Some("16:00".into());
        input.unit = Some("business_hours".into());
        let result = calculate(&input, &DeadlineDefaults::default()).unwrap();
        assert_eq!(result.deadline, date("2026-10-19").and_hms_opt(10, 0, 0).unwrap());
        assert!(!result.start_shifted);

        // Starting before the window opens clamps to the window start
        let mut input = days_input("2026-10-19", 1.5);
        input.start_time = Some("06:30".into());
        input.unit = Some("hours".into());
        let result = calculate(&input, &DeadlineDefaults::default()).unwrap();
        assert_eq!(result.deadline, date("2026-10-19").and_hms_opt(10, 30, 0).unwrap());
    }

    #[test]
    fn test_deadline_validation() {
        let defaults = DeadlineDefaults::default();
        assert_eq!(
            calculate(&days_input("2026-10-16", 1.5), &defaults).unwrap_err().to_string(),
            "Business days must be a whole number. Use business hours for fractional time."
        );
        assert!(calculate(&days_input("16/10/2026", 1.0), &defaults).is_err());

        let mut input = days_input("2026-10-16", 1.0);
        input.workday_start = Some("17:00".into());
        input.workday_end = Some("09:00".into());
        assert_eq!(
            calculate(&input, &defaults).unwrap_err().to_string(),
            "Workday end time must be later than the workday start time."
        );

        let mut input = days_input("2026-10-16", 1.0);
        input.start_time = Some("25:00".into());
        assert!(calculate(&input, &defaults).is_err());
    }

    #[test]
    fn test_business_days_between() {
        let input = BusinessDaysInput {
            start_date: Some("2026-10-12".into()),
            end_date: Some("2026-10-25".into()),
            holidays: vec!["2026-10-14".into(), "2026-10-18".into()],
            ..Default::default()
        };
        let result = count_business_days(&input).unwrap();
        assert_eq!(result.total_days, 14);
        assert_eq!(result.weekend_days, 4);
        // The Sunday holiday is already a weekend day
        assert_eq!(result.holidays_excluded, 1);
        assert_eq!(result.business_days, 9);

        let input = BusinessDaysInput {
            start_date: Some("2026-10-16".into()),
            end_date: Some("2026-10-16".into()),
            include_end: Some(false),
            ..Default::default()
        };
        assert!(count_business_days(&input).is_err());

        let input = BusinessDaysInput {
            start_date: Some("2026-10-20".into()),
            end_date: Some("2026-10-16".into()),
            ..Default::default()
        };
        assert_eq!(
            count_business_days(&input).unwrap_err().to_string(),
            "End date must be the same as or later than the start date."
        );
    }

    proptest! {
        #[test]
        fn prop_deadline_is_a_working_day(offset in 0i64..3650, days in 1u32..60, holiday_offsets in proptest::collection::vec(0i64..120, 0..8)) {
            let start = date("2024-01-01") + Duration::days(offset);
            let holidays: Vec<String> = holiday_offsets
                .iter()
                .map(|o| (start + Duration::days(*o)).format("%Y-%m-%d").to_string())
                .collect();
            let calendar = WorkCalendar::new(true, &holidays);
            let deadline = calendar.add_business_days(start.and_hms_opt(9, 0, 0).unwrap(), days);
            prop_assert!(calendar.is_working_day(deadline.date()));
            prop_assert!(deadline.date() > start);
        }
    }
}
