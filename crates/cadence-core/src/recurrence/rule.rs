use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// How often a series repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// When a series stops producing instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndType {
    #[default]
    Never,
    /// No occurrence after `end_date`
    Date,
    /// At most `end_count` instances over the lifetime of the series
    Count,
}

/// Which day of the month a monthly rule lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthlyPattern {
    /// Fixed day, clamped to the length of short months
    DayOfMonth(u32),
    /// The `week`-th `weekday` of the month; week 5 means the last one
    NthWeekday { week: u8, weekday: Weekday },
    /// Same day of month as the anchor date
    AnchorDay,
}

/// A recurrence rule attached to a series.
///
/// This is also the persisted JSON shape: field names are camelCase and
/// weekdays are indices with 0 = Sunday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub days_of_week: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week_of_month: Option<u8>,
    #[serde(default)]
    pub end_type: EndType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_count: Option<u32>,
}

fn default_interval() -> u32 {
    1
}

/// Converts a 0 = Sunday weekday index into a [`Weekday`].
pub fn weekday_from_index(index: u8) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

impl RecurrenceRule {
    /// A rule repeating every period of `frequency`, forever.
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            days_of_week: Vec::new(),
            day_of_month: None,
            week_of_month: None,
            end_type: EndType::Never,
            end_date: None,
            end_count: None,
        }
    }

    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    pub fn on_days(mut self, days: &[Weekday]) -> Self {
        self.days_of_week = days
            .iter()
            .map(|d| d.num_days_from_sunday() as u8)
            .collect();
        self
    }

    pub fn on_day_of_month(mut self, day: u8) -> Self {
        self.day_of_month = Some(day);
        self.week_of_month = None;
        self
    }

    /// `week` 1..=4 picks that occurrence of `weekday`, 5 picks the last one.
    pub fn on_nth_weekday(mut self, week: u8, weekday: Weekday) -> Self {
        self.day_of_month = None;
        self.week_of_month = Some(week);
        self.days_of_week = vec![weekday.num_days_from_sunday() as u8];
        self
    }

    pub fn until(mut self, end_date: NaiveDate) -> Self {
        self.end_type = EndType::Date;
        self.end_date = Some(end_date);
        self.end_count = None;
        self
    }

    pub fn times(mut self, count: u32) -> Self {
        self.end_type = EndType::Count;
        self.end_count = Some(count);
        self.end_date = None;
        self
    }

    /// Configured weekdays, skipping indices outside 0..=6.
    pub fn weekdays(&self) -> Vec<Weekday> {
        self.days_of_week
            .iter()
            .filter_map(|&d| weekday_from_index(d))
            .collect()
    }

    /// Resolves the monthly day selection. `day_of_month` wins over
    /// `week_of_month`; a `week_of_month` without a weekday is ignored.
    pub fn monthly_pattern(&self) -> MonthlyPattern {
        if let Some(day) = self.day_of_month {
            return MonthlyPattern::DayOfMonth(day as u32);
        }
        match (self.week_of_month, self.days_of_week.first().copied().and_then(weekday_from_index)) {
            (Some(week), Some(weekday)) => MonthlyPattern::NthWeekday { week, weekday },
            _ => MonthlyPattern::AnchorDay,
        }
    }

    /// The end date, when the rule ends on a date.
    pub fn end_date(&self) -> Option<NaiveDate> {
        match self.end_type {
            EndType::Date => self.end_date,
            _ => None,
        }
    }

    /// The instance limit, when the rule ends after a count.
    pub fn end_count(&self) -> Option<u32> {
        match self.end_type {
            EndType::Count => self.end_count,
            _ => None,
        }
    }

    /// Checks the structural constraints a rule must satisfy before any
    /// occurrence is computed from it.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.interval < 1 {
            return Err(CoreError::MalformedRule("interval must be at least 1".to_string()));
        }
        if let Some(day) = self.days_of_week.iter().find(|&&d| d > 6) {
            return Err(CoreError::MalformedRule(format!("weekday index {} out of range 0-6", day)));
        }
        if let Some(day) = self.day_of_month {
            if !(1..=31).contains(&day) {
                return Err(CoreError::MalformedRule(format!("dayOfMonth {} out of range 1-31", day)));
            }
        }
        if let Some(week) = self.week_of_month {
            if !(1..=5).contains(&week) {
                return Err(CoreError::MalformedRule(format!("weekOfMonth {} out of range 1-5", week)));
            }
            if self.day_of_month.is_none() && self.days_of_week.is_empty() {
                return Err(CoreError::MalformedRule(
                    "weekOfMonth requires a weekday in daysOfWeek".to_string(),
                ));
            }
        }
        match self.end_type {
            EndType::Never => {}
            EndType::Date if self.end_date.is_none() => {
                return Err(CoreError::MalformedRule("endType 'date' requires endDate".to_string()));
            }
            EndType::Count if !matches!(self.end_count, Some(n) if n >= 1) => {
                return Err(CoreError::MalformedRule(
                    "endType 'count' requires a positive endCount".to_string(),
                ));
            }
            EndType::Date | EndType::Count => {}
        }
        Ok(())
    }
}

/// Serializes a rule to its persisted JSON form.
pub fn encode(rule: &RecurrenceRule) -> String {
    serde_json::to_string(rule).expect("recurrence rules contain only JSON-safe values")
}

/// Parses and validates a persisted rule, reporting why it was rejected.
pub fn try_decode(raw: &str) -> Result<RecurrenceRule, CoreError> {
    let rule: RecurrenceRule = serde_json::from_str(raw)
        .map_err(|e| CoreError::MalformedRule(format!("invalid rule payload: {}", e)))?;
    rule.validate()?;
    Ok(rule)
}

/// Soft variant of [`try_decode`]: missing or malformed input yields `None`,
/// which callers treat as a series that generates nothing.
pub fn decode(raw: Option<&str>) -> Option<RecurrenceRule> {
    raw.and_then(|raw| try_decode(raw).ok())
}
