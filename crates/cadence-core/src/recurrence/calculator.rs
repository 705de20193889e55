use chrono::{Datelike, Days, Months, NaiveDate, Utc};

use super::rule::{Frequency, MonthlyPattern, RecurrenceRule};
use crate::error::CoreError;
use crate::models::GeneratorConfig;

/// Computes the calendar date on which a series is next due.
///
/// Works purely on dates: the anchor is the series' last materialized
/// occurrence, else its due date, else today. Candidates that land in the
/// past are advanced again until they reach today, so a series that has not
/// been evaluated for weeks resumes at its next sane date instead of
/// replaying every missed occurrence.
#[derive(Debug, Clone)]
pub struct OccurrenceCalculator {
    /// Upper bound on advance steps while catching up to today
    max_advance_steps: u32,
}

impl Default for OccurrenceCalculator {
    fn default() -> Self {
        Self::new(GeneratorConfig::default().max_advance_steps)
    }
}

impl OccurrenceCalculator {
    pub fn new(max_advance_steps: u32) -> Self {
        Self { max_advance_steps }
    }

    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self::new(config.max_advance_steps)
    }

    /// Finds the next occurrence on or after `today`.
    ///
    /// # Returns
    /// * `Ok(Some(date))` - the next due date
    /// * `Ok(None)` - the candidate falls after the rule's end date
    /// * `Err(CoreError::MalformedRule)` - the rule cannot reach `today`
    ///   within the configured number of steps
    ///
    /// Count-based ends are not checked here; they depend on instance counts
    /// only the caller has.
    pub fn next_occurrence(
        &self,
        rule: &RecurrenceRule,
        due_date: Option<NaiveDate>,
        last_recurrence: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Option<NaiveDate>, CoreError> {
        let anchor = last_recurrence.or(due_date).unwrap_or(today);
        let mut candidate = Self::step(rule, anchor)?;

        // Fixed-length periods can skip whole periods at once.
        if candidate < today {
            if let Some(period) = Self::period_days(rule) {
                let periods = (today - candidate).num_days() / period;
                candidate = add_days(candidate, periods * period)?;
            }
        }

        let mut steps = 0u32;
        while candidate < today {
            if steps >= self.max_advance_steps {
                return Err(CoreError::MalformedRule(format!(
                    "no occurrence on or after {} within {} steps of {}",
                    today, self.max_advance_steps, anchor
                )));
            }
            candidate = Self::step(rule, candidate)?;
            steps += 1;
        }

        match rule.end_date() {
            Some(end) if candidate > end => Ok(None),
            _ => Ok(Some(candidate)),
        }
    }

    /// Advances once from `anchor` according to the rule's frequency.
    /// The result is always strictly after `anchor`.
    pub fn step(rule: &RecurrenceRule, anchor: NaiveDate) -> Result<NaiveDate, CoreError> {
        if rule.interval < 1 {
            return Err(CoreError::MalformedRule("interval must be at least 1".to_string()));
        }
        let interval = rule.interval;

        let next = match rule.frequency {
            Frequency::Daily => add_days(anchor, interval as i64)?,
            Frequency::Weekly => {
                let weekdays = rule.weekdays();
                if weekdays.is_empty() {
                    add_days(anchor, 7 * interval as i64)?
                } else {
                    let mut days: Vec<i64> = weekdays
                        .iter()
                        .map(|d| d.num_days_from_sunday() as i64)
                        .collect();
                    days.sort_unstable();
                    let current = anchor.weekday().num_days_from_sunday() as i64;

                    // A weekday equal to the anchor's counts as already done.
                    match days.iter().find(|&&d| d > current) {
                        Some(&d) => add_days(anchor, d - current)?,
                        None => {
                            let week_start = add_days(anchor, -current)?;
                            add_days(week_start, 7 * interval as i64 + days[0])?
                        }
                    }
                }
            }
            Frequency::Monthly => {
                let month = add_months(first_of_month(anchor), interval)?;
                match rule.monthly_pattern() {
                    MonthlyPattern::DayOfMonth(day) => clamp_day(month, day)?,
                    MonthlyPattern::NthWeekday { week, weekday } => {
                        let lookup = |n: u8| {
                            NaiveDate::from_weekday_of_month_opt(month.year(), month.month(), weekday, n)
                        };
                        // Week 5 means "last", which is the 4th when no 5th exists.
                        let resolved = if week >= 5 {
                            lookup(5).or_else(|| lookup(4))
                        } else {
                            lookup(week)
                        };
                        resolved.ok_or_else(|| out_of_range(month))?
                    }
                    MonthlyPattern::AnchorDay => clamp_day(month, anchor.day())?,
                }
            }
            Frequency::Yearly => {
                let months = interval.checked_mul(12).ok_or_else(|| out_of_range(anchor))?;
                let month = add_months(first_of_month(anchor), months)?;
                clamp_day(month, anchor.day())?
            }
        };

        if next <= anchor {
            return Err(CoreError::MalformedRule(format!(
                "rule does not advance past {}",
                anchor
            )));
        }
        Ok(next)
    }

    /// Length in days of one full cycle, for rules whose cycle is fixed.
    fn period_days(rule: &RecurrenceRule) -> Option<i64> {
        match rule.frequency {
            Frequency::Daily => Some(rule.interval as i64),
            Frequency::Weekly => Some(7 * rule.interval as i64),
            Frequency::Monthly | Frequency::Yearly => None,
        }
    }
}

/// Next occurrence using default limits and the current UTC date.
pub fn next_occurrence(
    rule: &RecurrenceRule,
    due_date: Option<NaiveDate>,
    last_recurrence: Option<NaiveDate>,
) -> Result<Option<NaiveDate>, CoreError> {
    OccurrenceCalculator::default().next_occurrence(
        rule,
        due_date,
        last_recurrence,
        Utc::now().date_naive(),
    )
}

/// Number of days in the month containing `date`.
pub fn days_in_month(date: NaiveDate) -> u32 {
    let first = first_of_month(date);
    first
        .checked_add_months(Months::new(1))
        .map(|next| (next - first).num_days() as u32)
        .unwrap_or(31)
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Days::new(date.day0() as u64)
}

fn clamp_day(first: NaiveDate, day: u32) -> Result<NaiveDate, CoreError> {
    let day = day.clamp(1, days_in_month(first));
    first.with_day(day).ok_or_else(|| out_of_range(first))
}

fn add_months(date: NaiveDate, months: u32) -> Result<NaiveDate, CoreError> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| out_of_range(date))
}

fn add_days(date: NaiveDate, days: i64) -> Result<NaiveDate, CoreError> {
    let shifted = if days >= 0 {
        date.checked_add_days(Days::new(days as u64))
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    };
    shifted.ok_or_else(|| out_of_range(date))
}

fn out_of_range(date: NaiveDate) -> CoreError {
    CoreError::MalformedRule(format!("next occurrence after {} is out of calendar range", date))
}
