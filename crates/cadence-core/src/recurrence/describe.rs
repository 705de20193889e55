use chrono::Weekday;

use super::rule::{EndType, Frequency, MonthlyPattern, RecurrenceRule};

/// Renders a rule as a short phrase for display, e.g.
/// "Every 2 weeks on Mon, Wed" or "Monthly on the 15th until 12/31/2025".
pub fn describe(rule: &RecurrenceRule) -> String {
    let mut text = match (rule.interval, rule.frequency) {
        (1, Frequency::Daily) => "Daily".to_string(),
        (1, Frequency::Weekly) => "Weekly".to_string(),
        (1, Frequency::Monthly) => "Monthly".to_string(),
        (1, Frequency::Yearly) => "Yearly".to_string(),
        (n, frequency) => format!("Every {} {}", n, unit_plural(frequency)),
    };

    match rule.frequency {
        Frequency::Weekly => {
            let mut days = rule.weekdays();
            days.sort_by_key(|d| d.num_days_from_sunday());
            days.dedup();
            if !days.is_empty() {
                let names: Vec<&str> = days.iter().map(|d| short_name(*d)).collect();
                text.push_str(" on ");
                text.push_str(&names.join(", "));
            }
        }
        Frequency::Monthly => match rule.monthly_pattern() {
            MonthlyPattern::DayOfMonth(day) => {
                text.push_str(&format!(" on the {}", ordinal(day)));
            }
            MonthlyPattern::NthWeekday { week, weekday } => {
                text.push_str(&format!(" on the {} {}", week_name(week), long_name(weekday)));
            }
            MonthlyPattern::AnchorDay => {}
        },
        Frequency::Daily | Frequency::Yearly => {}
    }

    match rule.end_type {
        EndType::Never => {}
        EndType::Date => {
            if let Some(end) = rule.end_date {
                text.push_str(&format!(" until {}", end.format("%m/%d/%Y")));
            }
        }
        EndType::Count => {
            if let Some(count) = rule.end_count {
                let unit = if count == 1 { "time" } else { "times" };
                text.push_str(&format!(", {} {}", count, unit));
            }
        }
    }

    text
}

fn unit_plural(frequency: Frequency) -> &'static str {
    match frequency {
        Frequency::Daily => "days",
        Frequency::Weekly => "weeks",
        Frequency::Monthly => "months",
        Frequency::Yearly => "years",
    }
}

fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

fn week_name(week: u8) -> &'static str {
    match week {
        1 => "first",
        2 => "second",
        3 => "third",
        4 => "fourth",
        _ => "last",
    }
}

fn short_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "Sun",
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
    }
}

fn long_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "Sunday",
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
    }
}
