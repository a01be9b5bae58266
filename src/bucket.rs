use crate::model::BucketRow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::{Date, Duration, OffsetDateTime, Weekday};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    #[default]
    HourOfDay,
    WeekdayWeekend,
    DayOfWeek,
    IsoWeek,
    Month,
    Quarter,
    Year,
}

impl Granularity {
    pub const ALL: [Granularity; 7] = [
        Self::HourOfDay,
        Self::WeekdayWeekend,
        Self::DayOfWeek,
        Self::IsoWeek,
        Self::Month,
        Self::Quarter,
        Self::Year,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::HourOfDay => "Hours",
            Self::WeekdayWeekend => "Weekdays / weekend",
            Self::DayOfWeek => "Days of week",
            Self::IsoWeek => "Weeks",
            Self::Month => "Months",
            Self::Quarter => "Quarters",
            Self::Year => "Years",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hours" | "hour" => Some(Self::HourOfDay),
            "weekend" | "weekday-weekend" => Some(Self::WeekdayWeekend),
            "weekdays" | "days" => Some(Self::DayOfWeek),
            "weeks" | "week" => Some(Self::IsoWeek),
            "months" | "month" => Some(Self::Month),
            "quarters" | "quarter" => Some(Self::Quarter),
            "years" | "year" => Some(Self::Year),
            _ => None,
        }
    }

    /// Order-preserving key of the bucket holding `at`, read from its wall clock.
    pub fn key(self, at: OffsetDateTime) -> i64 {
        let date = at.date();
        match self {
            Self::HourOfDay => i64::from(at.hour()),
            Self::WeekdayWeekend => i64::from(is_weekend(date.weekday())),
            Self::DayOfWeek => i64::from(date.weekday().number_from_monday()),
            Self::IsoWeek => {
                let (year, week, _) = date.to_iso_week_date();
                i64::from(year) * 100 + i64::from(week)
            }
            Self::Month => month_index_key(date.year(), u8::from(date.month())),
            Self::Quarter => i64::from(date.year()) * 10 + i64::from(quarter_of(date)),
            Self::Year => i64::from(date.year()),
        }
    }

    /// Every bucket that must appear between `since` and `to`, ascending.
    pub fn enumerate(self, since: OffsetDateTime, to: OffsetDateTime) -> Vec<i64> {
        match self {
            Self::HourOfDay => (0..24).collect(),
            Self::WeekdayWeekend => vec![0, 1],
            Self::DayOfWeek => (1..=7).collect(),
            _ if since > to => Vec::new(),
            Self::IsoWeek => {
                let first = iso_monday(since.date());
                (0..=week_diff(since, to))
                    .filter_map(|offset| first.checked_add(Duration::weeks(i64::from(offset))))
                    .map(|monday| {
                        let (year, week, _) = monday.to_iso_week_date();
                        i64::from(year) * 100 + i64::from(week)
                    })
                    .collect()
            }
            Self::Month => {
                let start = i64::from(since.year()) * 12 + i64::from(u8::from(since.month())) - 1;
                (0..=i64::from(month_diff(since, to)))
                    .map(|offset| {
                        let index = start + offset;
                        index.div_euclid(12) * 100 + index.rem_euclid(12) + 1
                    })
                    .collect()
            }
            Self::Quarter => {
                let start = i64::from(since.year()) * 4 + i64::from(quarter_of(since.date())) - 1;
                (0..=i64::from(quarter_diff(since, to)))
                    .map(|offset| {
                        let index = start + offset;
                        index.div_euclid(4) * 10 + index.rem_euclid(4) + 1
                    })
                    .collect()
            }
            Self::Year => (0..=i64::from(year_diff(since, to)))
                .map(|offset| i64::from(since.year()) + offset)
                .collect(),
        }
    }

    pub fn format_key(self, key: i64) -> String {
        match self {
            Self::HourOfDay => format!("{key:02}:00"),
            Self::WeekdayWeekend => String::from(if key == 0 { "Weekday" } else { "Weekend" }),
            Self::DayOfWeek => String::from(match key {
                1 => "Mon",
                2 => "Tue",
                3 => "Wed",
                4 => "Thu",
                5 => "Fri",
                6 => "Sat",
                _ => "Sun",
            }),
            Self::IsoWeek => format!("{}-W{:02}", key / 100, key % 100),
            Self::Month => format!("{}-{:02}", key / 100, key % 100),
            Self::Quarter => format!("{} Q{}", key / 10, key % 10),
            Self::Year => key.to_string(),
        }
    }
}

pub fn month_diff(since: OffsetDateTime, to: OffsetDateTime) -> u32 {
    let months = (i64::from(to.year()) - i64::from(since.year())) * 12
        + i64::from(u8::from(to.month()))
        - i64::from(u8::from(since.month()));
    clamp_diff(months)
}

pub fn week_diff(since: OffsetDateTime, to: OffsetDateTime) -> u32 {
    let days = (iso_monday(to.date()) - iso_monday(since.date())).whole_days();
    clamp_diff(days / 7)
}

pub fn quarter_diff(since: OffsetDateTime, to: OffsetDateTime) -> u32 {
    let quarters = (i64::from(to.year()) - i64::from(since.year())) * 4
        + i64::from(quarter_of(to.date()))
        - i64::from(quarter_of(since.date()));
    clamp_diff(quarters)
}

pub fn year_diff(since: OffsetDateTime, to: OffsetDateTime) -> u32 {
    clamp_diff(i64::from(to.year()) - i64::from(since.year()))
}

/// Unions enumerated placeholders with real rows. A real row replaces the
/// placeholder for its key; output is one row per key, ascending.
pub fn fill_gaps(real: Vec<BucketRow>, enumerated: &[i64]) -> Vec<BucketRow> {
    let mut merged: BTreeMap<i64, BucketRow> = enumerated
        .iter()
        .map(|key| (*key, BucketRow::empty(*key)))
        .collect();
    for row in real {
        merged.insert(row.bucket_key, row);
    }
    merged.into_values().collect()
}

/// Next key after `key` in the contiguous sequence for this granularity.
fn month_index_key(year: i32, month: u8) -> i64 {
    i64::from(year) * 100 + i64::from(month)
}

fn quarter_of(date: Date) -> u8 {
    (u8::from(date.month()) - 1) / 3 + 1
}

fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Saturday | Weekday::Sunday)
}

fn iso_monday(date: Date) -> Date {
    date.checked_sub(Duration::days(i64::from(
        date.weekday().number_days_from_monday(),
    )))
    .unwrap_or(date)
}

fn clamp_diff(diff: i64) -> u32 {
    u32::try_from(diff.max(0)).unwrap_or(u32::MAX)
}
