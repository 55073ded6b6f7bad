use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Present,
    Absent,
    Late,
}

impl Status {
    /// Exact match on the stored spelling; anything else is unmarked.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Present" => Some(Self::Present),
            "Absent" => Some(Self::Absent),
            "Late" => Some(Self::Late),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "Present",
            Self::Absent => "Absent",
            Self::Late => "Late",
        }
    }

    /// Calendar tap order: unmarked -> Present -> Absent -> Late -> unmarked.
    pub fn cycle(current: Option<Status>) -> Option<Status> {
        match current {
            None => Some(Self::Present),
            Some(Self::Present) => Some(Self::Absent),
            Some(Self::Absent) => Some(Self::Late),
            Some(Self::Late) => None,
        }
    }
}

/// ISO date (`YYYY-MM-DD`) to status. Missing keys are unmarked days.
pub type AttendanceRecord = BTreeMap<String, Status>;

/// Build a record from raw stored pairs, dropping values that are not a
/// known status.
pub fn record_from_raw<I, K, V>(raw: I) -> AttendanceRecord
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: AsRef<str>,
{
    raw.into_iter()
        .filter_map(|(date, status)| Status::parse(status.as_ref()).map(|s| (date.into(), s)))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    AllTime,
    Month { year: i32, month: u32 },
}

impl Scope {
    /// Accepts `YYYY-MM`.
    pub fn parse_month(s: &str) -> Option<Self> {
        let (y, m) = s.trim().split_once('-')?;
        if y.len() != 4 || m.len() != 2 {
            return None;
        }
        let year = y.parse::<i32>().ok()?;
        let month = m.parse::<u32>().ok()?;
        if !(1..=12).contains(&month) {
            return None;
        }
        Some(Self::Month { year, month })
    }

    pub fn contains(&self, date: &str) -> bool {
        match *self {
            Scope::AllTime => true,
            Scope::Month { year, month } => {
                date.starts_with(&format!("{:04}-{:02}-", year, month))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceSummary {
    pub present: u32,
    pub absent: u32,
    pub late: u32,
    pub total: u32,
    pub percent: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthLayout {
    pub year: i32,
    pub month: u32,
    pub days_in_month: u32,
    /// Weekday of day 1, 0 = Sunday.
    pub first_weekday: u32,
}

/// `None` for a month outside 1..=12.
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some(next.pred_opt()?.day())
}

pub fn month_layout(year: i32, month: u32) -> Option<MonthLayout> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    Some(MonthLayout {
        year,
        month,
        days_in_month: days_in_month(year, month)?,
        first_weekday: first.weekday().num_days_from_sunday(),
    })
}

/// Every ISO date of the month, day 1 first.
pub fn month_dates(year: i32, month: u32) -> Vec<String> {
    (1..=days_in_month(year, month).unwrap_or(0))
        .map(|d| format!("{:04}-{:02}-{:02}", year, month, d))
        .collect()
}

pub fn is_iso_date(s: &str) -> bool {
    s.len() == 10 && NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

pub fn aggregate(record: &AttendanceRecord, scope: Scope) -> AttendanceSummary {
    let mut summary = AttendanceSummary::default();
    for (date, status) in record {
        if !scope.contains(date) {
            continue;
        }
        match status {
            Status::Present => summary.present += 1,
            Status::Absent => summary.absent += 1,
            Status::Late => summary.late += 1,
        }
    }
    summary.total = summary.present + summary.absent + summary.late;
    summary.percent = attendance_percent(summary.present, summary.absent);
    summary
}

/// Late days are left out of the denominator.
pub fn attendance_percent(present: u32, absent: u32) -> u32 {
    let counted = present + absent;
    if counted == 0 {
        return 0;
    }
    ((present as f64 / counted as f64) * 100.0 + 0.5).floor() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(entries: &[(&str, Status)]) -> AttendanceRecord {
        entries
            .iter()
            .map(|(d, s)| (d.to_string(), *s))
            .collect()
    }

    #[test]
    fn cycle_walks_all_states() {
        let mut s = None;
        let mut seen = Vec::new();
        for _ in 0..4 {
            s = Status::cycle(s);
            seen.push(s);
        }
        assert_eq!(
            seen,
            vec![
                Some(Status::Present),
                Some(Status::Absent),
                Some(Status::Late),
                None
            ]
        );
    }

    #[test]
    fn raw_values_outside_status_set_are_unmarked() {
        let r = record_from_raw(vec![
            ("2024-01-01", "Present"),
            ("2024-01-02", ""),
            ("2024-01-03", "present"),
            ("2024-01-04", "Excused"),
        ]);
        assert_eq!(r.len(), 1);
        assert_eq!(aggregate(&r, Scope::AllTime).total, 1);
    }

    #[test]
    fn month_scope_only_counts_that_month() {
        let r = record(&[
            ("2024-01-31", Status::Present),
            ("2024-02-01", Status::Absent),
            ("2024-02-29", Status::Late),
        ]);
        let feb = aggregate(&r, Scope::Month { year: 2024, month: 2 });
        assert_eq!((feb.present, feb.absent, feb.late, feb.total), (0, 1, 1, 2));
        assert_eq!(feb.percent, 0);
        let all = aggregate(&r, Scope::AllTime);
        assert_eq!(all.total, 3);
        assert_eq!(all.percent, 50);
    }

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(attendance_percent(2, 1), 67);
        assert_eq!(attendance_percent(1, 2), 33);
        assert_eq!(attendance_percent(1, 7), 13);
        assert_eq!(attendance_percent(0, 0), 0);
    }

    #[test]
    fn month_layout_for_calendar() {
        let feb = month_layout(2024, 2).expect("layout");
        assert_eq!(feb.days_in_month, 29);
        // 2024-02-01 was a Thursday.
        assert_eq!(feb.first_weekday, 4);
        assert_eq!(month_dates(2023, 2).len(), 28);
        assert!(month_layout(2024, 13).is_none());
    }

    #[test]
    fn month_lengths_follow_the_calendar() {
        assert_eq!(days_in_month(2024, 2), Some(29));
        assert_eq!(days_in_month(1900, 2), Some(28));
        assert_eq!(days_in_month(2000, 2), Some(29));
        assert_eq!(days_in_month(2024, 4), Some(30));
        assert_eq!(days_in_month(2024, 12), Some(31));
        assert_eq!(days_in_month(2024, 0), None);
        assert_eq!(days_in_month(2024, 13), None);
        assert!(month_dates(2024, 13).is_empty());
    }

    #[test]
    fn scope_parses_year_month() {
        assert_eq!(
            Scope::parse_month("2024-09"),
            Some(Scope::Month {
                year: 2024,
                month: 9
            })
        );
        assert_eq!(Scope::parse_month("2024-9"), None);
        assert_eq!(Scope::parse_month("2024-13"), None);
        assert_eq!(Scope::parse_month("09"), None);
    }
}
