use crate::clock::Clock;
use crate::model::Milestone;
use crate::range::normalize;
use anyhow::{anyhow, Result};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A calendar month, the unit of navigation for both views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Month { year, month })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Month {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.succ()
            .first_day()
            .pred_opt()
            .unwrap_or_else(|| self.first_day())
    }

    pub fn days(&self) -> u32 {
        self.last_day().day()
    }

    pub fn succ(&self) -> Month {
        if self.month == 12 {
            Month {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Month {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn pred(&self) -> Month {
        if self.month == 1 {
            Month {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Month {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim();
        let (year, month) = raw
            .split_once('-')
            .ok_or_else(|| anyhow!("invalid month (use YYYY-MM): {}", raw))?;
        let year: i32 = year
            .parse()
            .map_err(|_| anyhow!("invalid year in month: {}", raw))?;
        let month: u32 = month
            .parse()
            .map_err(|_| anyhow!("invalid month number: {}", raw))?;
        Month::new(year, month).ok_or_else(|| anyhow!("month out of range: {}", raw))
    }
}

/// One cell of the month grid.
#[derive(Debug, Clone)]
pub struct CalendarDay<'a> {
    pub date: NaiveDate,
    pub in_month: bool,
    pub is_today: bool,
    pub milestones: Vec<&'a Milestone>,
}

#[derive(Debug, Clone)]
pub struct CalendarGrid<'a> {
    pub month: Month,
    pub week_start: Weekday,
    pub days: Vec<CalendarDay<'a>>,
}

impl<'a> CalendarGrid<'a> {
    pub fn weeks(&self) -> impl Iterator<Item = &[CalendarDay<'a>]> {
        self.days.chunks(7)
    }

    pub fn day(&self, date: NaiveDate) -> Option<&CalendarDay<'a>> {
        self.days.iter().find(|d| d.date == date)
    }
}

fn days_from_week_start(day: Weekday, week_start: Weekday) -> i64 {
    let day = day.num_days_from_monday() as i64;
    let start = week_start.num_days_from_monday() as i64;
    (day - start).rem_euclid(7)
}

/// First and last visible day: whole weeks covering the month.
pub fn grid_bounds(month: Month, week_start: Weekday) -> (NaiveDate, NaiveDate) {
    let first = month.first_day();
    let last = month.last_day();
    let lead = days_from_week_start(first.weekday(), week_start);
    let trail = 6 - days_from_week_start(last.weekday(), week_start);
    let start = first
        .checked_sub_signed(Duration::days(lead))
        .unwrap_or(first);
    let end = last.checked_add_signed(Duration::days(trail)).unwrap_or(last);
    (start, end)
}

/// Milestones per visible day, in input order. Days without milestones
/// are absent from the map.
pub fn day_buckets<'a, I>(
    month: Month,
    week_start: Weekday,
    milestones: I,
) -> BTreeMap<NaiveDate, Vec<&'a Milestone>>
where
    I: IntoIterator<Item = &'a Milestone>,
{
    let (grid_start, grid_end) = grid_bounds(month, week_start);
    let mut buckets: BTreeMap<NaiveDate, Vec<&'a Milestone>> = BTreeMap::new();
    for milestone in milestones {
        let range = milestone.range();
        if !range.overlaps(grid_start, grid_end) {
            continue;
        }
        let visible = range
            .dates()
            .skip_while(|d| *d < grid_start)
            .take_while(|d| *d <= grid_end);
        for date in visible {
            buckets.entry(date).or_default().push(milestone);
        }
    }
    buckets
}

pub fn project<'a, I>(
    month: Month,
    week_start: Weekday,
    milestones: I,
    clock: &dyn Clock,
) -> CalendarGrid<'a>
where
    I: IntoIterator<Item = &'a Milestone>,
{
    let today = clock.today();
    let (start, end) = grid_bounds(month, week_start);
    let mut buckets = day_buckets(month, week_start, milestones);
    let days = normalize(start, Some(end))
        .dates()
        .map(|date| CalendarDay {
            date,
            in_month: month.contains(date),
            is_today: date == today,
            milestones: buckets.remove(&date).unwrap_or_default(),
        })
        .collect();
    CalendarGrid {
        month,
        week_start,
        days,
    }
}

/// Column headings in grid order.
pub fn weekday_headings(week_start: Weekday) -> Vec<&'static str> {
    let names = ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];
    let offset = week_start.num_days_from_monday() as usize;
    (0..7).map(|i| names[(i + offset) % 7]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use pretty_assertions::assert_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn milestone(id: &str, start: NaiveDate, end: Option<NaiveDate>) -> Milestone {
        Milestone {
            id: id.into(),
            title: id.into(),
            date: start,
            end_date: end,
            notes: None,
            project_id: "p".into(),
            labels: vec![],
        }
    }

    #[test]
    fn month_arithmetic() {
        let feb = Month::new(2024, 2).unwrap();
        assert_eq!(feb.days(), 29);
        assert_eq!(Month::new(2025, 2).unwrap().days(), 28);
        assert_eq!(Month::new(2024, 12).unwrap().succ(), Month::new(2025, 1).unwrap());
        assert_eq!(Month::new(2025, 1).unwrap().pred(), Month::new(2024, 12).unwrap());
        assert_eq!("2025-03".parse::<Month>().unwrap(), Month::new(2025, 3).unwrap());
        assert!("2025-13".parse::<Month>().is_err());
        assert!("March".parse::<Month>().is_err());
        assert_eq!(Month::new(2025, 3).unwrap().to_string(), "2025-03");
    }

    #[test]
    fn grid_covers_whole_weeks_sunday_first() {
        // March 2025 starts on a Saturday and ends on a Monday.
        let (start, end) = grid_bounds(Month::new(2025, 3).unwrap(), Weekday::Sun);
        assert_eq!(start, d(2025, 2, 23));
        assert_eq!(end, d(2025, 4, 5));
    }

    #[test]
    fn grid_respects_monday_start() {
        let (start, end) = grid_bounds(Month::new(2025, 3).unwrap(), Weekday::Mon);
        assert_eq!(start, d(2025, 2, 24));
        assert_eq!(end, d(2025, 4, 6));
        assert_eq!(weekday_headings(Weekday::Sun)[0], "Su");
        assert_eq!(weekday_headings(Weekday::Mon)[6], "Su");
    }

    #[test]
    fn multi_day_milestone_lands_in_each_bucket_once() {
        let ms = vec![milestone("a", d(2025, 1, 1), Some(d(2025, 1, 3)))];
        let buckets = day_buckets(Month::new(2025, 1).unwrap(), Weekday::Sun, &ms);
        let dates: Vec<_> = buckets.keys().copied().collect();
        assert_eq!(dates, vec![d(2025, 1, 1), d(2025, 1, 2), d(2025, 1, 3)]);
        for list in buckets.values() {
            assert_eq!(list.len(), 1);
        }
    }

    #[test]
    fn buckets_keep_input_order() {
        let ms = vec![
            milestone("late", d(2025, 1, 2), None),
            milestone("early", d(2025, 1, 1), Some(d(2025, 1, 2))),
        ];
        let buckets = day_buckets(Month::new(2025, 1).unwrap(), Weekday::Sun, &ms);
        let ids: Vec<_> = buckets[&d(2025, 1, 2)].iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["late", "early"]);
    }

    #[test]
    fn outside_days_are_flagged_but_filled() {
        let ms = vec![milestone("spill", d(2025, 2, 24), Some(d(2025, 3, 2)))];
        let clock = FixedClock(d(2025, 3, 2));
        let grid = project(Month::new(2025, 3).unwrap(), Weekday::Sun, &ms, &clock);
        assert_eq!(grid.days.len(), 42);
        assert_eq!(grid.weeks().count(), 6);

        let feb = grid.day(d(2025, 2, 24)).unwrap();
        assert!(!feb.in_month);
        assert_eq!(feb.milestones.len(), 1);

        let today = grid.day(d(2025, 3, 2)).unwrap();
        assert!(today.in_month);
        assert!(today.is_today);
        assert_eq!(grid.days.iter().filter(|d| d.is_today).count(), 1);

        // Days before the grid are never materialized.
        assert!(grid.day(d(2025, 2, 22)).is_none());
    }

    #[test]
    fn long_milestone_is_bounded_to_the_grid() {
        let ms = vec![milestone("year", d(2020, 1, 1), Some(d(2030, 1, 1)))];
        let buckets = day_buckets(Month::new(2025, 3).unwrap(), Weekday::Sun, &ms);
        assert_eq!(buckets.len(), 42);
    }
}
