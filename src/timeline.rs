use crate::calendar::Month;
use crate::model::{Milestone, Project};
use crate::range::day_diff;

/// Minimum bar width, in percent of the month, so one-day bars stay visible.
pub const DEFAULT_MIN_BAR_WIDTH: f64 = 2.5;

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineBar<'a> {
    pub milestone: &'a Milestone,
    /// Zero-based offset from the first of the month, clamped to the month.
    pub start_index: u32,
    pub end_index: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineRow<'a> {
    pub project: &'a Project,
    pub bars: Vec<TimelineBar<'a>>,
}

/// Horizontal placement of a bar in percent of the month width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarGeometry {
    pub left_pct: f64,
    pub width_pct: f64,
}

/// Builds one row per project, keeping only milestones that overlap `month`.
pub fn project<'a, I>(month: Month, projects: &'a [Project], milestones: I) -> Vec<TimelineRow<'a>>
where
    I: IntoIterator<Item = &'a Milestone>,
{
    let milestones: Vec<&'a Milestone> = milestones.into_iter().collect();
    projects
        .iter()
        .map(|project| TimelineRow {
            project,
            bars: milestones
                .iter()
                .filter(|m| m.project_id == project.id)
                .filter_map(|m| bar_for(month, *m))
                .collect(),
        })
        .collect()
}

pub fn bar_for(month: Month, milestone: &Milestone) -> Option<TimelineBar<'_>> {
    let range = milestone.range();
    let first = month.first_day();
    if !range.overlaps(first, month.last_day()) {
        return None;
    }
    let last_index = month.days() as i64 - 1;
    let start = day_diff(range.start, first).clamp(0, last_index);
    let end = day_diff(range.end, first).clamp(0, last_index);
    Some(TimelineBar {
        milestone,
        start_index: start as u32,
        end_index: end as u32,
    })
}

impl TimelineBar<'_> {
    pub fn geometry(&self, days_in_month: u32, min_width_pct: f64) -> BarGeometry {
        let days = days_in_month.max(1) as f64;
        let span = (self.end_index - self.start_index + 1) as f64;
        BarGeometry {
            left_pct: self.start_index as f64 / days * 100.0,
            width_pct: (span / days * 100.0).max(min_width_pct),
        }
    }
}

impl BarGeometry {
    /// Maps the bar onto a row of `width` character cells as `(first, len)`.
    /// Every bar gets at least one cell.
    pub fn columns(&self, width: u16) -> (u16, u16) {
        if width == 0 {
            return (0, 0);
        }
        let w = width as f64;
        let first = ((self.left_pct / 100.0 * w).floor() as u16).min(width - 1);
        let len = ((self.width_pct / 100.0 * w).round() as u16).max(1);
        (first, len.min(width - first))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn milestone(id: &str, project: &str, start: NaiveDate, end: Option<NaiveDate>) -> Milestone {
        Milestone {
            id: id.into(),
            title: id.into(),
            date: start,
            end_date: end,
            notes: None,
            project_id: project.into(),
            labels: vec![],
        }
    }

    fn projects() -> Vec<Project> {
        vec![
            Project {
                id: "p1".into(),
                name: "Launch".into(),
                color: "#0ea5e9".into(),
            },
            Project {
                id: "p2".into(),
                name: "Ops".into(),
                color: "#22c55e".into(),
            },
        ]
    }

    #[test]
    fn spanning_milestone_is_clamped_to_both_edges() {
        let m = milestone("long", "p1", d(2025, 1, 20), Some(d(2025, 3, 4)));
        let bar = bar_for(Month::new(2025, 2).unwrap(), &m).unwrap();
        assert_eq!(bar.start_index, 0);
        assert_eq!(bar.end_index, 27);
    }

    #[test]
    fn indices_are_offsets_from_the_first() {
        let m = milestone("beta", "p1", d(2025, 3, 5), Some(d(2025, 3, 10)));
        let bar = bar_for(Month::new(2025, 3).unwrap(), &m).unwrap();
        assert_eq!((bar.start_index, bar.end_index), (4, 9));
    }

    #[test]
    fn boundary_overlap_is_included() {
        let month = Month::new(2025, 3).unwrap();
        let touching = milestone("t", "p1", d(2025, 2, 20), Some(d(2025, 3, 1)));
        let bar = bar_for(month, &touching).unwrap();
        assert_eq!((bar.start_index, bar.end_index), (0, 0));

        let outside = milestone("o", "p1", d(2025, 2, 20), Some(d(2025, 2, 28)));
        assert!(bar_for(month, &outside).is_none());
    }

    #[test]
    fn rows_group_by_project_in_order() {
        let ps = projects();
        let ms = vec![
            milestone("a", "p2", d(2025, 3, 1), None),
            milestone("b", "p1", d(2025, 3, 3), None),
            milestone("c", "p2", d(2025, 4, 3), None),
            milestone("d", "p2", d(2025, 3, 9), None),
        ];
        let rows = project(Month::new(2025, 3).unwrap(), &ps, &ms);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].project.name, "Launch");
        let second: Vec<_> = rows[1].bars.iter().map(|b| b.milestone.id.as_str()).collect();
        assert_eq!(second, vec!["a", "d"]);
    }

    #[test]
    fn geometry_enforces_minimum_width() {
        let m = milestone("one", "p1", d(2025, 3, 31), None);
        let bar = bar_for(Month::new(2025, 3).unwrap(), &m).unwrap();
        let geo = bar.geometry(31, 5.0);
        assert!((geo.left_pct - 30.0 / 31.0 * 100.0).abs() < 1e-9);
        assert_eq!(geo.width_pct, 5.0);

        assert_eq!(geo.columns(40), (38, 2));
    }

    #[test]
    fn full_month_geometry_spans_the_row() {
        let m = milestone("all", "p1", d(2025, 2, 1), Some(d(2025, 2, 28)));
        let bar = bar_for(Month::new(2025, 2).unwrap(), &m).unwrap();
        let geo = bar.geometry(28, DEFAULT_MIN_BAR_WIDTH);
        assert_eq!(geo.left_pct, 0.0);
        assert!((geo.width_pct - 100.0).abs() < 1e-9);
        assert_eq!(geo.columns(40), (0, 40));
    }
}
