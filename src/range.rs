use chrono::{Duration, NaiveDate};

/// An inclusive span of calendar days with `end >= start` guaranteed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: i64,
}

/// Builds a valid range from a start date and an optional end date.
///
/// A missing end collapses the range to a single day. An end earlier than
/// the start is clamped to the start rather than rejected.
pub fn normalize(start: NaiveDate, end: Option<NaiveDate>) -> DateRange {
    let end = match end {
        Some(end) if end >= start => end,
        _ => start,
    };
    DateRange {
        start,
        end,
        days: day_diff(end, start) + 1,
    }
}

/// Whole calendar days from `earlier` to `later` (negative when reversed).
pub fn day_diff(later: NaiveDate, earlier: NaiveDate) -> i64 {
    later.signed_duration_since(earlier).num_days()
}

impl DateRange {
    /// Moves the range so it begins on `new_start`, keeping its length.
    /// `None` when the shifted end falls outside the representable dates.
    pub fn shifted_to(&self, new_start: NaiveDate) -> Option<DateRange> {
        let end = new_start.checked_add_signed(Duration::days(self.days - 1))?;
        Some(normalize(new_start, Some(end)))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn overlaps(&self, lo: NaiveDate, hi: NaiveDate) -> bool {
        self.end >= lo && self.start <= hi
    }

    /// Every day of the range, inclusive on both ends.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}
