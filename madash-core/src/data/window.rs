//! Incremental fetch planning from a per-entity watermark.

use chrono::NaiveDate;
use std::fmt;

/// An inclusive date range to request from a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FetchWindow {
    /// Plan the next fetch.
    ///
    /// `last_on_file` is the latest stored date (the watermark). The window
    /// starts the day after it, or at `default_start` when nothing is stored,
    /// and ends at `today`. `None` means the entity is already up to date.
    pub fn plan(
        last_on_file: Option<NaiveDate>,
        default_start: NaiveDate,
        today: NaiveDate,
    ) -> Option<Self> {
        let start = match last_on_file {
            Some(last) => last.succ_opt()?,
            None => default_start,
        };
        (start <= today).then_some(Self { start, end: today })
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for FetchWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}
