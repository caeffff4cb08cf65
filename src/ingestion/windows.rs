//! Date-window partitioning for the history fetch loop
//!
//! The history endpoint caps how much data one request may span, and the cap
//! depends on the averaging interval: hourly averages allow 14 days per
//! request, everything else 2 days. A requested range is therefore cut into
//! fixed-width windows walked from the range end backwards, so fetching
//! proceeds newest window first and the oldest window absorbs whatever
//! remainder is left once the walk reaches the range begin.

use chrono::{DateTime, Duration, Utc};

use crate::ingestion::types::DateWindow;

/// Nominal window width for a given averaging interval (minutes)
pub fn window_width(average_minutes: u32) -> Duration {
    if average_minutes == 60 {
        Duration::days(14)
    } else {
        Duration::days(2)
    }
}

/// Partition `[begin, end)` into windows, newest first.
///
/// Adjacent windows share a boundary instant, so traversed oldest-to-newest
/// they are contiguous and non-overlapping. The oldest window's start is
/// clipped to `begin`; an empty or inverted range yields no windows.
pub fn build_windows(
    begin: DateTime<Utc>,
    end: DateTime<Utc>,
    average_minutes: u32,
) -> Vec<DateWindow> {
    let width = window_width(average_minutes);
    let mut windows = Vec::new();
    let mut cursor = end;

    while cursor > begin {
        let start = std::cmp::max(begin, cursor - width);
        windows.push(DateWindow { start, end: cursor });
        cursor = start;
    }

    windows
}
