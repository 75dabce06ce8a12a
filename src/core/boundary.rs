//! Incremental run boundary
//!
//! Rows committed in the last few minutes may still be invisible to the
//! exporter's snapshot. The boundary stays a safety window behind "now" so
//! such rows fall into the next run instead of being skipped forever.

use chrono::{Duration, Local, NaiveDateTime, Timelike};

/// Default safety window in seconds
pub const DEFAULT_SAFETY_WINDOW_SECS: u64 = 300;

/// Source of the current wall-clock time
pub trait Clock: Send + Sync {
    /// Current local time
    fn now(&self) -> NaiveDateTime;
}

/// Local wall clock, in the same zone as the source's mutation timestamps
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock frozen at a given instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Compute the upper bound of an incremental run
///
/// The result is truncated to whole seconds: it is persisted at second
/// resolution and must equal the query's upper bound exactly.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use invex::core::boundary::compute_boundary;
///
/// let now = NaiveDate::from_ymd_opt(2024, 3, 1)
///     .unwrap()
///     .and_hms_milli_opt(10, 10, 0, 750)
///     .unwrap();
/// let boundary = compute_boundary(now, 300);
/// assert_eq!(boundary.to_string(), "2024-03-01 10:05:00");
/// ```
pub fn compute_boundary(now: NaiveDateTime, safety_window_secs: u64) -> NaiveDateTime {
    let window = Duration::seconds(i64::try_from(safety_window_secs).unwrap_or(i64::MAX / 1000));
    let boundary = now.checked_sub_signed(window).unwrap_or(NaiveDateTime::MIN);
    boundary.with_nanosecond(0).unwrap_or(boundary)
}
