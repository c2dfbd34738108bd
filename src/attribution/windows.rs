use chrono::{DateTime, Duration, Utc};

use crate::error::InputError;
use crate::models::Window;

/// Validated request geometry: the range, the interval and the windows that
/// tile `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowPlan {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    interval: Duration,
    windows: Vec<Window>,
}

impl WindowPlan {
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: Duration,
        max_windows: u64,
    ) -> Result<Self, InputError> {
        let interval_secs = interval.num_seconds();
        if interval_secs <= 0 {
            return Err(InputError::NonPositiveInterval {
                secs: interval_secs,
            });
        }
        if end <= start {
            return Err(InputError::EmptyRange { start, end });
        }

        let count = window_count(start, end, interval);
        if count > max_windows {
            return Err(InputError::TooManyWindows {
                count,
                max: max_windows,
            });
        }

        Ok(Self {
            start,
            end,
            interval,
            windows: build_windows(start, end, interval, count),
        })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    /// `floor((at - start) / interval)`, or `None` outside `[start, end)`.
    pub fn index_of(&self, at: DateTime<Utc>) -> Option<usize> {
        if !self.contains(at) {
            return None;
        }
        let elapsed_ms = (at - self.start).num_milliseconds();
        let index = (elapsed_ms / self.interval.num_milliseconds()) as usize;
        // the clamped last window is shorter than `interval`
        Some(index.min(self.windows.len() - 1))
    }

    /// Range handed to the snapshot store: wider than the request on both
    /// sides by whole intervals.
    pub fn fetch_range(&self, lookbehind: i32, lookahead: i32) -> (DateTime<Utc>, DateTime<Utc>) {
        let from = self
            .start
            .checked_sub_signed(self.interval * lookbehind.max(0))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let to = self
            .end
            .checked_add_signed(self.interval * lookahead.max(0))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        (from, to)
    }
}

/// `ceil((end - start) / interval)`.
pub fn window_count(start: DateTime<Utc>, end: DateTime<Utc>, interval: Duration) -> u64 {
    let range_ms = (end - start).num_milliseconds();
    let interval_ms = interval.num_milliseconds();
    if range_ms <= 0 || interval_ms <= 0 {
        return 0;
    }
    let whole = range_ms / interval_ms;
    let partial = i64::from(range_ms % interval_ms != 0);
    (whole + partial) as u64
}

fn build_windows(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    interval: Duration,
    count: u64,
) -> Vec<Window> {
    let mut windows = Vec::with_capacity(count as usize);
    let mut window_start = start;

    while window_start < end {
        let window_end = window_start
            .checked_add_signed(interval)
            .map_or(end, |next| next.min(end));
        windows.push(Window {
            start: window_start,
            end: window_end,
        });
        window_start = window_end;
    }

    windows
}
