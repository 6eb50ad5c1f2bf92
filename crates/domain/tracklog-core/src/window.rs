use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("window end {end} is not after start {start}")]
pub struct InvalidWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Half-open `[start, end)` time range used to scope pulls of log entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, InvalidWindow> {
        if end <= start {
            return Err(InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// `days` whole calendar days (UTC) starting at midnight of `from`.
    pub fn days(from: NaiveDate, days: u32) -> Result<Self, InvalidWindow> {
        let start = from.and_time(chrono::NaiveTime::MIN).and_utc();
        let end = start
            .checked_add_days(Days::new(u64::from(days)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self::new(start, end)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

/// Effective time range of a log record. A missing end means the record is
/// still in progress and extends indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl Span {
    pub fn new(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn intersects(&self, window: &Window) -> bool {
        self.end.map_or(true, |end| end > window.start) && self.start < window.end
    }
}

/// Remote column names holding a log entity's start and (nullable) end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanColumns {
    pub start: &'static str,
    pub end: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    fn march(day: u32, days: u32) -> Window {
        Window::days(NaiveDate::from_ymd_opt(2024, 3, day).unwrap(), days).unwrap()
    }

    #[test]
    fn window_is_half_open() {
        let w = march(10, 1);
        assert!(Span::new(at(10, 0), Some(at(10, 1))).intersects(&w));
        assert!(!Span::new(at(11, 0), Some(at(11, 2))).intersects(&w));
        assert!(!Span::new(at(9, 20), Some(at(10, 0))).intersects(&w));
    }

    #[test]
    fn open_ended_span_reaches_every_later_window() {
        let running = Span::new(at(5, 8), None);
        assert!(running.intersects(&march(20, 1)));
        assert!(!running.intersects(&march(1, 2)));
    }

    #[test]
    fn span_crossing_the_window_start_intersects() {
        let overnight = Span::new(at(9, 22), Some(at(10, 3)));
        assert!(overnight.intersects(&march(10, 1)));
    }

    #[test]
    fn empty_window_is_rejected() {
        assert!(Window::new(at(2, 0), at(2, 0)).is_err());
        assert!(Window::days(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(), 0).is_err());
    }
}
