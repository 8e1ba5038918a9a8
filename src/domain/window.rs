// Time windows and shift resolution
use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Wire format for window bounds: ISO-8601 local time, millisecond precision, no zone suffix.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("window start {start} is not before end {end}")]
    Empty {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    #[error("shift hour {0} is out of range (0-24)")]
    HourOutOfRange(u32),
    #[error("shift {name} starts and ends at hour {hour}")]
    ZeroLengthShift { name: String, hour: u32 },
    #[error("unknown shift '{0}'")]
    UnknownShift(String),
    #[error("no configured shift covers {0}")]
    NoShift(NaiveDateTime),
}

/// Half-open `[start, end)` interval. Construction enforces `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, WindowError> {
        if start < end {
            Ok(Self { start, end })
        } else {
            Err(WindowError::Empty { start, end })
        }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// Same start, new end. `self` is left untouched.
    pub fn extended_to(&self, end: NaiveDateTime) -> Result<Self, WindowError> {
        Self::new(self.start, end)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} .. {}",
            self.start.format(TIMESTAMP_FORMAT),
            self.end.format(TIMESTAMP_FORMAT)
        )
    }
}

pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Resolve the concrete window of a shift running from `start_hour` to `end_hour`
/// relative to `now`.
///
/// - inside the shift on the same day, the window ends at `now`
/// - otherwise it ends at `end_hour` (hour 24 is the following midnight)
/// - shifts crossing midnight end on the following day
/// - before today's shift start, yesterday's instance of the shift is returned
pub fn resolve_shift_window(
    start_hour: u32,
    end_hour: u32,
    now: NaiveDateTime,
) -> Result<TimeWindow, WindowError> {
    for hour in [start_hour, end_hour] {
        if hour > 24 {
            return Err(WindowError::HourOutOfRange(hour));
        }
    }

    let midnight = now.date().and_time(NaiveTime::MIN);
    let mut start = midnight + Duration::hours(i64::from(start_hour));
    let hour = now.hour();

    let mut end = if start_hour <= hour && hour < end_hour {
        now
    } else {
        midnight + Duration::hours(i64::from(end_hour))
    };

    if end_hour < start_hour {
        end += Duration::days(1);
    }

    if hour < start_hour {
        start -= Duration::days(1);
        end -= Duration::days(1);
    }

    TimeWindow::new(start, end)
}

/// A named production shift, e.g. `shift1` from 08:00 to 16:00.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawShift")]
pub struct Shift {
    name: String,
    start_hour: u32,
    end_hour: u32,
}

#[derive(Deserialize)]
struct RawShift {
    name: String,
    start_hour: u32,
    end_hour: u32,
}

impl TryFrom<RawShift> for Shift {
    type Error = WindowError;

    fn try_from(raw: RawShift) -> Result<Self, Self::Error> {
        Shift::new(raw.name, raw.start_hour, raw.end_hour)
    }
}

impl Shift {
    pub fn new(name: impl Into<String>, start_hour: u32, end_hour: u32) -> Result<Self, WindowError> {
        let name = name.into();
        if start_hour > 23 {
            return Err(WindowError::HourOutOfRange(start_hour));
        }
        if end_hour > 24 {
            return Err(WindowError::HourOutOfRange(end_hour));
        }
        if start_hour == end_hour {
            return Err(WindowError::ZeroLengthShift {
                name,
                hour: start_hour,
            });
        }
        Ok(Self {
            name,
            start_hour,
            end_hour,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start_hour(&self) -> u32 {
        self.start_hour
    }

    pub fn end_hour(&self) -> u32 {
        self.end_hour
    }

    pub fn covers_hour(&self, hour: u32) -> bool {
        if self.start_hour < self.end_hour {
            self.start_hour <= hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }

    pub fn window_at(&self, now: NaiveDateTime) -> Result<TimeWindow, WindowError> {
        resolve_shift_window(self.start_hour, self.end_hour, now)
    }
}

/// Ordered shift definitions, consulted for default windows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftTable {
    shifts: Vec<Shift>,
}

impl Default for ShiftTable {
    fn default() -> Self {
        Self {
            shifts: vec![
                Shift { name: "shift1".into(), start_hour: 8, end_hour: 16 },
                Shift { name: "shift2".into(), start_hour: 16, end_hour: 24 },
                Shift { name: "shift3".into(), start_hour: 0, end_hour: 8 },
            ],
        }
    }
}

impl ShiftTable {
    pub fn new(shifts: Vec<Shift>) -> Self {
        if shifts.is_empty() {
            return Self::default();
        }
        Self { shifts }
    }

    pub fn shifts(&self) -> &[Shift] {
        &self.shifts
    }

    pub fn by_name(&self, name: &str) -> Result<&Shift, WindowError> {
        self.shifts
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| WindowError::UnknownShift(name.to_string()))
    }

    /// The shift whose hours contain `now`.
    pub fn containing(&self, now: NaiveDateTime) -> Result<&Shift, WindowError> {
        let hour = now.hour();
        self.shifts
            .iter()
            .find(|s| s.covers_hour(hour))
            .ok_or(WindowError::NoShift(now))
    }

    /// Default window used when the operator has not chosen one: the current shift so far.
    pub fn default_window(&self, now: NaiveDateTime) -> Result<TimeWindow, WindowError> {
        self.containing(now)?.window_at(now)
    }
}
