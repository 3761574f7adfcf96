use std::fmt;

use chrono::{DateTime, Duration, Timelike, Utc};

/// One calendar hour (UTC). Snapshots flushed during the hour share a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RotationWindow {
    start: DateTime<Utc>,
}

impl RotationWindow {
    /// Window containing `now`
    pub fn containing(now: DateTime<Utc>) -> Self {
        Self {
            start: truncate_to_hour(now),
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.start + Duration::hours(1)
    }

    /// `YYYY_MM_DD_HH`, used in file names
    pub fn label(&self) -> String {
        self.start.format("%Y_%m_%d_%H").to_string()
    }
}

impl fmt::Display for RotationWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Truncate a DateTime to the hour boundary.
fn truncate_to_hour(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_minute(0)
        .and_then(|d| d.with_second(0))
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_truncates_to_hour() {
        let now = Utc.with_ymd_and_hms(2026, 2, 12, 14, 37, 12).unwrap()
            + Duration::milliseconds(345);
        let window = RotationWindow::containing(now);
        assert_eq!(
            window.start(),
            Utc.with_ymd_and_hms(2026, 2, 12, 14, 0, 0).unwrap()
        );
        assert_eq!(
            window.end(),
            Utc.with_ymd_and_hms(2026, 2, 12, 15, 0, 0).unwrap()
        );
        assert_eq!(window.label(), "2026_02_12_14");
    }

    #[test]
    fn test_same_hour_same_window() {
        let a = Utc.with_ymd_and_hms(2026, 2, 12, 9, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 2, 12, 9, 59, 59).unwrap();
        let c = Utc.with_ymd_and_hms(2026, 2, 12, 10, 0, 0).unwrap();
        assert_eq!(RotationWindow::containing(a), RotationWindow::containing(b));
        assert_ne!(RotationWindow::containing(b), RotationWindow::containing(c));
    }

    #[test]
    fn test_day_boundary() {
        let late = Utc.with_ymd_and_hms(2026, 2, 12, 23, 59, 59).unwrap();
        assert_eq!(RotationWindow::containing(late).label(), "2026_02_12_23");
        assert_eq!(
            RotationWindow::containing(late + Duration::seconds(1)).label(),
            "2026_02_13_00"
        );
    }
}
