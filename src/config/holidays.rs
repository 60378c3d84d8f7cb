use crate::error::{Error, Result};
use chrono::{Datelike, TimeZone, Timelike, Utc};
use std::fs;
use std::path::Path;

/// One day-of-week's prime/non-prime boundary, in minutes since midnight.
/// `None` means "all day" (`all`) or "never" (`none`) per the file format.
#[derive(Debug, Clone, Copy, Default)]
pub struct DayBoundary {
    pub prime_start: Option<u32>,
    pub nonprime_start: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct WeekSchedule {
    pub sunday: DayBoundary,
    pub monday: DayBoundary,
    pub tuesday: DayBoundary,
    pub wednesday: DayBoundary,
    pub thursday: DayBoundary,
    pub friday: DayBoundary,
    pub saturday: DayBoundary,
}

impl WeekSchedule {
    fn set(&mut self, day: &str, boundary: DayBoundary) -> bool {
        match day {
            "sunday" => self.sunday = boundary,
            "monday" => self.monday = boundary,
            "tuesday" => self.tuesday = boundary,
            "wednesday" => self.wednesday = boundary,
            "thursday" => self.thursday = boundary,
            "friday" => self.friday = boundary,
            "saturday" => self.saturday = boundary,
            "weekday" => {
                self.monday = boundary;
                self.tuesday = boundary;
                self.wednesday = boundary;
                self.thursday = boundary;
                self.friday = boundary;
            }
            _ => return false,
        }
        true
    }
}

/// A holiday: the Julian day number it falls on, plus that day's boundary
/// override (falls back to the week schedule's rule when absent).
#[derive(Debug, Clone, Copy)]
pub struct Holiday {
    pub julian_day: u32,
    pub boundary: Option<DayBoundary>,
}

#[derive(Debug, Clone, Default)]
pub struct HolidaysFile {
    pub year: u32,
    pub week: WeekSchedule,
    pub holidays: Vec<Holiday>,
}

impl HolidaysFile {
    /// The boundary in effect for a given day: the holiday override if
    /// `julian_day` is listed (a holiday with no override runs nonprime all
    /// day), otherwise the week schedule's rule for `weekday`.
    fn boundary_for(&self, julian_day: u32, weekday: chrono::Weekday) -> DayBoundary {
        if let Some(h) = self.holidays.iter().find(|h| h.julian_day == julian_day) {
            return h.boundary.unwrap_or(DayBoundary { prime_start: None, nonprime_start: Some(0) });
        }
        match weekday {
            chrono::Weekday::Mon => self.week.monday,
            chrono::Weekday::Tue => self.week.tuesday,
            chrono::Weekday::Wed => self.week.wednesday,
            chrono::Weekday::Thu => self.week.thursday,
            chrono::Weekday::Fri => self.week.friday,
            chrono::Weekday::Sat => self.week.saturday,
            chrono::Weekday::Sun => self.week.sunday,
        }
    }

    fn minute_is_prime(boundary: DayBoundary, minute: u32) -> bool {
        match (boundary.prime_start, boundary.nonprime_start) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(ps), Some(ns)) if ps <= ns => minute >= ps && minute < ns,
            (Some(ps), Some(ns)) => minute >= ps || minute < ns,
        }
    }

    /// Whether `t` (seconds since the Unix epoch, UTC) falls in prime time.
    pub fn is_prime_time(&self, t: i64) -> bool {
        let Some(dt) = Utc.timestamp_opt(t, 0).single() else { return true };
        let minute = dt.time().num_seconds_from_midnight() / 60;
        Self::minute_is_prime(self.boundary_for(dt.ordinal(), dt.weekday()), minute)
    }

    /// The next prime<->nonprime transition strictly after `t`, scanning
    /// forward a day at a time. `None` if the week schedule never
    /// transitions within a year's lookahead.
    pub fn next_transition(&self, t: i64) -> Option<i64> {
        let dt = Utc.timestamp_opt(t, 0).single()?;
        let mut date = dt.date_naive();
        let mut minute = dt.time().num_seconds_from_midnight() / 60;

        for _ in 0..370 {
            let boundary = self.boundary_for(date.ordinal(), date.weekday());
            let mut next_minute = None;
            for candidate in [boundary.prime_start, boundary.nonprime_start].into_iter().flatten() {
                if candidate > minute {
                    next_minute = Some(next_minute.map_or(candidate, |n: u32| n.min(candidate)));
                }
            }
            if let Some(m) = next_minute {
                let midnight = date.and_hms_opt(0, 0, 0)?.and_utc().timestamp();
                return Some(midnight + m as i64 * 60);
            }
            date = date.succ_opt()?;
            minute = 0;
        }
        None
    }
}

fn parse_hhmm_or_sentinel(token: &str) -> Result<Option<u32>> {
    match token {
        "all" => Ok(Some(0)),
        "none" => Ok(None),
        hhmm if hhmm.len() == 4 && hhmm.chars().all(|c| c.is_ascii_digit()) => {
            let hh: u32 = hhmm[0..2].parse().unwrap();
            let mm: u32 = hhmm[2..4].parse().unwrap();
            Ok(Some(hh * 60 + mm))
        }
        other => Err(Error::HolidaysFile { line: 0, reason: format!("bad time token: {other}") }),
    }
}

/// Parses a holidays file (UNICOS-8 format) -- a `HOLIDAYFILE_VERSION1`
/// header, a `YEAR <yyyy>` line, per-weekday prime/non-prime boundary
/// lines, then holiday lines keyed by Julian day number.
pub fn parse_holidays(path: impl AsRef<Path>) -> Result<HolidaysFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| Error::io(path.display().to_string(), e))?;
    parse_holidays_str(&contents)
}

pub fn parse_holidays_str(contents: &str) -> Result<HolidaysFile> {
    let mut file = HolidaysFile::default();
    let mut seen_header = false;
    let mut seen_year = false;

    for (idx, raw_line) in contents.lines().enumerate() {
        let lineno = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('*') {
            continue;
        }

        if !seen_header {
            if !line.starts_with("HOLIDAYFILE_VERSION1") {
                return Err(Error::HolidaysFile { line: lineno, reason: "expected HOLIDAYFILE_VERSION1 header".to_string() });
            }
            seen_header = true;
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if !seen_year {
            if fields.len() != 2 || fields[0] != "YEAR" {
                return Err(Error::HolidaysFile { line: lineno, reason: "expected YEAR <yyyy>".to_string() });
            }
            file.year = fields[1].parse().map_err(|_| Error::HolidaysFile { line: lineno, reason: "bad year".to_string() })?;
            seen_year = true;
            continue;
        }

        if fields.len() == 3 && fields[0].chars().next().is_some_and(|c| c.is_alphabetic()) {
            let prime_start = parse_hhmm_or_sentinel(fields[1]).map_err(|_| Error::HolidaysFile { line: lineno, reason: "bad prime start".to_string() })?;
            let nonprime_start =
                parse_hhmm_or_sentinel(fields[2]).map_err(|_| Error::HolidaysFile { line: lineno, reason: "bad non-prime start".to_string() })?;
            let boundary = DayBoundary { prime_start, nonprime_start };
            if !file.week.set(fields[0], boundary) {
                return Err(Error::HolidaysFile { line: lineno, reason: format!("unknown day name: {}", fields[0]) });
            }
            continue;
        }

        // Holiday line: julian day number, optionally followed by a boundary override.
        let julian_day: u32 = fields
            .first()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| Error::HolidaysFile { line: lineno, reason: "expected a Julian day number".to_string() })?;
        let boundary = if fields.len() >= 3 {
            let prime_start = parse_hhmm_or_sentinel(fields[1]).ok();
            let nonprime_start = parse_hhmm_or_sentinel(fields[2]).ok();
            Some(DayBoundary { prime_start: prime_start.flatten(), nonprime_start: nonprime_start.flatten() })
        } else {
            None
        };
        file.holidays.push(Holiday { julian_day, boundary });
    }

    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_holidays_file() {
        let src = "HOLIDAYFILE_VERSION1\nYEAR 2026\nweekday 0600 1730\nsaturday all none\nsunday none none\n1\n359\n";
        let file = parse_holidays_str(src).unwrap();
        assert_eq!(file.year, 2026);
        assert_eq!(file.week.monday.prime_start, Some(6 * 60));
        assert_eq!(file.week.saturday.prime_start, Some(0));
        assert_eq!(file.week.sunday.nonprime_start, None);
        assert_eq!(file.holidays.len(), 2);
        assert_eq!(file.holidays[0].julian_day, 1);
    }

    #[test]
    fn computes_prime_time_and_next_transition_from_week_schedule() {
        let file = parse_holidays_str("HOLIDAYFILE_VERSION1\nYEAR 2024\nweekday 0600 1730\nsaturday all none\nsunday none none\n").unwrap();
        let morning = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(7, 0, 0).unwrap().and_utc().timestamp();
        assert!(file.is_prime_time(morning));

        let transition = file.next_transition(morning).unwrap();
        let expected = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(17, 30, 0).unwrap().and_utc().timestamp();
        assert_eq!(transition, expected);
    }

    #[test]
    fn holiday_with_no_override_runs_nonprime_all_day() {
        let file = parse_holidays_str("HOLIDAYFILE_VERSION1\nYEAR 2024\nweekday 0600 1730\n1\n").unwrap();
        let noon = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(12, 0, 0).unwrap().and_utc().timestamp();
        assert!(!file.is_prime_time(noon));
    }

    #[test]
    fn rejects_a_file_missing_the_version_header() {
        let err = parse_holidays_str("YEAR 2026\n").unwrap_err();
        assert!(matches!(err, Error::HolidaysFile { .. }));
    }
}
