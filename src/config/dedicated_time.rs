use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use std::fs;
use std::path::Path;

/// One dedicated-time window, as seconds since the Unix epoch -- the same
/// time base as `server_time` and every other timestamp in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedicatedWindow {
    pub start: i64,
    pub end: i64,
}

fn parse_datetime(date: &str, time: &str) -> Option<i64> {
    let combined = format!("{date} {time}");
    NaiveDateTime::parse_from_str(&combined, "%m/%d/%Y %H:%M").ok().map(|dt| dt.and_utc().timestamp())
}

/// Parses the dedicated-time file: each line is
/// `MM/DD/YYYY HH:MM MM/DD/YYYY HH:MM`, a start/end pair.
pub fn parse_dedicated_time(path: impl AsRef<Path>) -> Result<Vec<DedicatedWindow>> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| Error::io(path.display().to_string(), e))?;
    parse_dedicated_time_str(&contents)
}

pub fn parse_dedicated_time_str(contents: &str) -> Result<Vec<DedicatedWindow>> {
    let mut windows = Vec::new();
    for (idx, raw_line) in contents.lines().enumerate() {
        let lineno = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 4 {
            return Err(Error::DedicatedTimeFile { line: lineno, reason: format!("expected 4 fields, got {}", fields.len()) });
        }
        let start = parse_datetime(fields[0], fields[1])
            .ok_or_else(|| Error::DedicatedTimeFile { line: lineno, reason: format!("bad start timestamp: {} {}", fields[0], fields[1]) })?;
        let end = parse_datetime(fields[2], fields[3])
            .ok_or_else(|| Error::DedicatedTimeFile { line: lineno, reason: format!("bad end timestamp: {} {}", fields[2], fields[3]) })?;
        if end <= start {
            return Err(Error::DedicatedTimeFile { line: lineno, reason: "end must be after start".to_string() });
        }
        windows.push(DedicatedWindow { start, end });
    }
    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_single_window() {
        let windows = parse_dedicated_time_str("12/25/2026 00:00 12/26/2026 00:00\n").unwrap();
        assert_eq!(windows.len(), 1);
        assert!(windows[0].end > windows[0].start);
    }

    #[test]
    fn rejects_an_inverted_window() {
        let err = parse_dedicated_time_str("12/26/2026 00:00 12/25/2026 00:00\n").unwrap_err();
        assert!(matches!(err, Error::DedicatedTimeFile { .. }));
    }

    #[test]
    fn blank_lines_and_comments_are_skipped() {
        let windows = parse_dedicated_time_str("# comment\n\n01/01/2026 08:00 01/01/2026 17:00\n").unwrap();
        assert_eq!(windows.len(), 1);
    }
}
