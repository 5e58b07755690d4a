//! Free-text clock labels ("5pm - 7pm", "10 - 11am", "11pm – 1am") to
//! concrete venue-local date-times.
//!
//! Meridiem inference is deliberately simple: an unmarked side borrows the
//! marker of the other side, and a range with no marker at all is read as
//! morning. Ranges that cross noon without a marker ("11 - 1") therefore
//! come out wrong; the schedule data has only ever been checked against
//! this rule.

use std::sync::LazyLock;

use chrono::{Days, Duration, NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::parser::ParseError;
use crate::types::TimeRange;

static RE_CLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,2})(?::(\d{2}))?\s*(am|pm)?").expect("invalid regex: clock")
});

static RE_TWO_NUMBERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d.*?\s+\d").expect("invalid regex: two numbers"));

static RE_MISSING_HYPHEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?::\d+)?\s*(?:[ap]m?)?)\s+(\d+)").expect("invalid regex: missing hyphen")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Meridiem {
    Am,
    Pm,
}

/// A 12-hour clock reading as written in a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTime {
    pub hour: u32,
    pub minute: u32,
    pub meridiem: Option<Meridiem>,
}

impl ClockTime {
    fn hour_of_day(&self, meridiem: Option<Meridiem>) -> u32 {
        match meridiem {
            Some(Meridiem::Pm) if self.hour < 12 => self.hour + 12,
            Some(Meridiem::Am) if self.hour == 12 => 0,
            _ => self.hour,
        }
    }

    fn on(&self, date: NaiveDate, meridiem: Option<Meridiem>) -> Result<NaiveDateTime, ParseError> {
        let hour = self.hour_of_day(meridiem);
        date.and_hms_opt(hour, self.minute, 0).ok_or_else(|| {
            ParseError::TimeRange(format!("Invalid time: {}:{:02}", hour, self.minute))
        })
    }
}

/// Parses the first clock reading found in `text`, e.g. `"5:00 pm"` or `"10"`.
pub fn parse_time_components(text: &str) -> Option<ClockTime> {
    let caps = RE_CLOCK.captures(text)?;
    let hour = caps[1].parse().ok()?;
    let minute = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;
    let meridiem = caps.get(3).map(|m| {
        if m.as_str().eq_ignore_ascii_case("pm") {
            Meridiem::Pm
        } else {
            Meridiem::Am
        }
    });

    Some(ClockTime {
        hour,
        minute,
        meridiem,
    })
}

fn normalize_range_text(raw: &str) -> String {
    let clean = raw
        .replace(['\n', '\r'], "")
        .replace(['\u{2013}', '\u{2014}'], "-")
        .trim()
        .to_string();

    if !clean.contains('-') && RE_TWO_NUMBERS.is_match(&clean) {
        RE_MISSING_HYPHEN.replace(&clean, "$1 - $2").into_owned()
    } else {
        clean
    }
}

/// Resolves a time label such as `"5pm - 7pm"` against the calendar day the
/// row belongs to.
///
/// A missing end defaults to one hour after the start, and an end that lands
/// before the start is moved to the following day.
pub fn parse_time_range(base_date: NaiveDate, raw: &str) -> Result<TimeRange, ParseError> {
    let clean = normalize_range_text(raw);
    let mut parts = clean.splitn(2, '-').map(str::trim);

    let start = parts
        .next()
        .and_then(parse_time_components)
        .ok_or_else(|| ParseError::TimeRange(format!("No start time in '{}'", raw.trim())))?;
    let end = parts
        .next()
        .filter(|s| !s.is_empty())
        .and_then(parse_time_components);

    let (start_meridiem, end_meridiem) = match (start.meridiem, end.and_then(|e| e.meridiem)) {
        (None, None) => (Some(Meridiem::Am), Some(Meridiem::Am)),
        (Some(m), None) => (Some(m), Some(m)),
        (None, Some(m)) => (Some(m), Some(m)),
        (s, e) => (s, e),
    };

    let start_dt = start.on(base_date, start_meridiem)?;
    let mut end_dt = match end {
        Some(end) => end.on(base_date, end_meridiem)?,
        None => start_dt + Duration::hours(1),
    };

    if end_dt < start_dt {
        end_dt = end_dt + Days::new(1);
    }

    Ok(TimeRange {
        start: start_dt,
        end: end_dt,
    })
}

/// Formats a local date-time as `YYYY-MM-DDTHH:mm:ss`, without an offset.
pub fn to_local_iso(dt: &NaiveDateTime) -> String {
    dt.format(crate::types::local_iso::FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 10).unwrap()
    }

    fn at(date: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
        date.and_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_parse_time_components() {
        assert_eq!(
            parse_time_components("5:30 pm"),
            Some(ClockTime {
                hour: 5,
                minute: 30,
                meridiem: Some(Meridiem::Pm)
            })
        );
        assert_eq!(
            parse_time_components("10"),
            Some(ClockTime {
                hour: 10,
                minute: 0,
                meridiem: None
            })
        );
        assert_eq!(
            parse_time_components("7AM").and_then(|c| c.meridiem),
            Some(Meridiem::Am)
        );
        assert_eq!(parse_time_components("TBA"), None);
        assert_eq!(parse_time_components(""), None);
    }

    #[test]
    fn test_parse_explicit_range() {
        let range = parse_time_range(day(), "5:00pm - 7:30pm").expect("Should parse");
        assert_eq!(range.start, at(day(), 17, 0));
        assert_eq!(range.end, at(day(), 19, 30));
    }

    #[test]
    fn test_meridiem_inferred_from_end() {
        let range = parse_time_range(day(), "10 - 11am").expect("Should parse");
        assert_eq!(range.start, at(day(), 10, 0));
        assert_eq!(range.end, at(day(), 11, 0));
    }

    #[test]
    fn test_meridiem_inferred_from_start() {
        let range = parse_time_range(day(), "5pm - 7").expect("Should parse");
        assert_eq!(range.start, at(day(), 17, 0));
        assert_eq!(range.end, at(day(), 19, 0));
    }

    #[test]
    fn test_meridiem_defaults_to_morning() {
        let range = parse_time_range(day(), "9 - 10").expect("Should parse");
        assert_eq!(range.start, at(day(), 9, 0));
        assert_eq!(range.end, at(day(), 10, 0));
    }

    #[test]
    fn test_unmarked_noon_crossing_keeps_heuristic() {
        // "11 - 1" reads as 11am to 1am the next day, not 11am to 1pm.
        let range = parse_time_range(day(), "11 - 1").expect("Should parse");
        assert_eq!(range.start, at(day(), 11, 0));
        assert_eq!(range.end, at(day().succ_opt().unwrap(), 1, 0));
    }

    #[test]
    fn test_overnight_range_rolls_to_next_day() {
        let range = parse_time_range(day(), "11pm - 1am").expect("Should parse");
        assert_eq!(range.start, at(day(), 23, 0));
        assert_eq!(range.end, at(day().succ_opt().unwrap(), 1, 0));
    }

    #[test]
    fn test_twelve_oclock_edges() {
        let noon = parse_time_range(day(), "12pm - 1pm").expect("Should parse");
        assert_eq!(noon.start.hour(), 12);
        assert_eq!(noon.end.hour(), 13);

        let midnight = parse_time_range(day(), "12am - 2am").expect("Should parse");
        assert_eq!(midnight.start, at(day(), 0, 0));
        assert_eq!(midnight.end, at(day(), 2, 0));
    }

    #[test]
    fn test_dash_variants_and_newlines() {
        let en = parse_time_range(day(), "6:00 am\u{2013}7:00 am").expect("Should parse en dash");
        let em = parse_time_range(day(), "6:00 am \u{2014} 7:00 am").expect("Should parse em dash");
        let nl = parse_time_range(day(), "6:00 am -\n7:00 am").expect("Should parse newline");

        for range in [en, em, nl] {
            assert_eq!(range.start, at(day(), 6, 0));
            assert_eq!(range.end, at(day(), 7, 0));
        }
    }

    #[test]
    fn test_missing_hyphen_is_synthesized() {
        let range = parse_time_range(day(), "5pm 7pm").expect("Should parse");
        assert_eq!(range.start, at(day(), 17, 0));
        assert_eq!(range.end, at(day(), 19, 0));

        let with_minutes = parse_time_range(day(), "8:15 am 9:45 am").expect("Should parse");
        assert_eq!(with_minutes.start, at(day(), 8, 15));
        assert_eq!(with_minutes.end, at(day(), 9, 45));
    }

    #[test]
    fn test_missing_end_defaults_to_one_hour() {
        let range = parse_time_range(day(), "6:30pm").expect("Should parse");
        assert_eq!(range.start, at(day(), 18, 30));
        assert_eq!(range.end, at(day(), 19, 30));

        let late = parse_time_range(day(), "11:30pm").expect("Should parse");
        assert_eq!(late.end, at(day().succ_opt().unwrap(), 0, 30));

        let dangling = parse_time_range(day(), "4pm - ").expect("Should parse");
        assert_eq!(dangling.end, at(day(), 17, 0));
    }

    #[test]
    fn test_unparseable_labels_fail() {
        for label in ["", "   ", "TBA", "All day", "- 5pm"] {
            assert!(
                parse_time_range(day(), label).is_err(),
                "'{}' should not parse",
                label
            );
        }
        assert!(
            parse_time_range(day(), "9:75 am").is_err(),
            "Out of range minutes should fail"
        );
    }

    #[test]
    fn test_end_never_precedes_start() {
        let labels = [
            "1 - 2", "1pm - 2", "11 - 12pm", "12 - 1", "10:30 - 9:15", "9pm - 8pm", "3am - 2",
            "7:45pm - 12:15am", "12:00 - 12:00", "6 am - 5",
        ];
        for label in labels {
            let range = parse_time_range(day(), label)
                .unwrap_or_else(|e| panic!("Failed to parse '{}': {}", label, e));
            assert!(range.end >= range.start, "'{}' produced {:?}", label, range);
        }
    }

    #[test]
    fn test_to_local_iso() {
        assert_eq!(to_local_iso(&at(day(), 7, 5)), "2025-09-10T07:05:00");
    }
}
