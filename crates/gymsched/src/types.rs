use std::fmt::Display;

use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Category of an event as understood by the consuming app.
///
/// The schedule widget does not expose a category, so scraped events are
/// always [`EventType::Other`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    Aquatics,
    GroupFitness,
    SportsClub,
    #[default]
    Other,
}

impl Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Aquatics => write!(f, "aquatics"),
            EventType::GroupFitness => write!(f, "group-fitness"),
            EventType::SportsClub => write!(f, "sports-club"),
            EventType::Other => write!(f, "other"),
        }
    }
}

/// Literal text captured from one schedule-table row, plus the calendar
/// date it was rendered under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEventRow {
    pub name: String,
    pub time_label: String,
    pub location: String,
    pub raw_description: String,
    pub date: NaiveDate,
}

impl RawEventRow {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            name: String::new(),
            time_label: String::new(),
            location: String::new(),
            raw_description: String::new(),
            date,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} – {}",
            self.start.format("%a %Y-%m-%d %H:%M"),
            self.end.format("%H:%M")
        )?;
        if self.end.date() != self.start.date() {
            write!(f, " (+1)")?;
        }
        Ok(())
    }
}

/// The seven-day span the widget currently displays, identified by its
/// first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl WeekWindow {
    pub fn starting(start: NaiveDate) -> Self {
        Self {
            start,
            end: start + Days::new(6),
        }
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        self.start.iter_days().take(7)
    }
}

impl Display for WeekWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

/// Venue-local timestamps without an offset, e.g. `2025-09-07T17:00:00`.
pub mod local_iso {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    pub fn serialize<S: Serializer>(dt: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&dt.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInstance {
    pub id: String,
    #[serde(with = "local_iso")]
    pub start_date_time: NaiveDateTime,
    #[serde(with = "local_iso")]
    pub end_date_time: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(rename = "isRSVPed")]
    pub is_rsvped: bool,
}

impl Display for EventInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let range = TimeRange {
            start: self.start_date_time,
            end: self.end_date_time,
        };
        write!(f, "{}", range)
    }
}

/// Canonical record for one event name, holding every distinct occurrence
/// seen across the scraped weeks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedEvent {
    pub id: String,
    pub name: String,
    pub description: String,
    pub location: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub is_favorited: bool,
    pub instances: Vec<EventInstance>,
}

impl Display for ScrapedEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "┌─ {} [{}]", self.name, self.event_type)?;
        if !self.location.is_empty() {
            writeln!(f, "│  Location: {}", self.location)?;
        }
        if !self.description.is_empty() {
            let preview: String = self.description.chars().take(120).collect();
            writeln!(f, "│  {}", preview)?;
        }
        writeln!(f, "└─ {} instance(s)", self.instances.len())?;
        for instance in &self.instances {
            writeln!(f, "     {}", instance)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_app_field_names() {
        let start = NaiveDate::from_ymd_opt(2025, 9, 7)
            .unwrap()
            .and_hms_opt(17, 0, 0)
            .unwrap();
        let event = ScrapedEvent {
            id: "abc".to_string(),
            name: "Open Swim".to_string(),
            description: "Lap lanes".to_string(),
            location: "Pool".to_string(),
            event_type: EventType::Other,
            is_favorited: false,
            instances: vec![EventInstance {
                id: "abc#1".to_string(),
                start_date_time: start,
                end_date_time: start + chrono::Duration::hours(1),
                notes: None,
                is_rsvped: false,
            }],
        };

        let json = serde_json::to_value(&event).expect("Failed to serialize");

        assert_eq!(json["type"], "other");
        assert_eq!(json["isFavorited"], false);
        assert_eq!(json["instances"][0]["startDateTime"], "2025-09-07T17:00:00");
        assert_eq!(json["instances"][0]["endDateTime"], "2025-09-07T18:00:00");
        assert_eq!(json["instances"][0]["isRSVPed"], false);
        assert!(
            json["instances"][0].get("notes").is_none(),
            "Absent notes should be omitted"
        );

        let back: ScrapedEvent = serde_json::from_value(json).expect("Failed to deserialize");
        assert_eq!(back, event);
    }

    #[test]
    fn test_event_type_matches_wire_name() {
        for ty in [
            EventType::Aquatics,
            EventType::GroupFitness,
            EventType::SportsClub,
            EventType::Other,
        ] {
            assert_eq!(serde_json::to_value(ty).unwrap(), ty.to_string());
        }
    }

    #[test]
    fn test_week_window_spans_seven_days() {
        let week = WeekWindow::starting(NaiveDate::from_ymd_opt(2025, 12, 28).unwrap());

        assert_eq!(week.end, NaiveDate::from_ymd_opt(2026, 1, 3).unwrap());
        let days: Vec<_> = week.days().collect();
        assert_eq!(days.len(), 7);
        assert_eq!(days[6], week.end);
    }
}
