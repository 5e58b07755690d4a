use crate::types::ScrapedEvent;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};

/// Inclusive date range to scrape. Whole widget weeks are fetched, so the
/// first and last weeks may extend past either end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ScrapeWindow {
    pub fn validate(self) -> Result<Self, String> {
        if self.start > self.end {
            return Err(format!(
                "Start date ({}) cannot be after end date ({})",
                self.start, self.end
            ));
        }
        Ok(self)
    }
}

/// Sunday on or before `date`, matching the widget's week start.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Days::new(date.weekday().num_days_from_sunday().into())
}

/// Whole weeks from `from` to `to`, rounded to the nearest week.
pub fn weeks_between(from: NaiveDate, to: NaiveDate) -> i64 {
    ((to - from).num_days() + 3).div_euclid(7)
}

#[derive(Debug)]
pub struct ScrapeStats {
    pub events: usize,
    pub instances: usize,
    pub earliest: Option<NaiveDateTime>,
    pub latest: Option<NaiveDateTime>,
}

impl ScrapeStats {
    pub fn from_events(events: &[ScrapedEvent]) -> ScrapeStats {
        let starts = events
            .iter()
            .flat_map(|e| &e.instances)
            .map(|i| i.start_date_time);

        ScrapeStats {
            events: events.len(),
            instances: events.iter().map(|e| e.instances.len()).sum(),
            earliest: starts.clone().min(),
            latest: starts.max(),
        }
    }
}

impl std::fmt::Display for ScrapeStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\nStatistics:")?;
        writeln!(f, "  Unique events:   {}", self.events)?;
        writeln!(f, "  Instances:       {}", self.instances)?;
        if let (Some(earliest), Some(latest)) = (self.earliest, self.latest) {
            writeln!(
                f,
                "  Span:            {} to {}",
                earliest.format("%Y-%m-%d %H:%M"),
                latest.format("%Y-%m-%d %H:%M")
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::EventAggregator;
    use crate::types::RawEventRow;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_week_start_is_sunday() {
        assert_eq!(week_start(date(2025, 9, 1)), date(2025, 8, 31));
        assert_eq!(week_start(date(2025, 9, 7)), date(2025, 9, 7));
        assert_eq!(week_start(date(2025, 9, 13)), date(2025, 9, 7));
        assert_eq!(week_start(date(2026, 1, 1)), date(2025, 12, 28));
    }

    #[test]
    fn test_weeks_between() {
        let sunday = date(2025, 9, 7);
        assert_eq!(weeks_between(sunday, date(2025, 9, 28)), 3);
        assert_eq!(weeks_between(sunday, date(2025, 8, 17)), -3);
        assert_eq!(weeks_between(sunday, sunday), 0);
        assert_eq!(weeks_between(sunday, date(2025, 9, 10)), 0);
        assert_eq!(weeks_between(sunday, date(2025, 9, 11)), 1);
        assert_eq!(weeks_between(sunday, date(2025, 9, 4)), 0);
        assert_eq!(weeks_between(sunday, date(2025, 9, 3)), -1);
    }

    #[test]
    fn test_window_validation() {
        let ok = ScrapeWindow {
            start: date(2025, 9, 1),
            end: date(2026, 1, 1),
        };
        assert_eq!(ok.validate(), Ok(ok));

        let single_day = ScrapeWindow {
            start: date(2025, 9, 1),
            end: date(2025, 9, 1),
        };
        assert!(single_day.validate().is_ok());

        let reversed = ScrapeWindow {
            start: date(2026, 1, 1),
            end: date(2025, 9, 1),
        };
        assert!(reversed.validate().is_err());
    }

    #[test]
    fn test_stats_from_events() {
        let mut aggregator = EventAggregator::new();
        for (name, day, label) in [
            ("Open Swim", 8, "7am - 9am"),
            ("Open Swim", 10, "7am - 9am"),
            ("Bootcamp", 9, "5:30 - 6:30pm"),
        ] {
            aggregator.fold_rows(&[RawEventRow {
                name: name.to_string(),
                time_label: label.to_string(),
                location: String::new(),
                raw_description: String::new(),
                date: date(2025, 9, day),
            }]);
        }

        let stats = ScrapeStats::from_events(aggregator.events());

        assert_eq!(stats.events, 2);
        assert_eq!(stats.instances, 3);
        assert_eq!(stats.earliest, date(2025, 9, 8).and_hms_opt(7, 0, 0));
        assert_eq!(stats.latest, date(2025, 9, 10).and_hms_opt(7, 0, 0));
        assert!(stats.to_string().contains("Unique events:   2"));
    }

    #[test]
    fn test_stats_empty() {
        let stats = ScrapeStats::from_events(&[]);
        assert_eq!(stats.instances, 0);
        assert!(stats.earliest.is_none());
        assert!(!stats.to_string().contains("Span"));
    }
}
