use std::collections::HashMap;

use uuid::Uuid;

use crate::parser::normalize_whitespace;
use crate::time::parse_time_range;
use crate::types::{EventInstance, EventType, RawEventRow, ScrapedEvent, TimeRange};

/// Counts from folding one batch of rows.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FoldSummary {
    pub appended: usize,
    pub duplicates: usize,
    pub skipped: usize,
}

/// Folds raw rows from every scraped week into one canonical event per name.
///
/// Events keep the order in which their names were first seen.
#[derive(Debug, Default)]
pub struct EventAggregator {
    events: Vec<ScrapedEvent>,
    by_name: HashMap<String, usize>,
}

/// Stable id for an event name, so re-running against an unchanged source
/// yields identical output.
pub fn event_id(name: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

impl EventAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one occurrence of `raw`. Returns `false` when the event already
    /// has an instance starting at the same time.
    pub fn fold(&mut self, raw: &RawEventRow, range: TimeRange) -> bool {
        let idx = match self.by_name.get(&raw.name) {
            Some(&idx) => idx,
            None => {
                self.events.push(ScrapedEvent {
                    id: event_id(&raw.name),
                    name: raw.name.clone(),
                    description: normalize_whitespace(&raw.raw_description),
                    location: raw.location.clone(),
                    event_type: EventType::Other,
                    is_favorited: false,
                    instances: Vec::new(),
                });
                self.by_name.insert(raw.name.clone(), self.events.len() - 1);
                self.events.len() - 1
            }
        };

        let event = &mut self.events[idx];
        if event
            .instances
            .iter()
            .any(|i| i.start_date_time == range.start)
        {
            return false;
        }

        let seq = event.instances.len() + 1;
        event.instances.push(EventInstance {
            id: format!("{}#{}", event.id, seq),
            start_date_time: range.start,
            end_date_time: range.end,
            notes: None,
            is_rsvped: false,
        });
        true
    }

    /// Resolves each row's time label and folds it in. Rows whose label does
    /// not parse are skipped without touching the rest of the batch.
    pub fn fold_rows(&mut self, rows: &[RawEventRow]) -> FoldSummary {
        let mut summary = FoldSummary::default();

        for raw in rows {
            match parse_time_range(raw.date, &raw.time_label) {
                Ok(range) => {
                    if self.fold(raw, range) {
                        summary.appended += 1;
                    } else {
                        summary.duplicates += 1;
                    }
                }
                Err(e) => {
                    log::debug!("Skipping row '{}' on {}: {}", raw.name, raw.date, e);
                    summary.skipped += 1;
                }
            }
        }

        summary
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[ScrapedEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<ScrapedEvent> {
        self.events
    }
}
