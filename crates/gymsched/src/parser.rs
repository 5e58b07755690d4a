use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::selectors;
use crate::types::{RawEventRow, WeekWindow};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Failed to parse week heading: {0}")]
    Heading(String),
    #[error("Failed to parse time range: {0}")]
    TimeRange(String),
    #[error("Missing required element: {0}")]
    MissingElement(String),
}

static RE_WEEK_OF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*week\s+of\s+").expect("invalid regex: week of"));

static RE_DAY_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("invalid regex: day number"));

const HEADING_DATE_FORMATS: [&str; 4] = ["%b %d, %Y", "%b %d %Y", "%B %d, %Y", "%B %d %Y"];

fn elem_text(element: ElementRef) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

/// Text nodes concatenated as-is. Line breaks inside a time cell are left
/// for the time parser to strip.
fn raw_text(element: ElementRef) -> String {
    element.text().collect()
}

pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector '{}': {}", css, e))
}

/// Whether the document contains the schedule widget root.
pub fn contains_widget_root(html: &str) -> bool {
    let document = Html::parse_document(html);
    document
        .select(&selector(selectors::WIDGET_ROOT))
        .next()
        .is_some()
}

/// Reads the "Week of <Month> <Day>, <Year>" heading into the displayed week.
pub fn parse_week_heading(html: &str) -> Result<WeekWindow, ParseError> {
    let document = Html::parse_document(html);
    let heading = document
        .select(&selector(selectors::WEEK_HEADING))
        .next()
        .map(|e| normalize_whitespace(&elem_text(e)))
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ParseError::MissingElement(selectors::WEEK_HEADING.to_string()))?;

    let start = parse_heading_date(&heading)?;
    Ok(WeekWindow::starting(start))
}

fn parse_heading_date(heading: &str) -> Result<NaiveDate, ParseError> {
    let date_str = RE_WEEK_OF.replace(heading, "");
    let date_str = date_str.trim();

    HEADING_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_str, fmt).ok())
        .ok_or_else(|| ParseError::Heading(heading.to_string()))
}

/// Maps a day label ("Wed, Sep 10", "Today\n14") onto a day of `week` by
/// its first number. Labels without a matching day fall back to the week's
/// first day.
pub fn resolve_day_label(label: &str, week: &WeekWindow) -> NaiveDate {
    use chrono::Datelike;

    let day_number = RE_DAY_NUMBER
        .find(label)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .unwrap_or(0);

    week.days()
        .find(|d| d.day() == day_number)
        .unwrap_or(week.start)
}

/// Walks the schedule table of one displayed week and captures the text of
/// every event entry, in document order.
///
/// Day labels carry forward: a row without its own label belongs to the
/// most recent labelled day.
pub fn parse_week_rows(html: &str, week: &WeekWindow) -> Vec<RawEventRow> {
    let document = Html::parse_document(html);
    let row_sel = selector(selectors::ROWS);
    let label_sel = selector(selectors::DATE_LABEL);
    let cell_sel = selector(selectors::EVENT_CELL);
    let event_sel = selector(selectors::EVENT_ROW);
    let time_sel = selector(selectors::EVENT_TIME);
    let title_sel = selector(selectors::EVENT_TITLE);
    let location_sel = selector(selectors::EVENT_LOCATION);
    let td_sel = selector("td");

    let mut current_label = String::new();
    let mut rows = Vec::new();

    for row in document.select(&row_sel) {
        if let Some(label) = row.select(&label_sel).next() {
            current_label = normalize_whitespace(&elem_text(label));
        }
        let date = resolve_day_label(&current_label, week);

        let Some(cell) = row.select(&cell_sel).next() else {
            rows.push(RawEventRow::empty(date));
            continue;
        };

        for entry in cell.select(&event_sel) {
            let text_of = |sel: &Selector| {
                entry
                    .select(sel)
                    .next()
                    .map(|e| normalize_whitespace(&elem_text(e)))
                    .unwrap_or_default()
            };

            let time_label = entry
                .select(&time_sel)
                .next()
                .or_else(|| entry.select(&td_sel).next())
                .map(raw_text)
                .unwrap_or_default();

            let raw_description = entry
                .select(&td_sel)
                .nth(1)
                .map(elem_text)
                .unwrap_or_default();

            rows.push(RawEventRow {
                name: text_of(&title_sel),
                time_label,
                location: text_of(&location_sel),
                raw_description,
                date,
            });
        }
    }

    rows
}
