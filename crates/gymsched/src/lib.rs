mod parser;
pub mod aggregate;
pub mod browser;
pub mod scraper;
pub mod time;
pub mod types;
pub mod utils;

pub use parser::ParseError;
pub use scraper::{ScrapeConfig, ScraperError, WeeklyScraper, scrape, scrape_with};

pub const DEFAULT_URL: &str = "https://www.stonybrook.edu/commcms/studentaffairs/rec/25_live/";

/// CSS selectors for the embedded weekly-schedule widget.
pub mod selectors {
    /// Widget root; its presence identifies the schedule frame.
    pub const WIDGET_ROOT: &str = ".twWeekTbl";
    pub const NEXT_WEEK: &str = ".twPagerArrowRight";
    pub const PREV_WEEK: &str = ".twPagerArrowLeft";
    pub const WEEK_HEADING: &str = ".twHeading";
    pub const ROWS: &str = "table.twWeekTbl > tbody > tr";
    pub const DATE_LABEL: &str = ".twWeekGroupLabel, .twWeekGroupTodayLabel";
    pub const EVENT_CELL: &str = ".twWeekEventCell, .twWeekEventTodayCell";
    pub const EVENT_ROW: &str = ".twWeekEventRow";
    pub const EVENT_TIME: &str = ".txTS, .twWeekTimeCell";
    pub const EVENT_TITLE: &str = ".EventTitle";
    pub const EVENT_LOCATION: &str = ".twLocation";
}
