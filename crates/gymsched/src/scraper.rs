use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::error::CdpError;
use chrono::NaiveDate;
use tokio::time::{sleep, timeout};

use crate::aggregate::EventAggregator;
use crate::browser::{BrowserSession, FrameError, HostSession, LaunchOptions, ScheduleHost};
use crate::parser::{ParseError, contains_widget_root, parse_week_heading, parse_week_rows};
use crate::selectors;
use crate::types::{RawEventRow, ScrapedEvent, WeekWindow};
use crate::utils::{ScrapeWindow, week_start, weeks_between};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("Schedule frame not found on page")]
    FrameNotFound,
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("Browser error: {0}")]
    Browser(#[from] CdpError),
    #[error("Browser launch failed: {0}")]
    Launch(String),
    #[error("Invalid scrape window: {0}")]
    InvalidWindow(String),
    #[error("Week of {week} did not advance after navigating forward")]
    Stalled { week: NaiveDate },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

impl Direction {
    fn selector(self) -> &'static str {
        match self {
            Direction::Next => selectors::NEXT_WEEK,
            Direction::Prev => selectors::PREV_WEEK,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Next => write!(f, "next"),
            Direction::Prev => write!(f, "prev"),
        }
    }
}

/// The frame handle could not be trusted after a navigation attempt.
#[derive(Debug)]
pub struct NeedsRelocate(pub String);

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub url: String,
    pub window: ScrapeWindow,
    pub timeout: Duration,
    pub headless: bool,
    pub chrome_executable: Option<PathBuf>,
}

/// Drives the weekly schedule widget on one page: finds its frame, pages it
/// week by week and folds every week's rows into canonical events.
#[derive(Debug)]
pub struct WeeklyScraper<'a, H: ScheduleHost> {
    host: &'a H,
    timeout: Duration,
    poll_interval: Duration,
}

impl<'a, H: ScheduleHost> WeeklyScraper<'a, H> {
    pub fn new(host: &'a H, timeout: Duration) -> Self {
        Self {
            host,
            timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Returns the first attached frame containing the widget root. Safe to
    /// call again after the widget has reloaded.
    pub async fn find_schedule_frame(&self) -> Result<H::Frame, ScraperError> {
        self.host.wait_for_network_idle(self.timeout).await?;

        for frame in self.host.frames().await? {
            match self.host.has_element(&frame, selectors::WIDGET_ROOT).await {
                Ok(true) => {
                    log::debug!("Schedule widget found in frame {:?}", frame);
                    return Ok(frame);
                }
                Ok(false) => {}
                Err(e) => log::debug!("Skipping frame {:?}: {}", frame, e),
            }
        }

        Err(ScraperError::FrameNotFound)
    }

    /// Current frame HTML, re-locating the frame once if the handle is stale.
    async fn snapshot(&self, frame: &mut H::Frame) -> Result<String, ScraperError> {
        match self.host.frame_html(frame).await {
            Ok(html) if contains_widget_root(&html) => Ok(html),
            Ok(_) => {
                log::warn!("Frame no longer holds the schedule widget, re-locating...");
                self.relocate_and_read(frame).await
            }
            Err(e) => {
                log::warn!("Failed to read schedule frame ({}), re-locating...", e);
                self.relocate_and_read(frame).await
            }
        }
    }

    async fn relocate_and_read(&self, frame: &mut H::Frame) -> Result<String, ScraperError> {
        *frame = self.find_schedule_frame().await?;
        Ok(self.host.frame_html(frame).await?)
    }

    /// The week the widget currently displays.
    pub async fn week_range(&self, frame: &mut H::Frame) -> Result<WeekWindow, ScraperError> {
        let html = self.snapshot(frame).await?;
        Ok(parse_week_heading(&html)?)
    }

    /// Raw rows of the displayed week, resolved against `week`.
    pub async fn extract_week(
        &self,
        frame: &mut H::Frame,
        week: &WeekWindow,
    ) -> Result<Vec<RawEventRow>, ScraperError> {
        let html = self.snapshot(frame).await?;
        Ok(parse_week_rows(&html, week))
    }

    async fn try_navigate(
        &self,
        frame: H::Frame,
        direction: Direction,
    ) -> Result<H::Frame, NeedsRelocate> {
        let sel = direction.selector();
        let old = self.host.link_target(&frame, sel).await.ok().flatten();

        self.host
            .click(&frame, sel)
            .await
            .map_err(|e| NeedsRelocate(format!("click failed: {e}")))?;

        let changed = async {
            loop {
                match self.host.link_target(&frame, sel).await {
                    Ok(Some(href)) if Some(&href) != old.as_ref() => return Ok(()),
                    Ok(_) => sleep(self.poll_interval).await,
                    Err(e) => return Err(NeedsRelocate(format!("frame lost: {e}"))),
                }
            }
        };

        match timeout(self.timeout, changed).await {
            Ok(Ok(())) => Ok(frame),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(NeedsRelocate(format!(
                "{direction} link did not change within {:?}",
                self.timeout
            ))),
        }
    }

    /// Pages the widget one week in `direction`. Succeeds as long as some
    /// schedule frame exists afterwards, even if it is a new one.
    pub async fn navigate(
        &self,
        frame: H::Frame,
        direction: Direction,
    ) -> Result<H::Frame, ScraperError> {
        match self.try_navigate(frame, direction).await {
            Ok(frame) => Ok(frame),
            Err(NeedsRelocate(reason)) => {
                log::warn!("Navigation {direction}: {reason}; re-locating schedule frame...");
                self.find_schedule_frame().await
            }
        }
    }

    /// Pages until the displayed week is the one containing `target`.
    /// Returns the frame and the number of navigations issued.
    pub async fn align_to(
        &self,
        mut frame: H::Frame,
        target: NaiveDate,
    ) -> Result<(H::Frame, u64), ScraperError> {
        let current = self.week_range(&mut frame).await?;
        let target_week = week_start(target);
        let diff = weeks_between(current.start, target_week);

        if diff == 0 {
            return Ok((frame, 0));
        }

        let direction = if diff > 0 {
            Direction::Next
        } else {
            Direction::Prev
        };
        let clicks = diff.unsigned_abs();
        log::info!(
            "Current week: {}. Target week start: {}.",
            current.start,
            target_week
        );
        log::info!("Navigating {} weeks {}...", clicks, direction);

        for _ in 0..clicks {
            frame = self.navigate(frame, direction).await?;
        }

        Ok((frame, clicks))
    }

    /// Scrapes every week overlapping `window` and returns the canonical
    /// events in first-sighting order.
    pub async fn run(&self, window: &ScrapeWindow) -> Result<Vec<ScrapedEvent>, ScraperError> {
        let frame = self.find_schedule_frame().await?;
        log::info!("Locating target week...");
        let (mut frame, _) = self.align_to(frame, window.start).await?;

        let mut aggregator = EventAggregator::new();
        let mut previous: Option<WeekWindow> = None;

        loop {
            let week = self.week_range(&mut frame).await?;

            if let Some(prev) = previous
                && week.start <= prev.start
            {
                return Err(ScraperError::Stalled { week: week.start });
            }
            if week.start > window.end {
                break;
            }

            log::info!("Scraping week: {}", week);
            let rows = self.extract_week(&mut frame, &week).await?;
            let summary = aggregator.fold_rows(&rows);
            log::info!(
                "  {} new instance(s), {} duplicate(s), {} skipped row(s)",
                summary.appended,
                summary.duplicates,
                summary.skipped
            );

            if week.end >= window.end {
                break;
            }
            log::info!("Next week...");
            previous = Some(week);
            frame = self.navigate(frame, Direction::Next).await?;
        }

        log::info!("Total unique events found: {}", aggregator.len());
        Ok(aggregator.into_events())
    }
}

/// Launches a browser, scrapes `config.url` over `config.window` and closes
/// the browser again, whether or not the scrape succeeded.
pub async fn scrape(config: &ScrapeConfig) -> Result<Vec<ScrapedEvent>, ScraperError> {
    let window = config.window.validate().map_err(ScraperError::InvalidWindow)?;

    let session = BrowserSession::launch(&LaunchOptions {
        headless: config.headless,
        chrome_executable: config.chrome_executable.clone(),
        request_timeout: config.timeout,
    })
    .await?;

    scrape_with(session, &config.url, &window, config.timeout).await
}

/// Runs one scrape inside `session`. The session is closed on every path.
pub async fn scrape_with<S: HostSession>(
    mut session: S,
    url: &str,
    window: &ScrapeWindow,
    timeout: Duration,
) -> Result<Vec<ScrapedEvent>, ScraperError> {
    let result = async {
        let host = session.open(url).await?;
        WeeklyScraper::new(&host, timeout).run(window).await
    }
    .await;

    session.close().await;
    result
}
