//! The page/frame boundary between the scraper and a live browser.
//!
//! [`ScheduleHost`] is the only surface the scraper drives. [`ChromiumHost`]
//! implements it over the DevTools protocol by evaluating small scripts in
//! the target frame's execution context.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use chromiumoxide::cdp::browser_protocol::page::FrameId;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};

use crate::scraper::ScraperError;

const IDLE_QUIET_PERIOD: Duration = Duration::from_millis(500);
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Frame is detached")]
    Detached,
    #[error("Element not found: {0}")]
    ElementNotFound(String),
    #[error("Script evaluation failed: {0}")]
    Evaluation(String),
    #[error("Browser error: {0}")]
    Cdp(#[from] CdpError),
}

/// Frame-level interactions with the page hosting the schedule widget.
///
/// `FrameError::Detached` means the handle went stale, usually because the
/// widget reloaded its frame; callers re-locate rather than give up.
#[allow(async_fn_in_trait)]
pub trait ScheduleHost {
    type Frame: Clone + std::fmt::Debug;

    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<(), FrameError> {
        let deadline = Instant::now() + timeout;

        while Instant::now() < deadline {
            if self
                .activity()
                .idle_for(Instant::now())
                .is_some_and(|quiet| quiet >= IDLE_QUIET_PERIOD)
            {
                return Ok(());
            }
            sleep(IDLE_POLL_INTERVAL).await;
        }

        log::warn!(
            "Network did not go idle within {:?} ({} request(s) in flight)",
            timeout,
            self.activity().in_flight()
        );
        Ok(())
    }

    async fn frames(&self) -> Result<Vec<Self::Frame>, FrameError>;

    async fn has_element(&self, frame: &Self::Frame, selector: &str) -> Result<bool, FrameError>;

    async fn frame_html(&self, frame: &Self::Frame) -> Result<String, FrameError>;

    /// Resolved `href` of the first element matching `selector`.
    async fn link_target(
        &self,
        frame: &Self::Frame,
        selector: &str,
    ) -> Result<Option<String>, FrameError>;

    async fn click(&self, frame: &Self::Frame, selector: &str) -> Result<(), FrameError>;
}

/// Owns whatever hosts the page: opens it once and is always closed, even
/// when the scrape fails.
#[allow(async_fn_in_trait)]
pub trait HostSession {
    type Host: ScheduleHost;

    async fn open(&mut self, url: &str) -> Result<Self::Host, ScraperError>;

    /// Releases the session. Failures are logged, never returned.
    async fn close(self);
}

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub chrome_executable: Option<PathBuf>,
    pub request_timeout: Duration,
}

/// A launched browser and the task pumping its protocol events.
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    pub async fn launch(options: &LaunchOptions) -> Result<Self, ScraperError> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(options.request_timeout)
            .arg("--start-maximized")
            // Keep cross-origin widget frames in-process so their execution
            // contexts are reachable from the page session.
            .arg("--disable-features=IsolateOrigins,site-per-process");
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &options.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(ScraperError::Launch)?;

        log::info!("Launching browser (headless: {})...", options.headless);
        let (browser, mut handler) = Browser::launch(config)
            .await
            .inspect_err(|e| log::error!("Browser launch error: {e:?}"))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    log::debug!("Browser handler stopped: {e}");
                    break;
                }
            }
        });

        Ok(Self { browser, handler })
    }
}

impl HostSession for BrowserSession {
    type Host = ChromiumHost;

    /// Opens `url` in a new tab and waits for its first load. Request
    /// tracking starts before navigation so every frame's traffic is seen.
    async fn open(&mut self, url: &str) -> Result<ChromiumHost, ScraperError> {
        let page = self.browser.new_page("about:blank").await?;
        let host = ChromiumHost::attach(page).await?;

        log::info!("Navigating to {}...", url);
        host.page.goto(url).await?;
        host.page.wait_for_navigation().await?;
        Ok(host)
    }

    async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            log::warn!("Failed to close browser: {e}");
        }
        if let Err(e) = self.browser.wait().await {
            log::warn!("Failed to wait for browser process: {e}");
        }
        if let Err(e) = self.handler.await {
            log::warn!("Browser handler task failed: {e}");
        }
        log::info!("Browser closed");
    }
}

/// In-flight requests across every frame of a page.
#[derive(Debug)]
pub struct NetworkActivity {
    in_flight: HashSet<String>,
    last_change: Instant,
}

impl NetworkActivity {
    pub fn new(now: Instant) -> Self {
        Self {
            in_flight: HashSet::new(),
            last_change: now,
        }
    }

    pub fn started(&mut self, request: String, now: Instant) {
        self.in_flight.insert(request);
        self.last_change = now;
    }

    /// Completion of a request seen before tracking began is ignored.
    pub fn finished(&mut self, request: &str, now: Instant) {
        if self.in_flight.remove(request) {
            self.last_change = now;
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// How long the page has had no request in flight, if it has none.
    pub fn idle_for(&self, now: Instant) -> Option<Duration> {
        self.in_flight
            .is_empty()
            .then(|| now.saturating_duration_since(self.last_change))
    }
}

enum NetworkEvent {
    Started(String),
    Finished(String),
}

#[derive(Debug, Clone)]
pub struct ChromiumHost {
    page: Page,
    activity: Arc<Mutex<NetworkActivity>>,
}

impl ChromiumHost {
    /// Wraps `page` and starts counting its network requests, including
    /// those issued by child frames.
    pub async fn attach(page: Page) -> Result<Self, FrameError> {
        let started = page
            .event_listener::<EventRequestWillBeSent>()
            .await?
            .map(|e| NetworkEvent::Started(e.request_id.inner().clone()));
        let finished = page
            .event_listener::<EventLoadingFinished>()
            .await?
            .map(|e| NetworkEvent::Finished(e.request_id.inner().clone()));
        let failed = page
            .event_listener::<EventLoadingFailed>()
            .await?
            .map(|e| NetworkEvent::Finished(e.request_id.inner().clone()));

        let activity = Arc::new(Mutex::new(NetworkActivity::new(Instant::now())));
        let tracked = Arc::clone(&activity);
        tokio::spawn(async move {
            let mut events =
                futures::stream::select(started, futures::stream::select(finished, failed));
            while let Some(event) = events.next().await {
                let mut activity = tracked.lock().unwrap_or_else(PoisonError::into_inner);
                match event {
                    NetworkEvent::Started(id) => activity.started(id, Instant::now()),
                    NetworkEvent::Finished(id) => activity.finished(&id, Instant::now()),
                }
            }
        });

        Ok(Self { page, activity })
    }

    fn activity(&self) -> MutexGuard<'_, NetworkActivity> {
        self.activity.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn evaluate<T: DeserializeOwned>(
        &self,
        frame: &FrameId,
        expression: String,
    ) -> Result<T, FrameError> {
        let context = self
            .page
            .frame_execution_context(frame.clone())
            .await?
            .ok_or(FrameError::Detached)?;

        let params = EvaluateParams::builder()
            .expression(expression)
            .context_id(context)
            .return_by_value(true)
            .build()
            .map_err(FrameError::Evaluation)?;

        self.page
            .evaluate_expression(params)
            .await?
            .into_value()
            .map_err(|e| FrameError::Evaluation(e.to_string()))
    }
}

fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

impl ScheduleHost for ChromiumHost {
    type Frame = FrameId;

    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<(), FrameError> {
        let deadline = Instant::now() + timeout;
        let mut last_count = None;
        let mut quiet_since = Instant::now();

        while Instant::now() < deadline {
            let (ready_state, count): (String, u64) = self
                .page
                .evaluate(
                    "[document.readyState, performance.getEntriesByType('resource').length]",
                )
                .await?
                .into_value()
                .map_err(|e| FrameError::Evaluation(e.to_string()))?;

            if last_count != Some(count) {
                last_count = Some(count);
                quiet_since = Instant::now();
            } else if ready_state == "complete" && quiet_since.elapsed() >= IDLE_QUIET_PERIOD {
                return Ok(());
            }
            sleep(IDLE_POLL_INTERVAL).await;
        }

        log::warn!("Network did not go idle within {:?}", timeout);
        Ok(())
    }

    async fn frames(&self) -> Result<Vec<FrameId>, FrameError> {
        Ok(self.page.frames().await?)
    }

    async fn has_element(&self, frame: &FrameId, selector: &str) -> Result<bool, FrameError> {
        self.evaluate(
            frame,
            format!("document.querySelector({}) !== null", js_string(selector)),
        )
        .await
    }

    async fn frame_html(&self, frame: &FrameId) -> Result<String, FrameError> {
        self.evaluate(frame, "document.documentElement.outerHTML".to_string())
            .await
    }

    async fn link_target(
        &self,
        frame: &FrameId,
        selector: &str,
    ) -> Result<Option<String>, FrameError> {
        let href: String = self
            .evaluate(
                frame,
                format!(
                    "(() => {{ const el = document.querySelector({}); return el && el.href ? String(el.href) : ''; }})()",
                    js_string(selector)
                ),
            )
            .await?;
        Ok(Some(href).filter(|h| !h.is_empty()))
    }

    async fn click(&self, frame: &FrameId, selector: &str) -> Result<(), FrameError> {
        let clicked: bool = self
            .evaluate(
                frame,
                format!(
                    "(() => {{ const el = document.querySelector({}); if (!el) return false; el.click(); return true; }})()",
                    js_string(selector)
                ),
            )
            .await?;
        if clicked {
            Ok(())
        } else {
            Err(FrameError::ElementNotFound(selector.to_string()))
        }
    }
}
