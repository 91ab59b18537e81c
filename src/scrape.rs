use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use scraper::{Html, Selector};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, warn};

use crate::{Error, Result};

/// The two ranked lists the site publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Bars,
    Restaurants,
}

impl Category {
    /// First page of the category's ranked list.
    pub fn url(self) -> &'static str {
        match self {
            Category::Bars => "https://www.theworlds50best.com/bars/list/1-50",
            Category::Restaurants => "https://www.theworlds50best.com/list/1-50",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Bars => write!(f, "bars"),
            Category::Restaurants => write!(f, "restaurants"),
        }
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bars" => Ok(Category::Bars),
            "restaurants" => Ok(Category::Restaurants),
            other => Err(Error::UnknownCategory(other.to_owned())),
        }
    }
}

/// One browser tab's worth of automation surface. The production session
/// drives Chromium over CDP; tests substitute a canned one.
#[async_trait]
pub trait BrowserSession {
    async fn goto(&mut self, url: &str) -> Result<()>;
    async fn page_content(&mut self) -> Result<String>;
    async fn close(&mut self) -> Result<()>;
}

/// Headless Chromium owned by a single scrape call.
pub struct ChromeSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: Option<Page>,
}

impl ChromeSession {
    pub async fn launch() -> Result<Self> {
        let config = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .build()
            .map_err(Error::BrowserConfig)?;

        let (browser, mut handler) = Browser::launch(config).await?;
        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        Ok(Self {
            browser,
            handler_task,
            page: None,
        })
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        let page = self.browser.new_page(url).await?;
        // Navigation may already be done by the time we subscribe; the
        // render-settle pause is what we actually rely on.
        let _ = page.wait_for_navigation().await;
        self.page = Some(page);
        Ok(())
    }

    async fn page_content(&mut self) -> Result<String> {
        let page = self.page.as_ref().ok_or(Error::NoPage)?;
        Ok(page.content().await?)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!(error = %e, "page close failed");
            }
        }
        self.browser.close().await?;
        self.handler_task.abort();
        Ok(())
    }
}

/// Scrapes the ordered (name, city) pairs of a category's first list page.
pub async fn scrape(category: Category, settle: Duration) -> Result<Vec<(String, String)>> {
    let session = ChromeSession::launch().await?;
    scrape_with(session, category.url(), settle).await
}

/// Runs the extraction and closes the session on every exit path.
pub(crate) async fn scrape_with<S: BrowserSession>(
    mut session: S,
    url: &str,
    settle: Duration,
) -> Result<Vec<(String, String)>> {
    let entries = extract(&mut session, url, settle).await;
    if let Err(e) = session.close().await {
        warn!(error = %e, "browser close failed");
    }
    entries
}

async fn extract<S: BrowserSession>(
    session: &mut S,
    url: &str,
    settle: Duration,
) -> Result<Vec<(String, String)>> {
    debug!(%url, "navigating to list page");
    session.goto(url).await?;
    time::sleep(settle).await;
    let html = session.page_content().await?;
    parse_listing(&html)
}

/// Pulls (name, city) out of every `item-bottom` block, in DOM order. The
/// rendered inner HTML is taken verbatim; downstream consumers see exactly
/// what the page showed.
fn parse_listing(html: &str) -> Result<Vec<(String, String)>> {
    let doc = Html::parse_document(html);

    let item_selector = create_selector(".item-bottom")?;
    let name_selector = create_selector("h2")?;
    let city_selector = create_selector("p")?;

    let mut entries = Vec::new();
    for item in doc.select(&item_selector) {
        let name = item
            .select(&name_selector)
            .next()
            .ok_or(Error::ParseMissingElement("h2"))?
            .inner_html();
        let city = item
            .select(&city_selector)
            .next()
            .ok_or(Error::ParseMissingElement("p"))?
            .inner_html();
        entries.push((name, city));
    }
    Ok(entries)
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::ParseMissingSelector(sel_str.into()))
}
