use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("The selector you are trying to scrape for is missing. Selector: {0}")]
    ParseMissingSelector(String),

    #[error("List entry is missing a <{0}> sub-element")]
    ParseMissingElement(&'static str),

    #[error("Unknown listing category: {0}")]
    UnknownCategory(String),

    #[error("No page is loaded in the browser session")]
    NoPage,

    #[error("Browser config error: {0}")]
    BrowserConfig(String),

    #[error("Browser Error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),
}
