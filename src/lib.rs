//! Scraper for The World's 50 Best ranked lists.
//!
//! One run drives a headless browser to a category's listing page, pulls the
//! ordered (name, city) pairs out of the rendered DOM, resolves each city to
//! a country through Nominatim (backed by an append-only flat-file cache),
//! and writes a `rank, name, city, country` report for the current year.

use std::time::Duration;

mod error;

pub mod cache;
pub mod report;
pub mod resolve;
pub mod scrape;

pub use error::{Error, Result};

/// Nominatim search endpoint used for city → country resolution.
pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";
/// Client tag sent as `User-Agent` on every geocoding request.
pub const USER_AGENT: &str = "toplist-scraper";
/// Directory holding the country cache and the report files.
pub const DATA_DIR: &str = "data";
/// File name of the persisted city → country cache inside [`DATA_DIR`].
pub const CACHE_FILE: &str = "cities_countries.txt";

/// Pause between consecutive Nominatim calls to stay under their rate limit.
pub const API_DELAY: Duration = Duration::from_secs(1);
/// Pause after navigation so client-side rendering can populate the list.
pub const RENDER_SETTLE: Duration = Duration::from_secs(2);
/// Timeout for a single geocoding request.
pub const GEOCODE_TIMEOUT: Duration = Duration::from_secs(5);
