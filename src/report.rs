use std::path::{Path, PathBuf};

use chrono::{Datelike, Local};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

use crate::cache::CountryCache;
use crate::resolve::CountryLookup;
use crate::scrape::{self, Category};
use crate::{Result, API_DELAY, CACHE_FILE, RENDER_SETTLE};

/// Where a run keeps its files. Passed in explicitly so tests can point
/// everything at a scratch directory.
pub struct OutputPaths {
    data_dir: PathBuf,
}

impl OutputPaths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn cache_file(&self) -> PathBuf {
        self.data_dir.join(CACHE_FILE)
    }

    pub fn report_file(&self, category: Category, year: i32) -> PathBuf {
        self.data_dir.join(format!("top_{category}_{year}.txt"))
    }
}

/// One full scrape-resolve-write cycle for a category.
///
/// A failed scrape is logged and produces no report file; it is not an error
/// to the caller. Cache and report I/O failures do propagate.
pub async fn write_report<R: CountryLookup>(
    category: Category,
    paths: &OutputPaths,
    resolver: R,
) -> Result<()> {
    fs::create_dir_all(&paths.data_dir).await?;

    let entries = match scrape::scrape(category, RENDER_SETTLE).await {
        Ok(entries) => entries,
        Err(e) => {
            error!(%category, error = %e, "scrape failed, no report written");
            return Ok(());
        }
    };

    let cache = CountryCache::new(paths.cache_file(), resolver, API_DELAY);
    let out_path = paths.report_file(category, Local::now().year());
    write_listing(&entries, &cache, &out_path).await
}

/// Joins the scraped (name, city) pairs with their countries and rewrites
/// the report file from scratch. Rank is 1-based scrape order; a city the
/// mapping holds no country for is reported as `Unknown`.
pub async fn write_listing<R: CountryLookup>(
    entries: &[(String, String)],
    cache: &CountryCache<R>,
    out_path: &Path,
) -> Result<()> {
    let cities: Vec<String> = entries.iter().map(|(_, city)| city.clone()).collect();
    let countries = cache.mapping_for(&cities).await?;

    let mut lines = String::new();
    for (idx, (name, city)) in entries.iter().enumerate() {
        let country = countries
            .get(city)
            .and_then(|c| c.as_deref())
            .unwrap_or("Unknown");
        lines.push_str(&format!("{}, {}, {}, {}\n", idx + 1, name, city, country));
    }

    let mut file = File::create(out_path).await?;
    file.write_all(lines.as_bytes()).await?;
    info!(entries = entries.len(), path = %out_path.display(), "wrote report");

    Ok(())
}
