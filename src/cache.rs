use std::collections::{BTreeSet, HashMap};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::time;
use tracing::debug;

use crate::resolve::CountryLookup;
use crate::Result;

/// Durable city → country mapping over an append-only flat file of
/// `city, country` lines, backfilled through a [`CountryLookup`] for cities
/// the file doesn't know yet.
pub struct CountryCache<R> {
    path: PathBuf,
    resolver: R,
    delay: Duration,
}

impl<R: CountryLookup> CountryCache<R> {
    /// `delay` spaces consecutive resolver calls; it advances after every
    /// call, whether or not the lookup produced a country.
    pub fn new(path: impl Into<PathBuf>, resolver: R, delay: Duration) -> Self {
        Self {
            path: path.into(),
            resolver,
            delay,
        }
    }

    /// Resolves every distinct city in `cities` to its country, consulting
    /// the file first and the resolver only for cities missing from it.
    /// Freshly resolved cities are appended to the file before returning,
    /// a failed resolution as the literal `None`.
    pub async fn mapping_for(&self, cities: &[String]) -> Result<HashMap<String, Option<String>>> {
        let known = self.load().await?;

        let missing: BTreeSet<&str> = cities
            .iter()
            .map(String::as_str)
            .filter(|city| !known.contains_key(*city))
            .collect();
        debug!(?missing, "cities missing country data");

        let mut fresh: HashMap<String, Option<String>> = HashMap::new();
        for &city in &missing {
            let country = self.resolver.country_for(city).await;
            fresh.insert(city.to_owned(), country);
            time::sleep(self.delay).await;
        }

        if !missing.is_empty() {
            self.append(&missing, &fresh).await?;
        }

        Ok(cities
            .iter()
            .map(|city| {
                let country = known
                    .get(city)
                    .cloned()
                    .or_else(|| fresh.get(city).cloned().flatten());
                (city.clone(), country)
            })
            .collect())
    }

    /// Reads the whole cache file into memory. A missing file is an empty
    /// cache; lines without a `", "` separator are skipped.
    async fn load(&self) -> Result<HashMap<String, String>> {
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };

        let mut known = HashMap::new();
        for line in text.lines() {
            match line.trim().split_once(", ") {
                Some((city, country)) => {
                    known.insert(city.to_owned(), country.to_owned());
                }
                None => debug!(%line, "skipping malformed cache line"),
            }
        }
        debug!(entries = known.len(), path = %self.path.display(), "loaded country cache");
        Ok(known)
    }

    async fn append(
        &self,
        missing: &BTreeSet<&str>,
        fresh: &HashMap<String, Option<String>>,
    ) -> Result<()> {
        let mut lines = String::new();
        for &city in missing {
            let country = fresh.get(city).and_then(|c| c.as_deref()).unwrap_or("None");
            lines.push_str(&format!("{city}, {country}\n"));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(lines.as_bytes()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tempfile::tempdir;

    use super::*;

    /// Resolver with canned answers that records every city it is asked.
    /// Clones share the call log.
    #[derive(Default, Clone)]
    struct FakeResolver {
        answers: HashMap<String, String>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl FakeResolver {
        fn answering(pairs: &[(&str, &str)]) -> Self {
            Self {
                answers: pairs
                    .iter()
                    .map(|(city, country)| (city.to_string(), country.to_string()))
                    .collect(),
                calls: Arc::default(),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CountryLookup for FakeResolver {
        async fn country_for(&self, city: &str) -> Option<String> {
            self.calls.lock().unwrap().push(city.to_owned());
            self.answers.get(city).cloned()
        }
    }

    fn cache_at(path: PathBuf, resolver: FakeResolver) -> CountryCache<FakeResolver> {
        CountryCache::new(path, resolver, Duration::ZERO)
    }

    #[tokio::test]
    async fn fully_cached_cities_skip_the_resolver() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cities_countries.txt");
        std::fs::write(&path, "Paris, France\nTokyo, Japan\n").unwrap();

        let resolver = FakeResolver::default();
        let mapping = cache_at(path, resolver.clone())
            .mapping_for(&["Tokyo".into(), "Paris".into()])
            .await
            .unwrap();

        assert!(resolver.calls().is_empty());
        assert_eq!(mapping["Paris"].as_deref(), Some("France"));
        assert_eq!(mapping["Tokyo"].as_deref(), Some("Japan"));
    }

    #[tokio::test]
    async fn each_missing_city_is_resolved_once_despite_duplicates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cities_countries.txt");
        std::fs::write(&path, "Paris, France\n").unwrap();

        let resolver = FakeResolver::answering(&[("Tokyo", "Japan")]);
        let cities = vec![
            "Tokyo".to_string(),
            "Paris".to_string(),
            "Tokyo".to_string(),
            "Tokyo".to_string(),
        ];
        let mapping = cache_at(path, resolver.clone())
            .mapping_for(&cities)
            .await
            .unwrap();

        assert_eq!(resolver.calls(), vec!["Tokyo".to_string()]);
        assert_eq!(mapping["Tokyo"].as_deref(), Some("Japan"));
    }

    #[tokio::test]
    async fn resolved_cities_are_appended_not_rewritten() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cities_countries.txt");
        std::fs::write(&path, "Paris, France\n").unwrap();

        let resolver = FakeResolver::answering(&[("Tokyo", "Japan")]);
        cache_at(path.clone(), resolver.clone())
            .mapping_for(&["Tokyo".into(), "Paris".into()])
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Paris, France\nTokyo, Japan\n"
        );

        // A second pass finds everything cached and leaves the file alone.
        let resolver = FakeResolver::default();
        cache_at(path.clone(), resolver.clone())
            .mapping_for(&["Tokyo".into(), "Paris".into()])
            .await
            .unwrap();

        assert!(resolver.calls().is_empty());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Paris, France\nTokyo, Japan\n"
        );
    }

    #[tokio::test]
    async fn round_trips_a_written_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cities_countries.txt");

        let resolver = FakeResolver::answering(&[("Paris", "France")]);
        cache_at(path.clone(), resolver.clone())
            .mapping_for(&["Paris".into()])
            .await
            .unwrap();

        let resolver = FakeResolver::default();
        let mapping = cache_at(path, resolver.clone())
            .mapping_for(&["Paris".into()])
            .await
            .unwrap();
        assert_eq!(mapping["Paris"].as_deref(), Some("France"));
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cities_countries.txt");
        std::fs::write(&path, "Berlin\nParis, France\n").unwrap();

        let resolver = FakeResolver::answering(&[("Berlin", "Germany")]);
        let mapping = cache_at(path, resolver.clone())
            .mapping_for(&["Berlin".into(), "Paris".into()])
            .await
            .unwrap();

        // "Berlin" carried no country, so it counts as missing.
        assert_eq!(resolver.calls(), vec!["Berlin".to_string()]);
        assert_eq!(mapping["Berlin"].as_deref(), Some("Germany"));
        assert_eq!(mapping["Paris"].as_deref(), Some("France"));
    }

    #[tokio::test]
    async fn missing_cache_file_is_an_empty_cache() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cities_countries.txt");

        let resolver = FakeResolver::answering(&[("Lima", "Peru")]);
        let mapping = cache_at(path.clone(), resolver.clone())
            .mapping_for(&["Lima".into()])
            .await
            .unwrap();

        assert_eq!(mapping["Lima"].as_deref(), Some("Peru"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Lima, Peru\n");
    }

    #[tokio::test]
    async fn failed_resolution_is_persisted_as_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cities_countries.txt");

        let resolver = FakeResolver::default();
        let mapping = cache_at(path.clone(), resolver.clone())
            .mapping_for(&["Atlantis".into()])
            .await
            .unwrap();

        assert_eq!(mapping["Atlantis"].as_deref(), None);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Atlantis, None\n"
        );
    }
}
