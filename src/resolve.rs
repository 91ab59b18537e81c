use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{Result, GEOCODE_TIMEOUT, NOMINATIM_URL, USER_AGENT};

/// City → country lookup. Implementations absorb their own failures:
/// `None` covers both "no such place" and "the lookup broke".
#[async_trait]
pub trait CountryLookup {
    async fn country_for(&self, city: &str) -> Option<String>;
}

/// Nominatim search result. Only `display_name` is relevant, its last
/// comma-separated segment is the country.
#[derive(Debug, Deserialize)]
struct Place {
    display_name: String,
}

/// Geocoding client backed by the Nominatim search API.
pub struct Nominatim {
    client: Client,
    endpoint: String,
}

impl Nominatim {
    pub fn new() -> Result<Self> {
        Self::with_endpoint(NOMINATIM_URL)
    }

    /// Same client against a different search endpoint, used to point the
    /// resolver at a local stand-in server in tests.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(GEOCODE_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    async fn search(&self, city: &str) -> Result<Option<String>> {
        let places: Vec<Place> = self
            .client
            .get(&self.endpoint)
            .query(&[("q", city), ("format", "json"), ("limit", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(places.into_iter().next().map(|place| {
            place
                .display_name
                .rsplit(',')
                .next()
                .unwrap_or(&place.display_name)
                .trim()
                .to_owned()
        }))
    }
}

#[async_trait]
impl CountryLookup for Nominatim {
    async fn country_for(&self, city: &str) -> Option<String> {
        debug!(%city, "fetching country");
        match self.search(city).await {
            Ok(country) => country,
            Err(e) => {
                warn!(%city, error = %e, "country lookup failed");
                None
            }
        }
    }
}
