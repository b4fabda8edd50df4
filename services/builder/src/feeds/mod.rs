//! Feed retrieval.
//!
//! Each of the five sources has its own fetcher returning a freshly allocated
//! partial result keyed by the six-digit municipality code. `fetch_all` runs
//! them concurrently and waits for every one before anything is merged.
//! Only the structural feed may fail the build; the others degrade to empty.

pub mod coordinates;
pub mod geo;
pub mod population;
pub mod postal;
pub mod structural;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::{FeedEndpoint, FeedEndpoints};
use crate::error::{BuildError, FeedError};
use crate::model::{Coordinates, GeoStats};
use structural::AdminStructure;

/// Retrieves a raw feed payload.
#[async_trait]
pub trait FeedClient: Send + Sync {
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FeedError>;
}

/// Shared reqwest client used for every feed of a build.
#[derive(Debug, Clone)]
pub struct HttpFeedClient {
    client: reqwest::Client,
}

impl HttpFeedClient {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedClient for HttpFeedClient {
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FeedError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FeedError::HttpStatus {
                status: status.as_u16(),
                url: resp.url().to_string(),
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

/// Everything the merge step needs, gathered after the barrier.
#[derive(Debug, Default)]
pub struct FeedBundle {
    pub structure: AdminStructure,
    pub population: HashMap<String, i64>,
    pub geo: HashMap<String, GeoStats>,
    pub postal: HashMap<String, Vec<String>>,
    pub coordinates: HashMap<String, Coordinates>,
}

/// Fan out to all five feeds and wait for all of them.
///
/// A failing optional feed never cancels its siblings; a failing structural
/// feed is reported only once every fetcher has finished.
pub async fn fetch_all<C: FeedClient + ?Sized>(
    client: &C,
    feeds: &FeedEndpoints,
) -> Result<FeedBundle, BuildError> {
    let (structure, population, geo, postal, coordinates) = tokio::join!(
        structural::fetch(client, &feeds.structural),
        population::fetch(client, &feeds.population),
        geo::fetch(client, &feeds.geo),
        postal::fetch(client, &feeds.postal),
        coordinates::fetch(client, &feeds.coordinates),
    );

    let structure = structure.map_err(BuildError::Structural)?;
    if structure.municipalities.is_empty() {
        return Err(BuildError::EmptyStructure);
    }

    Ok(FeedBundle {
        structure,
        population,
        geo,
        postal,
        coordinates,
    })
}

/// Download one payload, giving up once the endpoint's wait has elapsed.
pub(crate) async fn download<C: FeedClient + ?Sized>(
    client: &C,
    feed: &'static str,
    endpoint: &FeedEndpoint,
) -> Result<Vec<u8>, FeedError> {
    debug!(feed, url = %endpoint.url, "fetching feed");
    match tokio::time::timeout(endpoint.wait, client.get_bytes(&endpoint.url)).await {
        Ok(result) => result,
        Err(_) => Err(FeedError::Timeout {
            feed,
            secs: endpoint.wait.as_secs(),
        }),
    }
}

/// Turn an optional feed's failure into an empty partial result.
pub(crate) fn tolerate<K, V>(
    feed: &'static str,
    result: Result<HashMap<K, V>, FeedError>,
) -> HashMap<K, V> {
    match result {
        Ok(records) => {
            info!(feed, records = records.len(), "feed loaded");
            records
        }
        Err(err) => {
            warn!(feed, error = %err, "optional feed unavailable, continuing without it");
            HashMap::new()
        }
    }
}

/// Canonical six-digit municipality code.
///
/// Shorter all-digit codes are left-padded with zeros; anything else is
/// rejected.
pub fn canonical_code(raw: &str) -> Option<String> {
    let code = raw.trim();
    if code.is_empty() || code.len() > 6 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{code:0>6}"))
}
