//! Municipality centroids from a three-column `code,lat,lng` table.

use std::collections::HashMap;

use tracing::debug;

use super::{canonical_code, download, tolerate, FeedClient};
use crate::config::FeedEndpoint;
use crate::error::FeedError;
use crate::model::Coordinates;

const FEED: &str = "coordinates";

pub async fn fetch<C: FeedClient + ?Sized>(
    client: &C,
    endpoint: &FeedEndpoint,
) -> HashMap<String, Coordinates> {
    let result = match download(client, FEED, endpoint).await {
        Ok(bytes) => parse(&bytes),
        Err(err) => Err(err),
    };
    tolerate(FEED, result)
}

/// The first line is a header; rows that are not exactly three numeric
/// fields are dropped.
pub fn parse(bytes: &[u8]) -> Result<HashMap<String, Coordinates>, FeedError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let mut coordinates = HashMap::new();
    let mut skipped = 0usize;

    for result in reader.records() {
        let parsed = result.ok().and_then(|record| {
            if record.len() != 3 {
                return None;
            }
            let code = canonical_code(&record[0])?;
            let latitude = record[1].parse::<f64>().ok()?;
            let longitude = record[2].parse::<f64>().ok()?;
            Some((
                code,
                Coordinates {
                    latitude,
                    longitude,
                },
            ))
        });
        match parsed {
            Some((code, point)) => {
                coordinates.insert(code, point);
            }
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!(feed = FEED, skipped, "rows skipped");
    }
    Ok(coordinates)
}
