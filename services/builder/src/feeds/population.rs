//! Daily resident population, keyed by municipality code.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;

use super::{canonical_code, download, tolerate, FeedClient};
use crate::config::FeedEndpoint;
use crate::error::FeedError;

const FEED: &str = "population";

#[derive(Debug, Deserialize)]
struct PopulationRow {
    #[serde(rename = "COD_ISTAT_COMUNE", default)]
    code: Option<String>,
    #[serde(rename = "RESIDENTI", default)]
    residents: Option<String>,
}

pub async fn fetch<C: FeedClient + ?Sized>(
    client: &C,
    endpoint: &FeedEndpoint,
) -> HashMap<String, i64> {
    let result = match download(client, FEED, endpoint).await {
        Ok(bytes) => parse(&bytes),
        Err(err) => Err(err),
    };
    tolerate(FEED, result)
}

pub fn parse(bytes: &[u8]) -> Result<HashMap<String, i64>, FeedError> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.strip_prefix('\u{feff}').unwrap_or(text.as_ref());

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    reader.headers()?;

    let mut population = HashMap::new();
    let mut skipped = 0usize;

    for result in reader.deserialize::<PopulationRow>() {
        let parsed = result.ok().and_then(|row| {
            let code = canonical_code(row.code.as_deref()?)?;
            let residents = row.residents.as_deref()?.parse::<i64>().ok()?;
            Some((code, residents))
        });
        match parsed {
            Some((code, residents)) => {
                population.insert(code, residents);
            }
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!(feed = FEED, skipped, "rows skipped");
    }
    Ok(population)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{endpoint, StaticFeedClient};
    use super::*;

    #[test]
    fn test_parse_named_columns() {
        let csv = "DATA,COD_ISTAT_COMUNE,COMUNE,RESIDENTI\n\
                   2026-10-01,001001,AGLIE',2612\n\
                   2026-10-01,058091,ROMA,2748109\n";
        let population = parse(csv.as_bytes()).unwrap();
        assert_eq!(population.len(), 2);
        assert_eq!(population["001001"], 2612);
        assert_eq!(population["058091"], 2748109);
    }

    #[test]
    fn test_parse_skips_unparseable_rows() {
        let csv = "COD_ISTAT_COMUNE,RESIDENTI\n\
                   001001,\n\
                   001002,n/d\n\
                   12A456,100\n\
                   001003,850\n";
        let population = parse(csv.as_bytes()).unwrap();
        assert_eq!(population.len(), 1);
        assert_eq!(population["001003"], 850);
    }

    #[test]
    fn test_parse_pads_codes_and_strips_bom() {
        let csv = "\u{feff}COD_ISTAT_COMUNE,RESIDENTI\n1001,2612\n";
        let population = parse(csv.as_bytes()).unwrap();
        assert_eq!(population["001001"], 2612);
    }

    #[test]
    fn test_parse_without_expected_columns_is_empty() {
        let population = parse(b"foo,bar\n1,2\n").unwrap();
        assert!(population.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_yields_empty_mapping() {
        let client = StaticFeedClient::default();
        let population = fetch(&client, &endpoint("test://population")).await;
        assert!(population.is_empty());
    }
}
