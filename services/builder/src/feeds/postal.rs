//! Postal codes per municipality. The only source for them.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;

use super::{canonical_code, download, tolerate, FeedClient};
use crate::config::FeedEndpoint;
use crate::error::FeedError;

const FEED: &str = "postal";

#[derive(Debug, Deserialize)]
struct PostalRecord {
    #[serde(rename = "codice")]
    code: CodeValue,
    #[serde(rename = "cap", default)]
    postal_codes: Vec<String>,
}

/// Some records carry the code as a bare number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CodeValue {
    Text(String),
    Number(u64),
}

impl CodeValue {
    fn canonical(&self) -> Option<String> {
        match self {
            CodeValue::Text(text) => canonical_code(text),
            CodeValue::Number(n) => canonical_code(&n.to_string()),
        }
    }
}

pub async fn fetch<C: FeedClient + ?Sized>(
    client: &C,
    endpoint: &FeedEndpoint,
) -> HashMap<String, Vec<String>> {
    let result = match download(client, FEED, endpoint).await {
        Ok(bytes) => parse(&bytes),
        Err(err) => Err(err),
    };
    tolerate(FEED, result)
}

/// A document that is not a JSON array fails as a whole; a malformed record
/// or one with an unusable code is dropped on its own.
pub fn parse(bytes: &[u8]) -> Result<HashMap<String, Vec<String>>, FeedError> {
    let values: Vec<serde_json::Value> = serde_json::from_slice(bytes)?;

    let mut postal: HashMap<String, Vec<String>> = HashMap::new();
    let mut skipped = 0usize;

    for value in values {
        let Ok(record) = serde_json::from_value::<PostalRecord>(value) else {
            skipped += 1;
            continue;
        };
        let Some(code) = record.code.canonical() else {
            skipped += 1;
            continue;
        };
        let codes = postal.entry(code).or_default();
        for cap in record.postal_codes {
            let cap = cap.trim();
            if !cap.is_empty() && !codes.iter().any(|c| c == cap) {
                codes.push(cap.to_string());
            }
        }
    }

    if skipped > 0 {
        debug!(feed = FEED, skipped, "records skipped");
    }
    Ok(postal)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{endpoint, StaticFeedClient};
    use super::*;

    #[test]
    fn test_parse_records() {
        let json = r#"[
            {"nome": "Agliè", "codice": "001001", "cap": ["10011"]},
            {"nome": "Roma", "codice": "058091", "cap": ["00118", "00119", "00118"]}
        ]"#;
        let postal = parse(json.as_bytes()).unwrap();
        assert_eq!(postal["001001"], vec!["10011"]);
        assert_eq!(postal["058091"], vec!["00118", "00119"]);
    }

    #[test]
    fn test_parse_missing_cap_list_is_empty() {
        let postal = parse(br#"[{"codice": "001001"}]"#).unwrap();
        assert!(postal["001001"].is_empty());
    }

    #[test]
    fn test_parse_skips_bad_codes() {
        let postal = parse(br#"[{"codice": "X01", "cap": ["10011"]}]"#).unwrap();
        assert!(postal.is_empty());
    }

    #[test]
    fn test_parse_skips_malformed_record_keeps_siblings() {
        let json = br#"[
            {"codice": "001001", "cap": ["10011"]},
            {"codice": 1002, "cap": ["10012"]},
            {"nome": "senza codice"},
            {"codice": "004001", "cap": [12010]},
            "not a record"
        ]"#;
        let postal = parse(json).unwrap();
        assert_eq!(postal.len(), 2);
        assert_eq!(postal["001001"], vec!["10011"]);
        assert_eq!(postal["001002"], vec!["10012"]);
        assert!(!postal.contains_key("004001"));
    }

    #[test]
    fn test_parse_rejects_non_array_document() {
        assert!(parse(br#"{"codice": "001001"}"#).is_err());
    }

    #[tokio::test]
    async fn test_fetch_malformed_payload_yields_empty_mapping() {
        let client = StaticFeedClient::default().with("test://postal", "<html>oops</html>");
        let postal = fetch(&client, &endpoint("test://postal")).await;
        assert!(postal.is_empty());
    }
}
