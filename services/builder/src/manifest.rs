//! Build manifest kept as a JSON file beside the store.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::config::FeedEndpoints;
use crate::error::BuildError;
use crate::loader::BuildSummary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceUrls {
    pub structural: String,
    pub population: String,
    pub geo: String,
    pub postal: String,
    pub coordinates: String,
}

impl From<&FeedEndpoints> for SourceUrls {
    fn from(feeds: &FeedEndpoints) -> Self {
        Self {
            structural: feeds.structural.url.clone(),
            population: feeds.population.url.clone(),
            geo: feeds.geo.url.clone(),
            postal: feeds.postal.url.clone(),
            coordinates: feeds.coordinates.url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub sources: SourceUrls,
    pub downloaded_at: DateTime<Utc>,
    pub records: BuildSummary,
}

impl Manifest {
    pub fn new(feeds: &FeedEndpoints, records: BuildSummary) -> Self {
        Self {
            sources: SourceUrls::from(feeds),
            downloaded_at: Utc::now(),
            records,
        }
    }
}

pub async fn write_manifest(path: &Path, manifest: &Manifest) -> Result<(), BuildError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(manifest)?;
    fs::write(path, json).await?;
    Ok(())
}

/// `None` when there is no manifest or it cannot be read.
pub async fn read_manifest(path: &Path) -> Option<Manifest> {
    let text = fs::read_to_string(path).await.ok()?;
    serde_json::from_str(&text).ok()
}

/// What a caller sees when asking about the local store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StoreStatus {
    NotDownloaded {
        path: PathBuf,
    },
    Ready {
        path: PathBuf,
        size_mb: f64,
        downloaded_at: Option<DateTime<Utc>>,
        records: Option<BuildSummary>,
        sources: Option<SourceUrls>,
    },
}

pub async fn store_status(db_path: &Path, manifest_path: &Path) -> StoreStatus {
    let Ok(meta) = fs::metadata(db_path).await else {
        return StoreStatus::NotDownloaded {
            path: db_path.to_path_buf(),
        };
    };
    let manifest = read_manifest(manifest_path).await;
    let size_mb = (meta.len() as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0;

    StoreStatus::Ready {
        path: db_path.to_path_buf(),
        size_mb,
        downloaded_at: manifest.as_ref().map(|m| m.downloaded_at),
        records: manifest.as_ref().map(|m| m.records.clone()),
        sources: manifest.map(|m| m.sources),
    }
}
