//! Orchestration: fetch barrier, reconcile, load, manifest.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{info, warn};

use crate::config::{Config, FeedEndpoints};
use crate::error::BuildError;
use crate::feeds::{fetch_all, FeedClient};
use crate::loader::{load, open_store, BuildSummary};
use crate::manifest::{store_status, write_manifest, Manifest, StoreStatus};
use crate::reconcile::reconcile;

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// The store was present and left untouched.
    AlreadyExists(StoreStatus),
    Refreshed(Manifest),
}

/// Fetch every feed, merge, and load into the store at `db_path`.
///
/// Nothing touches the filesystem until all feeds are in and the structural
/// one succeeded.
pub async fn build_store<C: FeedClient + ?Sized>(
    client: &C,
    feeds: &FeedEndpoints,
    db_path: &Path,
) -> Result<BuildSummary, BuildError> {
    let bundle = fetch_all(client, feeds).await?;
    let dataset = reconcile(&bundle);

    let pool = open_store(db_path).await?;
    let result = load(&pool, &dataset).await;
    pool.close().await;

    let summary = result?;
    info!(
        municipalities = summary.municipalities,
        regions = summary.regions,
        provinces = summary.provinces,
        with_population = summary.with_population,
        with_coordinates = summary.with_coordinates,
        with_postal_codes = summary.with_postal_codes,
        with_geo = summary.with_geo,
        "store built"
    );
    Ok(summary)
}

/// Fetch and merge without writing anything.
pub async fn preview<C: FeedClient + ?Sized>(
    client: &C,
    feeds: &FeedEndpoints,
) -> Result<BuildSummary, BuildError> {
    let bundle = fetch_all(client, feeds).await?;
    Ok(BuildSummary::from_dataset(&reconcile(&bundle)))
}

/// Build the store only if it does not exist yet.
pub async fn ensure_store<C: FeedClient + ?Sized>(
    client: &C,
    config: &Config,
) -> Result<RefreshOutcome, BuildError> {
    refresh(client, config, false).await
}

/// Rebuild the store from scratch.
///
/// Without `force` an existing store is reported and kept. The new store is
/// built in a staging file and renamed over the old one only once it is
/// complete, so a failed rebuild leaves the previous store as it was. The
/// manifest is staged the same way and written before the store is swapped.
pub async fn refresh<C: FeedClient + ?Sized>(
    client: &C,
    config: &Config,
    force: bool,
) -> Result<RefreshOutcome, BuildError> {
    if !force && fs::try_exists(&config.db_path).await? {
        let status = store_status(&config.db_path, &config.manifest_path).await;
        return Ok(RefreshOutcome::AlreadyExists(status));
    }

    if let Some(parent) = config.db_path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let staging = staging_path(&config.db_path);
    remove_if_exists(&staging).await?;

    let summary = match build_store(client, &config.feeds, &staging).await {
        Ok(summary) => summary,
        Err(err) => {
            if let Err(cleanup) = remove_if_exists(&staging).await {
                warn!(path = %staging.display(), error = %cleanup, "could not remove staging store");
            }
            return Err(err);
        }
    };

    let manifest = Manifest::new(&config.feeds, summary);
    let staged_manifest = staging_path(&config.manifest_path);
    let swapped = match write_manifest(&staged_manifest, &manifest).await {
        Ok(()) => fs::rename(&staging, &config.db_path).await.map_err(BuildError::from),
        Err(err) => Err(err),
    };
    if let Err(err) = swapped {
        for path in [&staging, &staged_manifest] {
            if let Err(cleanup) = remove_if_exists(path).await {
                warn!(path = %path.display(), error = %cleanup, "could not remove staging file");
            }
        }
        return Err(err);
    }
    if let Err(err) = fs::rename(&staged_manifest, &config.manifest_path).await {
        warn!(
            path = %config.manifest_path.display(),
            error = %err,
            "store replaced but manifest not updated"
        );
        return Err(err.into());
    }
    info!(path = %config.db_path.display(), "store replaced");

    Ok(RefreshOutcome::Refreshed(manifest))
}

fn staging_path(db_path: &Path) -> PathBuf {
    let mut name = db_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "store.db".into());
    name.push(".building");
    db_path.with_file_name(name)
}

async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::test_support::{endpoints, structural_payload, StaticFeedClient};
    use crate::manifest::read_manifest;
    use sqlx::sqlite::SqlitePool;
    use tempfile::tempdir;

    fn config(dir: &Path) -> Config {
        Config {
            db_path: dir.join("cache").join("italia.db"),
            manifest_path: dir.join("cache").join("manifest.json"),
            http_timeout_secs: 5,
            user_agent: "test".to_string(),
            feeds: endpoints(),
        }
    }

    fn full_client() -> StaticFeedClient {
        StaticFeedClient::default()
            .with("test://structural", structural_payload())
            .with(
                "test://population",
                "COD_ISTAT_COMUNE,RESIDENTI\n001001,2612\n001002,3790\n",
            )
            .with(
                "test://postal",
                r#"[{"codice": "001001", "cap": ["10011"]}, {"codice": "062066", "cap": ["82010"]}]"#,
            )
            .with(
                "test://coordinates",
                "codice,lat,lng\n001001,45.3667,7.7667\n001002,44.9333,7.4833\n",
            )
    }

    #[tokio::test]
    async fn test_build_store_with_all_feeds_but_geo() {
        let dir = tempdir().expect("tempdir");
        let db = dir.path().join("italia.db");

        let summary = build_store(&full_client(), &endpoints(), &db).await.unwrap();

        assert_eq!(summary.municipalities, 4);
        assert_eq!(summary.regions, 2);
        assert_eq!(summary.provinces, 3);
        assert_eq!(summary.with_population, 2);
        assert_eq!(summary.with_coordinates, 2);
        assert_eq!(summary.with_postal_codes, 2);
        assert_eq!(summary.with_geo, 0);
    }

    #[tokio::test]
    async fn test_build_without_coordinates_feed_still_completes() {
        let dir = tempdir().expect("tempdir");
        let db = dir.path().join("italia.db");
        let client = StaticFeedClient::default()
            .with("test://structural", structural_payload())
            .with("test://population", "COD_ISTAT_COMUNE,RESIDENTI\n001001,2612\n");

        let summary = build_store(&client, &endpoints(), &db).await.unwrap();
        assert_eq!(summary.municipalities, 4);
        assert_eq!(summary.with_coordinates, 0);
        assert_eq!(summary.with_postal_codes, 0);

        let pool = SqlitePool::connect(&format!("sqlite://{}", db.display()))
            .await
            .unwrap();
        let located: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM municipalities WHERE latitude IS NOT NULL OR longitude IS NOT NULL",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(located, 0);
        pool.close().await;
    }

    #[tokio::test]
    async fn test_structural_failure_produces_no_store() {
        let dir = tempdir().expect("tempdir");
        let db = dir.path().join("italia.db");
        let client = StaticFeedClient::default()
            .with("test://population", "COD_ISTAT_COMUNE,RESIDENTI\n001001,2612\n");

        let err = build_store(&client, &endpoints(), &db).await.unwrap_err();
        assert!(matches!(err, BuildError::Structural(_)));
        assert!(!db.exists());
    }

    #[tokio::test]
    async fn test_building_twice_keeps_row_counts() {
        let dir = tempdir().expect("tempdir");
        let db = dir.path().join("italia.db");

        let first = build_store(&full_client(), &endpoints(), &db).await.unwrap();
        let second = build_store(&full_client(), &endpoints(), &db).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_preview_matches_build_without_writing() {
        let dir = tempdir().expect("tempdir");
        let config = config(dir.path());

        let previewed = preview(&full_client(), &config.feeds).await.unwrap();
        assert_eq!(
            store_status(&config.db_path, &config.manifest_path).await,
            StoreStatus::NotDownloaded {
                path: config.db_path.clone()
            }
        );
        assert!(!config.manifest_path.exists());

        let built = match refresh(&full_client(), &config, false).await.unwrap() {
            RefreshOutcome::Refreshed(manifest) => manifest.records,
            other => panic!("expected a build, got {other:?}"),
        };
        assert_eq!(previewed, built);
    }

    // -------------------------------------------------------------------------
    // REFRESH
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_ensure_builds_once_then_reports_existing() {
        let dir = tempdir().expect("tempdir");
        let config = config(dir.path());

        let first = ensure_store(&full_client(), &config).await.unwrap();
        let manifest = match first {
            RefreshOutcome::Refreshed(manifest) => manifest,
            other => panic!("expected a build, got {other:?}"),
        };
        assert_eq!(manifest.records.municipalities, 4);
        assert!(config.db_path.exists());
        assert!(!staging_path(&config.db_path).exists());
        assert_eq!(read_manifest(&config.manifest_path).await, Some(manifest));

        let second = ensure_store(&full_client(), &config).await.unwrap();
        assert!(matches!(
            second,
            RefreshOutcome::AlreadyExists(StoreStatus::Ready { .. })
        ));
    }

    #[tokio::test]
    async fn test_forced_refresh_replaces_store() {
        let dir = tempdir().expect("tempdir");
        let config = config(dir.path());
        let partial = StaticFeedClient::default().with("test://structural", structural_payload());

        refresh(&partial, &config, true).await.unwrap();
        let outcome = refresh(&full_client(), &config, true).await.unwrap();

        match outcome {
            RefreshOutcome::Refreshed(manifest) => {
                assert_eq!(manifest.records.with_coordinates, 2);
                assert_eq!(manifest.records.with_population, 2);
            }
            other => panic!("expected a rebuild, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_store() {
        let dir = tempdir().expect("tempdir");
        let config = config(dir.path());
        refresh(&full_client(), &config, true).await.unwrap();
        let before = std::fs::read(&config.db_path).unwrap();

        let err = refresh(&StaticFeedClient::default(), &config, true)
            .await
            .unwrap_err();

        assert!(matches!(err, BuildError::Structural(_)));
        assert_eq!(std::fs::read(&config.db_path).unwrap(), before);
        assert!(!staging_path(&config.db_path).exists());
    }

    #[tokio::test]
    async fn test_manifest_failure_keeps_previous_store_and_manifest() {
        let dir = tempdir().expect("tempdir");
        let config = config(dir.path());
        refresh(&full_client(), &config, true).await.unwrap();
        let store_before = std::fs::read(&config.db_path).unwrap();
        let manifest_before = read_manifest(&config.manifest_path).await.unwrap();

        // A directory squatting on the staged manifest path makes the write fail.
        std::fs::create_dir(staging_path(&config.manifest_path)).unwrap();
        let partial = StaticFeedClient::default().with("test://structural", structural_payload());
        let err = refresh(&partial, &config, true).await.unwrap_err();

        assert!(matches!(err, BuildError::Io(_)));
        assert_eq!(std::fs::read(&config.db_path).unwrap(), store_before);
        assert_eq!(read_manifest(&config.manifest_path).await, Some(manifest_before));
        assert!(!staging_path(&config.db_path).exists());
    }

    #[test]
    fn test_staging_path_is_a_sibling() {
        assert_eq!(
            staging_path(Path::new("/data/italia.db")),
            PathBuf::from("/data/italia.db.building")
        );
    }
}
