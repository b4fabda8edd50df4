//! Relational loader for the SQLite store.
//!
//! Parents are written before children (regions, provinces, municipalities,
//! postal-code links) inside one transaction. Every insert is
//! `INSERT OR IGNORE`, so loading into a populated store only adds missing keys.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::SqliteConnection;
use tracing::info;

use crate::model::{AltitudeZone, Dataset, Municipality, PostalCodeLink, Province, Region};

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS regions (
    code TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    normalized_name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS provinces (
    code TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    normalized_name TEXT NOT NULL,
    abbreviation TEXT NOT NULL,
    region_code TEXT NOT NULL REFERENCES regions(code)
);

CREATE TABLE IF NOT EXISTS municipalities (
    code TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    normalized_name TEXT NOT NULL,
    province_code TEXT NOT NULL REFERENCES provinces(code),
    region_code TEXT NOT NULL REFERENCES regions(code),
    province_abbreviation TEXT NOT NULL,
    legacy_cadastral_code TEXT,
    population INTEGER,
    area_km2 REAL,
    elevation_m INTEGER,
    altitude_zone TEXT,
    is_coastal INTEGER,
    is_island INTEGER,
    urbanization_grade INTEGER,
    latitude REAL,
    longitude REAL
);

CREATE TABLE IF NOT EXISTS postal_codes (
    postal_code TEXT NOT NULL,
    municipality_code TEXT NOT NULL REFERENCES municipalities(code),
    PRIMARY KEY (postal_code, municipality_code)
);

CREATE INDEX IF NOT EXISTS idx_postal_codes_code ON postal_codes(postal_code);
CREATE INDEX IF NOT EXISTS idx_municipalities_name ON municipalities(normalized_name);
CREATE INDEX IF NOT EXISTS idx_municipalities_province ON municipalities(province_code);
CREATE INDEX IF NOT EXISTS idx_municipalities_region ON municipalities(region_code);
CREATE INDEX IF NOT EXISTS idx_provinces_abbreviation ON provinces(abbreviation);
CREATE INDEX IF NOT EXISTS idx_provinces_name ON provinces(normalized_name);
CREATE INDEX IF NOT EXISTS idx_regions_name ON regions(normalized_name);
"#;

/// Row and coverage counts of a finished store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSummary {
    pub municipalities: i64,
    pub regions: i64,
    pub provinces: i64,
    pub with_population: i64,
    pub with_coordinates: i64,
    pub with_postal_codes: i64,
    pub with_geo: i64,
}

impl BuildSummary {
    /// Counts a load of `dataset` into an empty store would report.
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let count = |pred: fn(&Municipality) -> bool| {
            dataset.municipalities.iter().filter(|m| pred(m)).count() as i64
        };
        let mut linked: Vec<&str> = dataset
            .postal_links
            .iter()
            .map(|link| link.municipality_code.as_str())
            .collect();
        linked.sort_unstable();
        linked.dedup();

        Self {
            municipalities: dataset.municipalities.len() as i64,
            regions: dataset.regions.len() as i64,
            provinces: dataset.provinces.len() as i64,
            with_population: count(|m| m.population.is_some()),
            with_coordinates: count(|m| m.coordinates.is_some()),
            with_postal_codes: linked.len() as i64,
            with_geo: count(|m| m.area_km2.is_some()),
        }
    }
}

/// Open (creating if needed) the store file. Rollback journal, so a closed
/// store is exactly one file.
pub async fn open_store(path: &Path) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Delete)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
}

/// Create any missing table or index. Never drops anything.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}

/// Persist `dataset` and return the resulting store counts.
///
/// Any failure rolls back the whole load.
pub async fn load(pool: &SqlitePool, dataset: &Dataset) -> Result<BuildSummary, sqlx::Error> {
    ensure_schema(pool).await?;

    let mut tx = pool.begin().await?;
    let regions = insert_regions(&mut tx, &dataset.regions).await?;
    let provinces = insert_provinces(&mut tx, &dataset.provinces).await?;
    let municipalities = insert_municipalities(&mut tx, &dataset.municipalities).await?;
    let links = insert_postal_links(&mut tx, &dataset.postal_links).await?;
    tx.commit().await?;

    info!(regions, provinces, municipalities, postal_links = links, "rows inserted");
    summarize(pool).await
}

async fn insert_regions(conn: &mut SqliteConnection, regions: &[Region]) -> Result<u64, sqlx::Error> {
    let mut inserted = 0;
    for region in regions {
        inserted += sqlx::query(
            "INSERT OR IGNORE INTO regions (code, name, normalized_name) VALUES (?, ?, ?)",
        )
        .bind(region.code.as_str())
        .bind(region.name.as_str())
        .bind(region.name.normalized())
        .execute(&mut *conn)
        .await?
        .rows_affected();
    }
    Ok(inserted)
}

async fn insert_provinces(
    conn: &mut SqliteConnection,
    provinces: &[Province],
) -> Result<u64, sqlx::Error> {
    let mut inserted = 0;
    for province in provinces {
        inserted += sqlx::query(
            r#"
            INSERT OR IGNORE INTO provinces
            (code, name, normalized_name, abbreviation, region_code)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(province.code.as_str())
        .bind(province.name.as_str())
        .bind(province.name.normalized())
        .bind(province.abbreviation.as_str())
        .bind(province.region_code.as_str())
        .execute(&mut *conn)
        .await?
        .rows_affected();
    }
    Ok(inserted)
}

async fn insert_municipalities(
    conn: &mut SqliteConnection,
    municipalities: &[Municipality],
) -> Result<u64, sqlx::Error> {
    let mut inserted = 0;
    for m in municipalities {
        inserted += sqlx::query(
            r#"
            INSERT OR IGNORE INTO municipalities
            (code, name, normalized_name, province_code, region_code,
             province_abbreviation, legacy_cadastral_code, population,
             area_km2, elevation_m, altitude_zone, is_coastal, is_island,
             urbanization_grade, latitude, longitude)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(m.code.as_str())
        .bind(m.name.as_str())
        .bind(m.name.normalized())
        .bind(m.province_code.as_str())
        .bind(m.region_code.as_str())
        .bind(m.province_abbreviation.as_str())
        .bind(m.legacy_cadastral_code.as_deref())
        .bind(m.population)
        .bind(m.area_km2)
        .bind(m.elevation_m)
        .bind(m.altitude_zone.as_ref().map(AltitudeZone::label))
        .bind(m.is_coastal)
        .bind(m.is_island)
        .bind(m.urbanization_grade)
        .bind(m.coordinates.map(|c| c.latitude))
        .bind(m.coordinates.map(|c| c.longitude))
        .execute(&mut *conn)
        .await?
        .rows_affected();
    }
    Ok(inserted)
}

async fn insert_postal_links(
    conn: &mut SqliteConnection,
    links: &[PostalCodeLink],
) -> Result<u64, sqlx::Error> {
    let mut inserted = 0;
    for link in links {
        inserted += sqlx::query(
            "INSERT OR IGNORE INTO postal_codes (postal_code, municipality_code) VALUES (?, ?)",
        )
        .bind(link.postal_code.as_str())
        .bind(link.municipality_code.as_str())
        .execute(&mut *conn)
        .await?
        .rows_affected();
    }
    Ok(inserted)
}

async fn count(pool: &SqlitePool, sql: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(sql).fetch_one(pool).await
}

/// Row and coverage counts of the store as it is now.
pub async fn summarize(pool: &SqlitePool) -> Result<BuildSummary, sqlx::Error> {
    Ok(BuildSummary {
        municipalities: count(pool, "SELECT COUNT(*) FROM municipalities").await?,
        regions: count(pool, "SELECT COUNT(*) FROM regions").await?,
        provinces: count(pool, "SELECT COUNT(*) FROM provinces").await?,
        with_population: count(
            pool,
            "SELECT COUNT(*) FROM municipalities WHERE population IS NOT NULL",
        )
        .await?,
        with_coordinates: count(
            pool,
            "SELECT COUNT(*) FROM municipalities WHERE latitude IS NOT NULL",
        )
        .await?,
        with_postal_codes: count(
            pool,
            "SELECT COUNT(DISTINCT municipality_code) FROM postal_codes",
        )
        .await?,
        with_geo: count(
            pool,
            "SELECT COUNT(*) FROM municipalities WHERE area_km2 IS NOT NULL",
        )
        .await?,
    })
}
