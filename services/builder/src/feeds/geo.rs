//! Annual geo-statistics: a spreadsheet shipped inside a zip archive.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use calamine::{Data, Reader, Xlsx};
use tracing::debug;

use super::{canonical_code, download, tolerate, FeedClient};
use crate::config::FeedEndpoint;
use crate::error::FeedError;
use crate::model::{AltitudeZone, GeoStats};

const FEED: &str = "geo";

const MIN_COLUMNS: usize = 14;

mod column {
    pub const CODE: usize = 1;
    pub const AREA_KM2: usize = 5;
    pub const POPULATION: usize = 7;
    pub const ALTITUDE_ZONE: usize = 8;
    pub const ELEVATION_M: usize = 9;
    pub const COASTAL: usize = 10;
    pub const ISLAND: usize = 11;
    pub const URBANIZATION_GRADE: usize = 13;
}

pub async fn fetch<C: FeedClient + ?Sized>(
    client: &C,
    endpoint: &FeedEndpoint,
) -> HashMap<String, GeoStats> {
    let result = match download(client, FEED, endpoint).await {
        Ok(bytes) => parse(bytes),
        Err(err) => Err(err),
    };
    tolerate(FEED, result)
}

/// Open the archive, read the first spreadsheet member's first sheet.
pub fn parse(archive_bytes: Vec<u8>) -> Result<HashMap<String, GeoStats>, FeedError> {
    let sheet_bytes = extract_spreadsheet(archive_bytes)?;
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(sheet_bytes))?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range?,
        None => return Ok(HashMap::new()),
    };
    Ok(parse_rows(range.rows()))
}

fn extract_spreadsheet(archive_bytes: Vec<u8>) -> Result<Vec<u8>, FeedError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(archive_bytes))?;

    for idx in 0..archive.len() {
        let mut file = archive.by_index(idx)?;
        if !file.name().to_ascii_lowercase().ends_with(".xlsx") {
            continue;
        }
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        debug!(feed = FEED, member = %file.name(), bytes = buf.len(), "spreadsheet extracted");
        return Ok(buf);
    }

    Err(FeedError::NoSpreadsheet)
}

/// Decode sheet rows; rows without a usable six-digit code are skipped.
pub fn parse_rows<'a>(rows: impl IntoIterator<Item = &'a [Data]>) -> HashMap<String, GeoStats> {
    let mut geo = HashMap::new();
    let mut skipped = 0usize;

    for row in rows {
        if row.len() < MIN_COLUMNS {
            skipped += 1;
            continue;
        }
        let Some(code) = cell_text(&row[column::CODE]).and_then(|c| canonical_code(&c)) else {
            skipped += 1;
            continue;
        };

        geo.insert(
            code,
            GeoStats {
                area_km2: cell_f64(&row[column::AREA_KM2]),
                population: cell_i64(&row[column::POPULATION]),
                elevation_m: cell_i64(&row[column::ELEVATION_M]),
                altitude_zone: cell_text(&row[column::ALTITUDE_ZONE])
                    .map(|z| AltitudeZone::from_code(&z)),
                is_coastal: cell_flag(&row[column::COASTAL]),
                is_island: cell_flag(&row[column::ISLAND]),
                urbanization_grade: cell_i64(&row[column::URBANIZATION_GRADE]),
            },
        );
    }

    if skipped > 0 {
        debug!(feed = FEED, skipped, "rows skipped");
    }
    geo
}

/// Cell as text; numbers are rendered as integers (`5.0` -> `"5"`).
fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) if f.is_finite() => Some((*f as i64).to_string()),
        Data::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        _ => None,
    }
}

fn cell_f64(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(f) if f.is_finite() => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn cell_i64(cell: &Data) -> Option<i64> {
    match cell {
        Data::Int(i) => Some(*i),
        Data::Float(f) if f.is_finite() => Some(*f as i64),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn cell_flag(cell: &Data) -> Option<bool> {
    match cell_i64(cell)? {
        0 => Some(false),
        1 => Some(true),
        _ => None,
    }
}
