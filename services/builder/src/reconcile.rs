//! Merge the structural skeleton with the optional feeds.
//!
//! The structural feed decides which municipalities exist. Every other feed
//! only fills optional fields, matched by exact code.

use std::collections::HashMap;

use tracing::info;

use crate::feeds::FeedBundle;
use crate::model::{Dataset, GeoStats, Municipality, PostalCodeLink};

pub fn reconcile(bundle: &FeedBundle) -> Dataset {
    let structure = &bundle.structure;
    let mut municipalities = Vec::with_capacity(structure.municipalities.len());
    let mut postal_links = Vec::new();

    for admin in &structure.municipalities {
        let stats = bundle.geo.get(&admin.code).cloned().unwrap_or_default();
        let population = resolve_population(&admin.code, &bundle.population, &bundle.geo);

        municipalities.push(Municipality {
            code: admin.code.clone(),
            name: admin.name.clone(),
            province_code: admin.province_code.clone(),
            region_code: admin.region_code.clone(),
            province_abbreviation: admin.province_abbreviation.clone(),
            legacy_cadastral_code: admin.legacy_cadastral_code.clone(),
            population,
            area_km2: stats.area_km2,
            elevation_m: stats.elevation_m,
            altitude_zone: stats.altitude_zone,
            is_coastal: stats.is_coastal,
            is_island: stats.is_island,
            urbanization_grade: stats.urbanization_grade,
            coordinates: bundle.coordinates.get(&admin.code).copied(),
        });

        if let Some(codes) = bundle.postal.get(&admin.code) {
            postal_links.extend(codes.iter().map(|cap| PostalCodeLink {
                postal_code: cap.clone(),
                municipality_code: admin.code.clone(),
            }));
        }
    }

    let dataset = Dataset {
        regions: structure.regions.values().cloned().collect(),
        provinces: structure.provinces.values().cloned().collect(),
        municipalities,
        postal_links,
    };
    info!(
        regions = dataset.regions.len(),
        provinces = dataset.provinces.len(),
        municipalities = dataset.municipalities.len(),
        postal_links = dataset.postal_links.len(),
        "feeds reconciled"
    );
    dataset
}

/// Daily count first, then the annual release, otherwise unknown.
pub fn resolve_population(
    code: &str,
    daily: &HashMap<String, i64>,
    annual: &HashMap<String, GeoStats>,
) -> Option<i64> {
    daily
        .get(code)
        .copied()
        .or_else(|| annual.get(code).and_then(|stats| stats.population))
}
