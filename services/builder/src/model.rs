//! Merged entities written to the store.

use crate::normalize::normalize;

/// Display name paired with its lookup key.
///
/// The key is derived on construction and the fields are private, so a name
/// can only be replaced as a whole and the key is never stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceName {
    display: String,
    normalized: String,
}

impl PlaceName {
    pub fn new(display: impl Into<String>) -> Self {
        let display = display.into();
        let normalized = normalize(&display);
        Self {
            display,
            normalized,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.display
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub code: String,
    pub name: PlaceName,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Province {
    pub code: String,
    pub name: PlaceName,
    pub abbreviation: String,
    pub region_code: String,
}

/// Terrain classification published with the annual geo-statistics release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AltitudeZone {
    InlandMountain,
    CoastalMountain,
    InlandHill,
    CoastalHill,
    Plain,
    /// Code outside the published table, kept verbatim.
    Unrecognized(String),
}

impl AltitudeZone {
    pub fn from_code(code: &str) -> Self {
        match code {
            "1" => Self::InlandMountain,
            "2" => Self::CoastalMountain,
            "3" => Self::InlandHill,
            "4" => Self::CoastalHill,
            "5" => Self::Plain,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    /// Label persisted in the store.
    pub fn label(&self) -> &str {
        match self {
            Self::InlandMountain => "Montagna interna",
            Self::CoastalMountain => "Montagna litoranea",
            Self::InlandHill => "Collina interna",
            Self::CoastalHill => "Collina litoranea",
            Self::Plain => "Pianura",
            Self::Unrecognized(code) => code,
        }
    }
}

/// Per-municipality attributes from the geo-statistics feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoStats {
    pub area_km2: Option<f64>,
    /// Annual resident count, used only when the daily feed has no value.
    pub population: Option<i64>,
    pub elevation_m: Option<i64>,
    pub altitude_zone: Option<AltitudeZone>,
    pub is_coastal: Option<bool>,
    pub is_island: Option<bool>,
    pub urbanization_grade: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Municipality {
    pub code: String,
    pub name: PlaceName,
    pub province_code: String,
    pub region_code: String,
    pub province_abbreviation: String,
    pub legacy_cadastral_code: Option<String>,
    pub population: Option<i64>,
    pub area_km2: Option<f64>,
    pub elevation_m: Option<i64>,
    pub altitude_zone: Option<AltitudeZone>,
    pub is_coastal: Option<bool>,
    pub is_island: Option<bool>,
    pub urbanization_grade: Option<i64>,
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostalCodeLink {
    pub postal_code: String,
    pub municipality_code: String,
}

/// Fully reconciled entity sets, ready for the loader.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub regions: Vec<Region>,
    pub provinces: Vec<Province>,
    pub municipalities: Vec<Municipality>,
    pub postal_links: Vec<PostalCodeLink>,
}
