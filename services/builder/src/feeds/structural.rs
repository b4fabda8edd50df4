//! Structural feed: the administrative skeleton every other feed aligns to.
//!
//! The payload is a semicolon-delimited table in Windows-1252. Its columns
//! are positional, so all positional knowledge lives in `column` and
//! `AdminRow`; a layout change in the published file is a local edit there.

use std::collections::{BTreeMap, HashSet};

use csv::StringRecord;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::{debug, info};

use super::{download, FeedClient};
use crate::config::FeedEndpoint;
use crate::error::FeedError;
use crate::model::{PlaceName, Province, Region};

const FEED: &str = "structural";

/// Rows shorter than this are headers, notes or footers.
const MIN_COLUMNS: usize = 20;

mod column {
    pub const REGION_CODE: usize = 0;
    pub const PROVINCE_CODE: usize = 2;
    pub const MUNICIPALITY_CODE: usize = 4;
    pub const NAME_ANY_LANGUAGE: usize = 5;
    pub const NAME_ITALIAN: usize = 6;
    pub const REGION_NAME: usize = 10;
    pub const PROVINCE_NAME: usize = 11;
    pub const PROVINCE_ABBREVIATION: usize = 14;
    pub const CADASTRAL_CODE: usize = 19;
}

/// A municipality's identity fields before enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminMunicipality {
    pub code: String,
    pub name: PlaceName,
    pub province_code: String,
    pub region_code: String,
    pub province_abbreviation: String,
    pub legacy_cadastral_code: Option<String>,
}

/// Region/province/municipality skeleton decoded from the structural feed.
#[derive(Debug, Default)]
pub struct AdminStructure {
    pub regions: BTreeMap<String, Region>,
    pub provinces: BTreeMap<String, Province>,
    /// Feed order, one entry per code.
    pub municipalities: Vec<AdminMunicipality>,
}

pub async fn fetch<C: FeedClient + ?Sized>(
    client: &C,
    endpoint: &FeedEndpoint,
) -> Result<AdminStructure, FeedError> {
    let bytes = download(client, FEED, endpoint).await?;
    let structure = parse(&bytes)?;
    info!(
        feed = FEED,
        regions = structure.regions.len(),
        provinces = structure.provinces.len(),
        records = structure.municipalities.len(),
        "feed loaded"
    );
    Ok(structure)
}

/// Decode a raw structural payload.
pub fn parse(bytes: &[u8]) -> Result<AdminStructure, FeedError> {
    let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut structure = AdminStructure::default();
    let mut seen = HashSet::new();
    let mut skipped = 0usize;

    for result in reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(_) => {
                skipped += 1;
                continue;
            }
        };
        let row = AdminRow(&record);
        let Some(code) = row.municipality_code() else {
            skipped += 1;
            continue;
        };

        let region_code = row.region_code();
        let province_code = row.province_code();
        let abbreviation = row.province_abbreviation().to_string();

        structure
            .regions
            .entry(region_code.clone())
            .or_insert_with(|| Region {
                code: region_code.clone(),
                name: PlaceName::new(row.region_name()),
            });

        structure
            .provinces
            .entry(province_code.clone())
            .or_insert_with(|| Province {
                code: province_code.clone(),
                name: PlaceName::new(row.province_name()),
                abbreviation: abbreviation.clone(),
                region_code: region_code.clone(),
            });

        if !seen.insert(code.to_string()) {
            skipped += 1;
            continue;
        }

        structure.municipalities.push(AdminMunicipality {
            code: code.to_string(),
            name: PlaceName::new(row.municipality_name()),
            province_code,
            region_code,
            province_abbreviation: abbreviation,
            legacy_cadastral_code: row.cadastral_code().map(str::to_string),
        });
    }

    if skipped > 0 {
        debug!(feed = FEED, skipped, "rows skipped");
    }
    Ok(structure)
}

/// Named access to one positional row of the structural table.
struct AdminRow<'r>(&'r StringRecord);

impl<'r> AdminRow<'r> {
    fn field(&self, idx: usize) -> &'r str {
        self.0.get(idx).map(str::trim).unwrap_or("")
    }

    /// The six-digit code, or `None` for rows that are not municipalities.
    fn municipality_code(&self) -> Option<&'r str> {
        if self.0.len() < MIN_COLUMNS {
            return None;
        }
        let code = self.field(column::MUNICIPALITY_CODE);
        (code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit())).then_some(code)
    }

    fn region_code(&self) -> String {
        format!("{:0>2}", self.field(column::REGION_CODE))
    }

    fn province_code(&self) -> String {
        format!("{:0>3}", self.field(column::PROVINCE_CODE))
    }

    fn region_name(&self) -> String {
        repair_accents(self.field(column::REGION_NAME))
    }

    fn province_name(&self) -> String {
        repair_accents(self.field(column::PROVINCE_NAME))
    }

    fn province_abbreviation(&self) -> &'r str {
        self.field(column::PROVINCE_ABBREVIATION)
    }

    /// Italian name when present, otherwise the multilingual one.
    fn municipality_name(&self) -> String {
        let italian = self.field(column::NAME_ITALIAN);
        let name = if italian.is_empty() {
            self.field(column::NAME_ANY_LANGUAGE)
        } else {
            italian
        };
        repair_accents(name)
    }

    fn cadastral_code(&self) -> Option<&'r str> {
        Some(self.field(column::CADASTRAL_CODE)).filter(|c| !c.is_empty())
    }
}

static TRAILING_APOSTROPHE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([aeiouAEIOU])'(\s|$|[^a-zA-Z])").expect("accent pattern is valid")
});

/// Restore grave accents written as `<vowel>'` in the legacy feed.
///
/// Only an apostrophe followed by whitespace, end of text or a non-letter is
/// an accent; `Sant'Angelo` keeps its elision.
pub fn repair_accents(name: &str) -> String {
    TRAILING_APOSTROPHE
        .replace_all(name, |caps: &Captures| {
            format!("{}{}", grave(&caps[1]), &caps[2])
        })
        .into_owned()
}

fn grave(vowel: &str) -> &'static str {
    match vowel {
        "a" => "à",
        "e" => "è",
        "i" => "ì",
        "o" => "ò",
        "u" => "ù",
        "A" => "À",
        "E" => "È",
        "I" => "Ì",
        "O" => "Ò",
        _ => "Ù",
    }
}
