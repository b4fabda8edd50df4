use std::path::PathBuf;
use std::time::Duration;

pub const STRUCTURAL_URL: &str =
    "https://www.istat.it/storage/codici-unita-amministrative/Elenco-comuni-italiani.csv";
pub const POPULATION_URL: &str =
    "https://raw.githubusercontent.com/italia/anpr-opendata/main/data/popolazione_residente_export.csv";
pub const GEO_URL: &str =
    "https://www.istat.it/wp-content/uploads/2024/05/Classificazioni-statistiche-Anno_2026.zip";
pub const POSTAL_URL: &str =
    "https://raw.githubusercontent.com/matteocontrini/comuni-json/master/comuni.json";
pub const COORDINATES_URL: &str =
    "https://raw.githubusercontent.com/opendatasicilia/comuni-italiani/main/dati/coordinate.csv";

/// One feed endpoint plus the longest the build will wait for it.
#[derive(Debug, Clone)]
pub struct FeedEndpoint {
    pub url: String,
    pub wait: Duration,
}

impl FeedEndpoint {
    fn from_env(var: &str, default_url: &str, wait_secs: u64) -> Self {
        Self {
            url: std::env::var(var).unwrap_or_else(|_| default_url.to_string()),
            wait: Duration::from_secs(wait_secs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedEndpoints {
    pub structural: FeedEndpoint,
    pub population: FeedEndpoint,
    pub geo: FeedEndpoint,
    pub postal: FeedEndpoint,
    pub coordinates: FeedEndpoint,
}

impl FeedEndpoints {
    pub fn from_env() -> Self {
        Self {
            structural: FeedEndpoint::from_env("ITALIA_STRUCTURAL_URL", STRUCTURAL_URL, 60),
            population: FeedEndpoint::from_env("ITALIA_POPULATION_URL", POPULATION_URL, 60),
            geo: FeedEndpoint::from_env("ITALIA_GEO_URL", GEO_URL, 120),
            postal: FeedEndpoint::from_env("ITALIA_POSTAL_URL", POSTAL_URL, 120),
            coordinates: FeedEndpoint::from_env("ITALIA_COORDINATES_URL", COORDINATES_URL, 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub manifest_path: PathBuf,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub feeds: FeedEndpoints,
}

impl Config {
    pub fn from_env() -> Self {
        let db_path = std::env::var("ITALIA_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/italia.db"));
        let manifest_path = std::env::var("ITALIA_MANIFEST_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_manifest_path(&db_path));

        Self {
            db_path,
            manifest_path,
            http_timeout_secs: std::env::var("ITALIA_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(120),
            user_agent: std::env::var("ITALIA_USER_AGENT")
                .unwrap_or_else(|_| "italia-builder/0.1 (open data reference build)".to_string()),
            feeds: FeedEndpoints::from_env(),
        }
    }

    /// Point the build at another store; the manifest follows it.
    pub fn with_db_path(mut self, db_path: PathBuf) -> Self {
        self.manifest_path = default_manifest_path(&db_path);
        self.db_path = db_path;
        self
    }
}

fn default_manifest_path(db_path: &std::path::Path) -> PathBuf {
    db_path.with_file_name("manifest.json")
}
