//! Error taxonomy for the build pipeline.
//!
//! Feed failures are typed so the orchestrator can decide per source whether
//! a failure is tolerated (optional feeds) or fatal (the structural feed).

use thiserror::Error;

/// Failure while retrieving or decoding a single feed payload.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("{feed} feed did not answer within {secs}s")]
    Timeout { feed: &'static str, secs: u64 },
    #[error("no payload registered for {0}")]
    Unavailable(String),
    #[error("delimited text parse failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("archive unreadable: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("archive has no spreadsheet member")]
    NoSpreadsheet,
    #[error("spreadsheet unreadable: {0}")]
    Spreadsheet(#[from] calamine::XlsxError),
    #[error("json parse failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure that aborts a whole build.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("structural feed failed: {0}")]
    Structural(#[source] FeedError),
    #[error("structural feed yielded no municipalities")]
    EmptyStructure,
    #[error("store load failed: {0}")]
    Load(#[from] sqlx::Error),
    #[error("store file operation failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("manifest serialization failed: {0}")]
    Manifest(#[from] serde_json::Error),
}
