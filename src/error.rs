use std::path::PathBuf;

use thiserror::Error;

/// Transport/HTTP failure for a single request. Recovered at page
/// granularity by the pipeline: a failed page contributes zero records.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// A single vacancy card could not be turned into a record. Recovered at
/// item granularity: the card is skipped, siblings keep extracting.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("vacancy card is missing required field `{0}`")]
    RequiredFieldMissing(&'static str),
}

/// Storage failures are fatal to the run; the replace-all write is a single
/// transaction, so the previous snapshot survives any of these.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not create database directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("database error: {0}")]
    Db(#[from] duckdb::Error),
}

/// Run-level errors surfaced by `runFullScrape`-style entry points.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("pager block present but its page count could not be read")]
    PaginationParse,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no description block found at {url}")]
    DescriptionMissing { url: String },
}
