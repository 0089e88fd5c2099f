use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("invalid media id: {0}")]
    InvalidMediaId(String),

    #[error("missing config file at {0}")]
    MissingConfig(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("AniList request failed: {0}")]
    AniListHttp(String),

    #[error("AniList returned status {status}: {message}")]
    AniListStatus { status: u16, message: String },

    #[error("AniList query failed: {0}")]
    AniListQuery(String),

    #[error("rate limited by remote service (retry after {retry_after}s)")]
    #[diagnostic(help("wait for the countdown to finish before retrying"))]
    RateLimited { retry_after: u64 },

    #[error("media id is not tracked: {0}")]
    NotTracked(String),

    #[error("media id is not awaiting resolution: {0}")]
    NotUnresolved(String),

    #[error("media id is already tracked: {0}")]
    #[diagnostic(help("remove the existing entry before resolving onto it"))]
    AlreadyTracked(String),

    #[error("invalid candidate choice {choice}: {available} candidate(s) available")]
    InvalidCandidate { choice: usize, available: usize },

    #[error("failed to parse import file: {0}")]
    ImportParse(String),
}
