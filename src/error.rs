use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PublishError {
    #[error("invalid record oid: {0}")]
    InvalidOid(String),

    #[error("no record found with oid {0}")]
    RecordNotFound(String),

    #[error("record {oid} cannot be published: {reason}")]
    InvalidRecord { oid: String, reason: String },

    #[error("error fetching {name} ({file_id}): {reason}")]
    AttachmentFetch {
        name: String,
        file_id: String,
        reason: String,
    },

    #[error("missing config file at {0}")]
    MissingConfig(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("repository request failed: {0}")]
    RepositoryHttp(String),

    #[error("repository returned status {status}: {message}")]
    RepositoryStatus { status: u16, message: String },

    #[error("failed to decode record metadata: {0}")]
    RecordDecode(String),

    #[error("invalid metadata override: {0}")]
    InvalidMetadataOverride(String),

    #[error("render failed: {0}")]
    Render(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

impl PublishError {
    pub fn invalid_record(oid: &str, reason: &str) -> Self {
        PublishError::InvalidRecord {
            oid: oid.to_string(),
            reason: reason.to_string(),
        }
    }
}
