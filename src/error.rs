use std::path::PathBuf;

/// Errors raised while setting up an extraction run.
///
/// Extraction itself never fails: malformed wikitext is logged and skipped.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("error reading {}: {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("i/o failed: {0}")]
    IoFailed(#[from] std::io::Error),
    #[error("error parsing schema YAML: {0}")]
    SchemaFailed(#[from] serde_yaml::Error),
    #[error("error writing jsonl output: {0}")]
    SerdeFailed(#[from] serde_json::Error),
    #[error("error compiling pattern `{pattern}`: {source}")]
    PatternFailed {
        pattern: String,
        source: regex::Error,
    },
    #[error("no profile for edition `{0}`")]
    UnknownEdition(String),
}

pub type Result<T> = std::result::Result<T, Error>;
