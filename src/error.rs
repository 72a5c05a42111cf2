use thiserror::Error;

#[derive(Error, Debug)]
pub enum PerfLensError {
    #[error("invalid run reference: {0}")]
    Parse(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("git command failed: {0}")]
    Git(String),

    #[error("transport error: status {status} from {url}")]
    Transport { status: u16, url: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// Query and connection failures are storage errors per the tool taxonomy,
// never conflated with an empty result set.
impl From<rusqlite::Error> for PerfLensError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PerfLensError>;
