//! # Error Definitions

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The delegate could not produce the content, or it failed verification.
    Download(String),
    /// The cache could not store or update an entry.
    Cache(String),
    /// Nothing is available at the requested location.
    NotFound(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Download(msg) => write!(f, "Download failed: {}", msg),
            Self::Cache(msg) => write!(f, "Cache error: {}", msg),
            Self::NotFound(what) => write!(f, "Not found: {}", what),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
