use std::io;
use std::path::PathBuf;
use thiserror::Error;
use time::OffsetDateTime;

/// A whole export file was rejected. Other files keep loading.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} is not valid JSON", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{}: expected a JSON array of streaming records", path.display())]
    Shape { path: PathBuf },
}

impl ParseError {
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Io { path, .. } | Self::Json { path, .. } | Self::Shape { path } => path,
        }
    }
}

/// A single record lacked required fields and was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record {index}: {reason}")]
pub struct SchemaError {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("range starts at {since} after it ends at {to}")]
pub struct EmptyRangeError {
    pub since: OffsetDateTime,
    pub to: OffsetDateTime,
}

/// Non-fatal: the country had no zone mapping and UTC was used.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[error("no timezone known for country {country:?}, using UTC")]
pub struct UnmappedTimezoneWarning {
    pub country: String,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write CSV")]
    Csv(#[from] csv::Error),
    #[error("failed to write JSON")]
    Json(#[from] serde_json::Error),
    #[error("failed to flush export output")]
    Io(#[from] io::Error),
}
