//! JSON export of crawl output, for runs that should not touch the catalog,
//! and the reader that loads such an export back for a later import.

use std::path::Path;

use thiserror::Error;

use crate::engine::CrawlOutput;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write export to {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize crawl output: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to read export {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a crawl export: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Writes `output` as pretty-printed JSON to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns [`ExportError`] if serialization or the write fails.
pub fn write_export(path: &Path, output: &CrawlOutput) -> Result<(), ExportError> {
    let json = serde_json::to_string_pretty(output).map_err(ExportError::Serialize)?;
    std::fs::write(path, json).map_err(|source| ExportError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Loads a file written by [`write_export`].
///
/// # Errors
///
/// Returns [`ExportError::Read`] if the file cannot be read and
/// [`ExportError::Parse`] if it is not a crawl export.
pub fn read_export(path: &Path) -> Result<CrawlOutput, ExportError> {
    let json = std::fs::read_to_string(path).map_err(|source| ExportError::Read {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&json).map_err(|source| ExportError::Parse {
        path: path.display().to_string(),
        source,
    })
}
