use std::path::PathBuf;
use thiserror::Error;

pub type ReadResult<T> = Result<T, ReadError>;

/// Why a derived file could not be read back into an outline
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReadError {
    #[error("No @+leo header sentinel found in {path}")]
    MissingHeader { path: String },

    #[error("Unsupported derived file version {version} in {path}")]
    UnsupportedVersion { path: String, version: u32 },

    #[error("Missing @-leo sentinel at end of {path}")]
    MissingLeo { path: String },

    #[error("Malformed derived file at line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("Invalid node sentinel at line {line}: {message}")]
    InvalidNode { line: usize, message: String },
}

impl ReadError {
    pub fn missing_header(path: impl Into<String>) -> Self {
        Self::MissingHeader { path: path.into() }
    }

    pub fn unsupported_version(path: impl Into<String>, version: u32) -> Self {
        Self::UnsupportedVersion {
            path: path.into(),
            version,
        }
    }

    pub fn missing_leo(path: impl Into<String>) -> Self {
        Self::MissingLeo { path: path.into() }
    }

    pub fn malformed(line: usize, message: impl Into<String>) -> Self {
        Self::Malformed {
            line,
            message: message.into(),
        }
    }

    pub fn invalid_node(line: usize, message: impl Into<String>) -> Self {
        Self::InvalidNode {
            line,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failures of the file adapter
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error("Refusing to write {path}: {count} error(s) while writing")]
    WriteErrors { path: PathBuf, count: usize },
}

impl PersistError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
