use std::io;
use std::path::PathBuf;

use jaif_scene::DefinitionConflict;

/// A malformed index file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    /// 1-based line of the offending token.
    pub line: u32,
    pub message: String,
}

impl ParseError {
    pub fn new(line: u32, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Failure to read an index file from disk.
#[derive(Debug, thiserror::Error)]
pub enum IndexFileError {
    #[error("{path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: ParseError,
    },
    #[error("failed to read index file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl IndexFileError {
    pub fn parse_error(&self) -> Option<&ParseError> {
        match self {
            IndexFileError::Parse { source, .. } => Some(source),
            IndexFileError::Io { .. } => None,
        }
    }
}

/// Failure to write a scene.
///
/// Nothing is written to the sink when definitions conflict.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error(transparent)]
    Conflict(#[from] DefinitionConflict),
    #[error("failed to write index file{}: {source}", display_path(.path))]
    Io {
        path: Option<PathBuf>,
        #[source]
        source: io::Error,
    },
}

impl WriteError {
    /// Name of the annotation type whose definitions could not be merged.
    pub fn conflicting_type(&self) -> Option<&str> {
        match self {
            WriteError::Conflict(conflict) => Some(&conflict.name),
            WriteError::Io { .. } => None,
        }
    }
}

impl From<io::Error> for WriteError {
    fn from(source: io::Error) -> Self {
        WriteError::Io { path: None, source }
    }
}

fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" {}", path.display()),
        None => String::new(),
    }
}
