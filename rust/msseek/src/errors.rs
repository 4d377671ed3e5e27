use std::path::PathBuf;

#[derive(Debug)]
pub enum LibraryReadingError {
    SpeclibParsingError {
        source: serde_json::Error,
        context: &'static str,
    },
    MspParsingError {
        line: usize,
        context: String,
    },
    FileReadingError {
        source: std::io::Error,
        context: &'static str,
        path: PathBuf,
    },
    /// Entry decoded fine but its content is not a valid record.
    InvalidEntry {
        name: String,
        context: String,
    },
}

impl std::fmt::Display for LibraryReadingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SpeclibParsingError { source, context } => {
                write!(f, "{}: {}", context, source)
            }
            Self::MspParsingError { line, context } => {
                write!(f, "Error parsing MSP at line {}: {}", line, context)
            }
            Self::FileReadingError {
                source,
                context,
                path,
            } => write!(f, "{} ({}): {}", context, path.display(), source),
            Self::InvalidEntry { name, context } => {
                write!(f, "Invalid entry '{}': {}", name, context)
            }
        }
    }
}

/// Kind tag for [`MsSeekError`], used to carry errors across the remote protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidSpectrum,
    EmptySpectrum,
    LibraryNotLoaded,
    NotFound,
    InvalidQuery,
    Cancelled,
    Timeout,
    Io,
    Parse,
    LibraryReading,
    Remote,
}

#[derive(Debug)]
pub enum MsSeekError {
    InvalidSpectrum {
        context: String,
    },
    EmptySpectrum {
        context: String,
    },
    LibraryNotLoaded,
    NotFound {
        lib_idx: usize,
        spec_loc: Option<u32>,
    },
    InvalidQuery {
        context: String,
    },
    Cancelled,
    Timeout {
        attempts: u32,
        context: String,
    },
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },
    ParseError {
        msg: String,
    },
    LibraryReadingError(LibraryReadingError),
    /// Error reported by a remote engine that has no local equivalent.
    Remote {
        kind: ErrorKind,
        msg: String,
    },
}

impl MsSeekError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidSpectrum { .. } => ErrorKind::InvalidSpectrum,
            Self::EmptySpectrum { .. } => ErrorKind::EmptySpectrum,
            Self::LibraryNotLoaded => ErrorKind::LibraryNotLoaded,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidQuery { .. } => ErrorKind::InvalidQuery,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Io { .. } => ErrorKind::Io,
            Self::ParseError { .. } => ErrorKind::Parse,
            Self::LibraryReadingError(_) => ErrorKind::LibraryReading,
            Self::Remote { kind, .. } => *kind,
        }
    }

    pub fn append_to_context(mut self, extra: &str) -> Self {
        match &mut self {
            Self::InvalidSpectrum { context }
            | Self::EmptySpectrum { context }
            | Self::InvalidQuery { context }
            | Self::Timeout { context, .. } => context.push_str(extra),
            Self::ParseError { msg } | Self::Remote { msg, .. } => msg.push_str(extra),
            _ => {}
        }
        self
    }
}

impl std::fmt::Display for MsSeekError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSpectrum { context } => write!(f, "Invalid spectrum: {}", context),
            Self::EmptySpectrum { context } => write!(f, "Empty spectrum: {}", context),
            Self::LibraryNotLoaded => write!(f, "No library has been loaded"),
            Self::NotFound {
                lib_idx,
                spec_loc: Some(loc),
            } => write!(f, "No record at spec_loc {} in library {}", loc, lib_idx),
            Self::NotFound {
                lib_idx,
                spec_loc: None,
            } => write!(f, "No library with index {}", lib_idx),
            Self::InvalidQuery { context } => write!(f, "Invalid query: {}", context),
            Self::Cancelled => write!(f, "Search was cancelled"),
            Self::Timeout { attempts, context } => {
                write!(f, "Timed out after {} attempts: {}", attempts, context)
            }
            Self::Io { source, path } => match path {
                Some(path) => write!(f, "Error reading file {}: {}", path.display(), source),
                None => write!(f, "IO error: {}", source),
            },
            Self::ParseError { msg } => write!(f, "Parse error: {}", msg),
            Self::LibraryReadingError(e) => write!(f, "Error reading library: {}", e),
            Self::Remote { kind, msg } => write!(f, "Remote engine error ({:?}): {}", kind, msg),
        }
    }
}

impl std::error::Error for MsSeekError {}

pub type Result<T> = std::result::Result<T, MsSeekError>;

impl From<std::io::Error> for MsSeekError {
    fn from(x: std::io::Error) -> Self {
        Self::Io {
            source: x,
            path: None,
        }
    }
}

impl From<std::num::ParseIntError> for MsSeekError {
    fn from(x: std::num::ParseIntError) -> Self {
        Self::ParseError { msg: x.to_string() }
    }
}

impl From<std::num::ParseFloatError> for MsSeekError {
    fn from(x: std::num::ParseFloatError) -> Self {
        Self::ParseError { msg: x.to_string() }
    }
}

impl From<serde_json::Error> for MsSeekError {
    fn from(val: serde_json::Error) -> Self {
        MsSeekError::ParseError {
            msg: val.to_string(),
        }
    }
}

impl From<LibraryReadingError> for MsSeekError {
    fn from(x: LibraryReadingError) -> Self {
        Self::LibraryReadingError(x)
    }
}
