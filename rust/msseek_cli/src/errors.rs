use msseek::MsSeekError;

#[derive(Debug)]
pub enum CliError {
    Config {
        source: String,
    },
    ParseError {
        msg: String,
    },
    Io {
        source: String,
        path: Option<String>,
    },
    Search {
        source: MsSeekError,
    },
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Config { source } => write!(f, "Error interpreting the config: {}", source),
            CliError::ParseError { msg } => write!(f, "Error parsing config: {}", msg),
            CliError::Io { source, path } => {
                if let Some(path) = path {
                    write!(f, "Error writing file {}: {}", path, source)
                } else {
                    write!(f, "IO error: {}", source)
                }
            }
            CliError::Search { source } => write!(f, "Search failed: {}", source),
        }
    }
}

impl std::error::Error for CliError {}

impl From<MsSeekError> for CliError {
    fn from(e: MsSeekError) -> Self {
        CliError::Search { source: e }
    }
}

impl From<csv::Error> for CliError {
    fn from(e: csv::Error) -> Self {
        CliError::Io {
            source: e.to_string(),
            path: None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io {
            source: e.to_string(),
            path: None,
        }
    }
}
