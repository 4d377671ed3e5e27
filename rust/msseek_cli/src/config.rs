use msseek::{
    SearchConfig,
    SearchMode,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::path::PathBuf;

use crate::cli::Cli;
use crate::errors::CliError;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    pub input: Option<InputConfig>,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct InputConfig {
    #[serde(default)]
    pub libraries: Vec<PathBuf>,
    pub queries: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Queries per progress bar step.
    pub chunk_size: usize,
    pub n_hits: usize,
    pub mode: SearchMode,
    pub search: SearchConfig,
    /// Address of a `msseek_rts` daemon; when set no library is loaded locally.
    pub remote: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            chunk_size: 256,
            n_hits: 10,
            mode: SearchMode::Quick,
            search: SearchConfig::default(),
            remote: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    pub directory: PathBuf,
}

/// Fully resolved inputs of a batch run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub libraries: Vec<PathBuf>,
    pub queries: PathBuf,
    pub analysis: AnalysisConfig,
    pub output: OutputConfig,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, CliError> {
        let file = std::fs::File::open(path).map_err(|e| CliError::Io {
            source: e.to_string(),
            path: Some(path.to_string_lossy().to_string()),
        })?;
        serde_json::from_reader(file).map_err(|e| CliError::ParseError { msg: e.to_string() })
    }

    /// Overrides config values with the ones given on the command line and
    /// checks that everything a run needs is present.
    pub fn with_cli_args(mut self, args: &Cli) -> Result<RunConfig, CliError> {
        let input = self.input.get_or_insert_with(InputConfig::default);
        if !args.library.is_empty() {
            input.libraries = args.library.clone();
        }
        if let Some(queries) = &args.queries {
            input.queries = Some(queries.clone());
        }
        if let Some(output_dir) = &args.output_dir {
            self.output = Some(OutputConfig {
                directory: output_dir.clone(),
            });
        }
        if let Some(n_hits) = args.n_hits {
            self.analysis.n_hits = n_hits;
        }
        if args.full {
            self.analysis.mode = SearchMode::Full;
        }
        if let Some(remote) = &args.remote {
            self.analysis.remote = Some(remote.clone());
        }
        if self.analysis.chunk_size == 0 {
            return Err(CliError::Config {
                source: "chunk_size must be at least 1".to_string(),
            });
        }

        let input = self.input.unwrap_or_default();
        let queries = input.queries.ok_or_else(|| CliError::Config {
            source: "No queries provided, please provide them in either the config file or with the --queries flag".to_string(),
        })?;
        if input.libraries.is_empty() && self.analysis.remote.is_none() {
            return Err(CliError::Config {
                source: "No library provided, please provide one in either the config file or with the --library flag (or use --remote)".to_string(),
            });
        }
        let output = self.output.ok_or_else(|| CliError::Config {
            source: "No output directory provided, please provide one in either the config file or with the --output-dir flag".to_string(),
        })?;

        Ok(RunConfig {
            libraries: input.libraries,
            queries,
            analysis: self.analysis,
            output,
        })
    }
}
