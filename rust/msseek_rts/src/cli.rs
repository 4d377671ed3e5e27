use clap::Parser;
use msseek::SearchConfig;
use msseek::errors::{
    MsSeekError,
    Result,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Library files to serve, in load order
    #[arg(short, long, num_args = 1.., required = true)]
    pub library: Vec<PathBuf>,

    /// Path to a JSON search configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long)]
    #[clap(default_value("127.0.0.1:3724"))]
    pub address: String,
}

impl Cli {
    pub fn read_config(&self) -> Result<SearchConfig> {
        let Some(path) = &self.config else {
            return Ok(SearchConfig::default());
        };
        let conf = match std::fs::File::open(path) {
            Ok(x) => x,
            Err(e) => {
                return Err(MsSeekError::Io {
                    source: e,
                    path: Some(path.clone()),
                });
            }
        };
        match serde_json::from_reader(conf) {
            Ok(x) => Ok(x),
            Err(e) => Err(MsSeekError::ParseError { msg: e.to_string() }),
        }
    }
}
