use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Library files to search (will over-write the config file)
    #[arg(short, long, num_args = 1..)]
    pub library: Vec<PathBuf>,

    /// File with the query spectra, in any library format (will over-write the config file)
    #[arg(short, long)]
    pub queries: Option<PathBuf>,

    /// Path to the output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Number of hits reported per query
    #[arg(short, long)]
    pub n_hits: Option<usize>,

    /// Score every library record instead of only the indexed candidates
    #[arg(short, long)]
    pub full: bool,

    /// Address of a running msseek_rts daemon to search instead of loading libraries
    #[arg(short, long)]
    pub remote: Option<String>,
}
