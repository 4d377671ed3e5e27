/// Writes and reads small reference libraries.
///
/// Mainly used to produce fixtures and to check that libraries converted
/// elsewhere are read the way the search engine sees them.
use clap::{
    Parser,
    Subcommand,
};
use msseek::data_sources::{
    SerReferenceEntry,
    read_library_file,
    write_library_file,
};
use msseek::errors::Result;
use msseek::{
    CasNumber,
    ReferenceRecord,
    Spectrum,
};
use std::path::{
    Path,
    PathBuf,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: SubCommands,
}

#[derive(Subcommand)]
enum SubCommands {
    /// Writes a sample library, format taken from the extension.
    /// Prints NDJSON to stdout when no output is given.
    Sample {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    Parse {
        #[arg(short, long)]
        library_file: PathBuf,
    },
}

fn sample_records() -> Result<Vec<ReferenceRecord>> {
    Ok(vec![
        ReferenceRecord::sample(),
        ReferenceRecord::new(
            "2,4-DINITROPHENOL",
            CasNumber::parse("51-28-5")?,
            184,
            Spectrum::from_peaks(vec![
                (51.0, 500.0),
                (53.0, 999.0),
                (63.0, 185.0),
                (79.0, 222.0),
                (91.0, 555.0),
                (107.0, 270.0),
                (154.0, 180.0),
                (184.0, 500.0),
            ])?,
        )
        .with_formula("C6H4N2O5"),
        ReferenceRecord::new(
            "1-NITROPYRENE",
            CasNumber::parse("5522-43-0")?,
            247,
            Spectrum::from_peaks(vec![
                (187.0, 240.0),
                (189.0, 310.0),
                (200.0, 280.0),
                (201.0, 999.0),
                (217.0, 490.0),
                (247.0, 820.0),
            ])?,
        )
        .with_formula("C16H9NO2"),
        ReferenceRecord::new(
            "ACETONE",
            CasNumber::parse("67-64-1")?,
            58,
            Spectrum::from_peaks(vec![(15.0, 120.0), (43.0, 999.0), (58.0, 300.0)])?,
        )
        .with_formula("C3H6O")
        .with_synonyms(vec!["2-Propanone".into()])
        .with_contributor("NIST Mass Spectrometry Data Center"),
    ])
}

fn write_sample(output: Option<&PathBuf>) -> Result<()> {
    let records = sample_records()?;
    match output {
        Some(path) => write_library_file(path, &records),
        None => {
            for record in records.iter() {
                println!("{}", serde_json::to_string(&SerReferenceEntry::from(record))?);
            }
            Ok(())
        }
    }
}

fn parse_library(library_file: &Path) -> Result<()> {
    for entry in read_library_file(library_file)? {
        match entry {
            Ok(record) => println!("{:#?}", record),
            Err(e) => eprintln!("Unreadable entry: {}", e),
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        SubCommands::Sample { output } => write_sample(output.as_ref()),
        SubCommands::Parse { library_file } => parse_library(library_file),
    }
}
