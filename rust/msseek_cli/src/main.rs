mod cli;
mod config;
mod errors;
mod processing;

use clap::Parser;
use msseek::remote::{
    RemoteEngine,
    RetryPolicy,
};
use msseek::{
    Engine,
    LibraryHandle,
    SearchCoordinator,
};
use tracing::level_filters::LevelFilter;
use tracing::{
    error,
    info,
};
use tracing_subscriber::EnvFilter;

use cli::Cli;
use config::{
    Config,
    RunConfig,
};

#[cfg(target_os = "windows")]
use mimalloc::MiMalloc;

#[cfg(target_os = "windows")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn build_local_engine(
    run: &RunConfig,
) -> Result<(SearchCoordinator, Vec<LibraryHandle>), errors::CliError> {
    let mut coordinator = SearchCoordinator::new(run.analysis.search.clone());
    let mut handles = Vec::with_capacity(run.libraries.len());
    for path in run.libraries.iter() {
        let st = std::time::Instant::now();
        let handle = coordinator.load_library_file(path)?;
        info!(
            "Library {} ({}) ready in {:?}: {} records, {} rejected",
            handle.lib_idx,
            handle.name,
            st.elapsed(),
            handle.report.accepted,
            handle.report.num_rejected()
        );
        handles.push(handle);
    }
    Ok((coordinator, handles))
}

fn run(run: RunConfig) -> Result<(), errors::CliError> {
    std::fs::create_dir_all(&run.output.directory).map_err(|e| errors::CliError::Io {
        source: e.to_string(),
        path: Some(run.output.directory.to_string_lossy().to_string()),
    })?;
    processing::write_json(
        &run.output.directory.join("config.json"),
        &run.analysis,
    )?;

    let queries = processing::load_queries(&run.queries)?;

    let summary = match &run.analysis.remote {
        Some(addr) => {
            let engine = RemoteEngine::connect(addr.clone(), &RetryPolicy::default())?;
            let libraries = engine.list_libraries()?;
            processing::write_json(&run.output.directory.join("libraries.json"), &libraries)?;
            processing::main_loop(&engine, &queries, &run.analysis, &libraries, &run.output)?
        }
        None => {
            let (coordinator, handles) = build_local_engine(&run)?;
            processing::write_json(&run.output.directory.join("load_report.json"), &handles)?;
            let libraries = coordinator.list_libraries();
            processing::write_json(&run.output.directory.join("libraries.json"), &libraries)?;
            processing::main_loop(&coordinator, &queries, &run.analysis, &libraries, &run.output)?
        }
    };
    processing::write_json(&run.output.directory.join("summary.json"), &summary)?;
    Ok(())
}

fn main() -> std::result::Result<(), errors::CliError> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        ) // This uses RUST_LOG environment variable
        .init();

    let args = Cli::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let run_config = config.with_cli_args(&args)?;
    info!(
        "Searching {} against {} libraries ({:?} mode, {} hits per query)",
        run_config.queries.display(),
        run_config.libraries.len(),
        run_config.analysis.mode,
        run_config.analysis.n_hits
    );

    match run(run_config) {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Error running search: {}", e);
            Err(e)
        }
    }
}
