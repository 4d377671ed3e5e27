use clap::Parser;
use msseek::errors::{
    MsSeekError,
    Result,
};
use msseek::remote::{
    Request,
    Response,
    handle_request,
    serve_connection,
};
use msseek::SearchCoordinator;
use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{
    AtomicBool,
    Ordering,
};
use std::thread;
use tracing::level_filters::LevelFilter;
use tracing::{
    error,
    info,
    warn,
};
use tracing_subscriber::EnvFilter;

mod cli;

#[cfg(target_os = "windows")]
use mimalloc::MiMalloc;

#[cfg(target_os = "windows")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

struct DaemonServer {
    coordinator: Arc<SearchCoordinator>,
    running: AtomicBool,
}

impl DaemonServer {
    pub fn new(coordinator: SearchCoordinator) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
            running: AtomicBool::new(true),
        }
    }

    /// Accepts connections until stopped, each one served on its own thread.
    pub fn run(&self, addr: &str) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr)?;
        info!("Listening on {}", addr);

        while self.running.load(Ordering::Relaxed) {
            match listener.accept() {
                Ok((stream, peer)) => {
                    let coordinator = Arc::clone(&self.coordinator);
                    thread::spawn(move || {
                        info!("Serving {}", peer);
                        if let Err(e) = serve_connection(stream, coordinator.as_ref()) {
                            warn!("Error handling connection from {}: {}", peer, e);
                        }
                    });
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(std::time::Duration::from_millis(100));
                    continue;
                }
                Err(e) => error!("Error accepting connection: {}", e),
            }
        }

        Ok(())
    }
}

fn load_coordinator(conf: &cli::Cli) -> Result<SearchCoordinator> {
    let mut coordinator = SearchCoordinator::new(conf.read_config()?);
    for path in conf.library.iter() {
        let handle = coordinator.load_library_file(path)?;
        if handle.report.num_rejected() > 0 {
            warn!(
                "{} entries of {} could not be loaded",
                handle.report.num_rejected(),
                handle.name
            );
        }
    }
    Ok(coordinator)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let conf = cli::Cli::parse();
    let coordinator = load_coordinator(&conf)?;

    let sample = Request::sample();
    info!(
        "Sample query: \n{}",
        serde_json::to_string_pretty(&sample)?
    );

    let st = std::time::Instant::now();
    match handle_request(&coordinator, sample) {
        Response::Success(_) => info!("Query OK"),
        Response::Error(e) => {
            error!("Query failed: {}", e.message);
            return Err(e.into());
        }
    }
    info!("Querying took {:#?} for sample query", st.elapsed());

    let server = DaemonServer::new(coordinator);
    server.run(&conf.address).map_err(|e| MsSeekError::Io {
        source: e,
        path: None,
    })
}
