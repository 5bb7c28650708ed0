// People Filter - Web Server
// Serves the raw person/filter payloads and a JSON API over the filter core

use anyhow::{Context, Result};
use clap::Parser;
use people_filter::server::{build_router, AppState};
use people_filter::{Config, DataLoader, FileSource, Session};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "people-server")]
#[command(about = "Serve person and filter data over HTTP")]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding persons.json and filters.json
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long)]
    bind: Option<String>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(bind) = args.bind {
        config.bind = bind;
    }

    info!("Loading data from {:?}", config.data_dir);
    let loader = DataLoader::new(FileSource::new(&config.data_dir))
        .with_timeout(config.request_timeout())
        .with_retry_delay(config.retry_delay());
    let mut session = Session::new();
    let report = session.load(&loader, config.retry).await;
    info!("Persons: {:?}, filters: {:?}", report.persons, report.filters);

    let (persons, filters) = session.into_stores();
    let state = Arc::new(AppState {
        persons,
        filters,
        data_dir: config.data_dir.clone(),
    });
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!("Server running on http://{}", config.bind);
    info!("  API:  /api/persons, /api/filters, /api/visible?active=0,1");
    info!("  Data: /data/persons.json, /data/filters.json");

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
