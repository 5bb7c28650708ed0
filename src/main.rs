mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use people_filter::{Config, DataLoader, FileSource, HttpSource, RecordSource, Session};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "people-filter")]
#[command(about = "Browse people in a table and narrow them down with filter buttons")]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding persons.json and filters.json
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Fetch data from a running people-server instead of a directory
    #[arg(short, long)]
    url: Option<String>,

    /// Do not retry a failed fetch
    #[arg(long)]
    no_retry: bool,

    /// Write logs to this file (the terminal is taken by the UI)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.log_file.as_deref())?;

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if args.url.is_some() {
        config.base_url = args.url;
    }
    if args.no_retry {
        config.retry = false;
    }

    let source: Box<dyn RecordSource> = match &config.base_url {
        Some(url) => {
            info!("Fetching data from {}", url);
            Box::new(HttpSource::new(url, config.request_timeout())?)
        }
        None => {
            info!("Reading data from {:?}", config.data_dir);
            Box::new(FileSource::new(&config.data_dir))
        }
    };
    let loader = Arc::new(
        DataLoader::new(source)
            .with_timeout(config.request_timeout())
            .with_retry_delay(config.retry_delay()),
    );

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;

    let mut app =
        ui::App::new(Session::new()).with_loader(loader, runtime.handle().clone(), config.retry);
    app.start_load();
    ui::run_ui(&mut app)?;

    runtime.shutdown_background();
    Ok(())
}

fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };
    let builder = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_ansi(false)
        .compact();

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file: {:?}", path))?;
            builder.with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::sink).init(),
    }

    Ok(())
}
