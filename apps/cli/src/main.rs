mod args;
mod config;
mod dirs;
mod logging;

use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use honey_core::ObjectLocation;
use honey_db::{WarehouseConfig, WarehouseQueryService};
use honey_sync::{
    AggregationPlan, AggregationSettings, FsObjectStore, PollPolicy, PulseCounter, Shutdown,
    SyncSettings, SystemClock, Uploader, expand_home, list_ledger_files, marker_path, read_marker,
    save_tick, split_eligible,
};
use tracing::info;

use args::{Cli, Command};
use config::CliConfig;

type HoneyUploader = Uploader<FsObjectStore, WarehouseQueryService, SystemClock>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    logging::init_logging(cli.debug);

    let config = config::load_or_create(cli.config.as_deref()).map_err(io::Error::other)?;
    if config.created {
        info!(path = %config.file.display(), "created default config");
    }

    let data_dir = dirs::resolve_data_dir(
        cli.data_path.as_deref(),
        config.config.data_path.as_deref(),
    )
    .map_err(io::Error::other)?;
    info!(data_path = %data_dir.dir.display(), created = data_dir.created, "using data dir");

    match cli.command {
        Command::Sync { once } => run_sync(&config.config, data_dir.dir, once).await,
        Command::Record { count } => record(&data_dir.dir, count),
        Command::Marker => show_marker(&data_dir.dir),
    }
}

async fn run_sync(config: &CliConfig, data_path: PathBuf, once: bool) -> Result<(), Box<dyn Error>> {
    let shutdown = Shutdown::new();
    let mut uploader = build_uploader(config, data_path, SystemClock::with_shutdown(shutdown.clone()))?;

    if once {
        let report = tokio::task::spawn_blocking(move || uploader.tick()).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            signal.trigger();
        }
    });

    let ticks = tokio::task::spawn_blocking(move || uploader.run(&shutdown)).await?;
    info!(ticks, "sync loop finished");
    Ok(())
}

fn build_uploader(
    config: &CliConfig,
    data_path: PathBuf,
    clock: SystemClock,
) -> Result<HoneyUploader, Box<dyn Error>> {
    let results_location = parse_location("query.results_location", &config.query.results_location)?;
    let public_location = parse_location("query.public_location", &config.query.public_location)?;
    let store = FsObjectStore::new(expand_home(&config.store.root));

    let warehouse = WarehouseQueryService::open(WarehouseConfig {
        db_path: expand_home(&config.query.db_path),
        database: config.query.database.clone(),
        table: config.query.table.clone(),
        store_root: store.root().to_path_buf(),
        table_location: ObjectLocation::new(&config.store.bucket, config.store.prefix.trim_matches('/')),
        results_location: results_location.clone(),
    })?;

    let plan = AggregationPlan::rotations(AggregationSettings {
        database: config.query.database.clone(),
        workgroup: config.query.workgroup.clone(),
        table: config.query.table.clone(),
        results_location,
        public_location,
    });
    let settings = SyncSettings {
        data_path,
        bucket: config.store.bucket.clone(),
        prefix: config.store.prefix.clone(),
        interval: Duration::from_secs(config.sync.interval_secs),
        poll: PollPolicy::new(
            Duration::from_secs(config.query.poll_interval_secs),
            config.query.max_attempts,
        ),
        plan,
    };
    Ok(Uploader::new(settings, store, warehouse, clock))
}

fn parse_location(field: &str, value: &str) -> Result<ObjectLocation, io::Error> {
    ObjectLocation::parse(value).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{field}: expected s3://bucket/key, got {value:?}"),
        )
    })
}

fn record(data_path: &Path, count: u64) -> Result<(), Box<dyn Error>> {
    let counter = PulseCounter::new();
    counter.add(count);
    let outcome = save_tick(data_path, Utc::now(), &counter)?;
    match outcome.appended {
        Some(record) => println!(
            "Recorded {} pulses in {} (marker {}).",
            record.count,
            outcome.path.display(),
            outcome.marker
        ),
        None => println!("No pulses to record; marker advanced to {}.", outcome.marker),
    }
    Ok(())
}

fn show_marker(data_path: &Path) -> Result<(), Box<dyn Error>> {
    let files = list_ledger_files(data_path)?;
    let Some(marker) = read_marker(&marker_path(data_path)) else {
        println!("No cursor marker in {}; nothing is eligible.", data_path.display());
        for file in &files {
            println!("  pending   {}", file.file_name());
        }
        return Ok(());
    };
    println!("Marker: {marker}");
    let (eligible, pending) = split_eligible(files, marker);
    for file in &eligible {
        println!("  eligible  {}", file.file_name());
    }
    for file in &pending {
        println!("  pending   {}", file.file_name());
    }
    Ok(())
}
