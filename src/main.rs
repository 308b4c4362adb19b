mod config;
mod db;
mod error;
mod fetcher;
mod mapping;
mod sync;
mod types;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::db::gaps::ChildRelation;
use crate::db::DbWriter;
use crate::error::Result;
use crate::fetcher::ApiClient;
use crate::sync::SyncDriver;

#[derive(Parser)]
#[command(name = "fixture-sync")]
#[command(about = "Incremental SportMonks football ETL into SQLite", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// leagues, tv stations, fixtures, live scores, then odds and tv links
    All,
    /// Fetch fixtures from the stored watermark up to the horizon
    Fixtures {
        /// Last day to fetch (YYYY-MM-DD); defaults to SYNC_HORIZON / SYNC_HORIZON_DAYS
        #[arg(long)]
        horizon: Option<NaiveDate>,
    },
    /// Refresh score and status of today's fixtures
    Live,
    /// Fill odds for upcoming fixtures that have none
    Odds,
    /// Fill tv station links for upcoming fixtures that have none
    Tv,
    /// Refresh the configured leagues and their countries
    Leagues,
    /// Refresh teams; defaults to every team in an upcoming fixture
    Teams {
        /// Comma-separated team ids
        #[arg(long, value_delimiter = ',')]
        ids: Option<Vec<i64>>,
    },
    /// Refresh the tv station catalogue
    Tvstations,
    /// Refresh countries from the league list
    Countries,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg, cli.command).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config, command: Commands) -> Result<()> {
    // --- Database setup ---
    let pool = db::connect(&cfg.db_path).await?;
    info!("Database ready at {}", cfg.db_path);

    let client = ApiClient::new(&cfg)?;
    let today = Utc::now().date_naive();
    let horizon = cfg.horizon.resolve(today);
    info!(
        "Sync config: {} leagues, horizon {horizon}, batch={} page_size={} max_pages={} delay={}ms",
        cfg.league_ids.len(),
        cfg.batch_size,
        cfg.page_size,
        cfg.max_pages,
        cfg.request_delay.as_millis(),
    );

    let driver = SyncDriver::new(cfg, client, DbWriter::new(pool));

    let (job, report) = match command {
        Commands::All => ("all", driver.run_all(today, horizon).await),
        Commands::Fixtures { horizon: explicit } => (
            "fixtures",
            driver
                .sync_fixtures(today, explicit.unwrap_or(horizon))
                .await?,
        ),
        Commands::Live => ("live", driver.refresh_live(today).await?),
        Commands::Odds => ("odds", driver.fill_missing(ChildRelation::Odds, today).await?),
        Commands::Tv => (
            "tv",
            driver.fill_missing(ChildRelation::TvStations, today).await?,
        ),
        Commands::Leagues => ("leagues", driver.sync_leagues().await?),
        Commands::Teams { ids } => ("teams", driver.sync_teams(ids, today).await?),
        Commands::Tvstations => ("tvstations", driver.sync_tv_stations().await?),
        Commands::Countries => ("countries", driver.sync_countries().await?),
    };

    info!(job, "[SYNC] {job} finished: {report}");
    if report.failed_batches > 0 {
        error!(job, failed = report.failed_batches, "[SYNC] {} batches were rolled back", report.failed_batches);
    }
    Ok(())
}
