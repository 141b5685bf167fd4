use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use cloudweather_report::{
    config::{self, Settings},
    db::{self, PgReportStore, ReportStore},
    logging, report, server,
    upstream::HttpObservationClient,
    ReportAggregator,
};
use log::info;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "cloudweather-report")]
#[command(about = "Weather reports aggregated from temperature and precipitation services", long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Build, save and print a weather report
    Report {
        #[arg(long)]
        zip: String,
        #[arg(long, default_value_t = 7)]
        days: i64,
        /// Write the markdown report here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List previously saved reports
    History {
        #[arg(long)]
        zip: String,
        #[arg(long, default_value_t = 10)]
        limit: i64,
        /// Export the reports as CSV instead of printing them
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Serve reports over HTTP
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (settings, config_file) = config::resolve(cli.settings)?;
    logging::setup_logger(logging::parse_level(&settings.level()))
        .context("failed to install logger")?;
    match config_file {
        Some(path) => info!("configuration loaded from {}", path.display()),
        None => info!("no config file found, using flags, environment and defaults"),
    }

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(settings.database_url()?)
        .await
        .context("failed to connect to Postgres")?;
    let store = Arc::new(PgReportStore::new(pool.clone()));

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Report { zip, days, out } => {
            let aggregator = build_aggregator(&settings, store)?;
            let detailed = aggregator
                .build_detailed_report(&zip, days)
                .await
                .with_context(|| format!("failed to build report for {zip}"))?;
            let markdown = report::build_markdown(&detailed, days);

            match out {
                Some(path) => {
                    std::fs::write(&path, markdown)?;
                    println!("Report written to {}.", path.display());
                }
                None => print!("{markdown}"),
            }
        }
        Commands::History { zip, limit, csv } => {
            let reports = store.recent(&zip, limit).await?;
            match csv {
                Some(path) => {
                    let written = report::write_history_csv(&reports, &path)?;
                    println!("Exported {written} reports to {}.", path.display());
                }
                None => print!("{}", report::build_history(&zip, &reports)),
            }
        }
        Commands::Serve => {
            let aggregator = build_aggregator(&settings, store)?;
            let listen = settings.listen();
            let listener = TcpListener::bind(&listen)
                .await
                .with_context(|| format!("failed to bind {listen}"))?;
            server::serve(listener, Arc::new(aggregator)).await?;
        }
    }

    Ok(())
}

fn build_aggregator(
    settings: &Settings,
    store: Arc<PgReportStore>,
) -> anyhow::Result<ReportAggregator> {
    let temperature = settings.temperature_service();
    let precipitation = settings.precipitation_service();
    info!(
        "temperature service at {}://{}:{}, precipitation service at {}://{}:{}",
        temperature.protocol,
        temperature.host,
        temperature.port,
        precipitation.protocol,
        precipitation.host,
        precipitation.port
    );

    let client = HttpObservationClient::new(temperature, precipitation, settings.request_timeout())
        .context("failed to build upstream HTTP client")?;
    Ok(ReportAggregator::new(Arc::new(client), store))
}
