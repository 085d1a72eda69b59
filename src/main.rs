use aire_ingest::clock::SystemClock;
use aire_ingest::config::Config;
use aire_ingest::extractor::extract;
use aire_ingest::fetcher::Fetcher;
use aire_ingest::models::HourlyRequest;
use aire_ingest::report::Report;
use chrono::{Datelike, Local};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Fetch an hourly air-quality report and print it as normalized JSON.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Configuration file
    #[arg(long, default_value = "config/config.yaml")]
    config: PathBuf,

    /// Pollutant code (o3, pm10, pm25, co, so2, nox)
    #[arg(short, long)]
    parameter: Option<String>,

    /// Four-digit year (defaults to the current year)
    #[arg(short, long)]
    year: Option<String>,

    /// Two-digit month (defaults to the current month)
    #[arg(short, long)]
    month: Option<String>,

    #[arg(short, long)]
    day: Option<String>,

    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=23))]
    hour: Option<u32>,

    /// Exact station label as it appears in the table header
    #[arg(short, long)]
    station: Option<String>,

    /// Parse a saved page instead of fetching
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries the report
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,aire_ingest=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let today = Local::now().date_naive();
    let config = match &args.input {
        Some(_) => Config::load(&args.config).ok(),
        None => Some(Config::load(&args.config).map_err(|e| {
            anyhow::anyhow!(
                "Failed to load configuration: {}\n\n\
                 Make sure:\n\
                 1. {} exists\n\
                 2. All required environment variables are set (check .env.example)\n\
                 3. Create a .env file if needed",
                e,
                args.config.display()
            )
        })?),
    };

    let parameter = args
        .parameter
        .clone()
        .or_else(|| config.as_ref().map(|c| c.defaults.parameter.clone()))
        .unwrap_or_else(|| "o3".to_string());

    let mut request = HourlyRequest::new(
        &parameter,
        args.year
            .as_deref()
            .unwrap_or(&today.year().to_string()),
        args.month
            .as_deref()
            .unwrap_or(&format!("{:02}", today.month())),
    );
    if let Some(day) = &args.day {
        request = request.with_day(day);
    }
    if let Some(hour) = args.hour {
        request = request.with_hour(hour);
    }
    if let Some(station) = args
        .station
        .clone()
        .or_else(|| config.as_ref().and_then(|c| c.defaults.station.clone()))
    {
        request = request.with_station(&station);
    }

    let markup = match (&args.input, &config) {
        (Some(path), _) => {
            info!("Reading saved page from {}", path.display());
            std::fs::read_to_string(path)?
        }
        (None, Some(config)) => {
            let fetcher = Fetcher::new(&config.source)?;
            fetcher.fetch_markup(&request).await?
        }
        (None, None) => anyhow::bail!("No input file given and no configuration loaded"),
    };

    let extraction = extract(&markup, &request, &SystemClock);
    if !extraction.is_success() {
        warn!("Extraction finished with {:?}", extraction.outcome);
    }

    let report = Report::build(request, extraction);
    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", json);

    Ok(())
}
