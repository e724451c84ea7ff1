//! CLI entry point for the bus schedule builder.
//!
//! Provides subcommands for building the schedule files from a GTFS feed,
//! querying the next departure from a built schedule, and inspecting how
//! service calendars expand.

use anyhow::{Context, Result};
use bus_schedule::calendar::{self, ServiceDate};
use bus_schedule::clock::{self, next_departure, parse_elapsed_seconds};
use bus_schedule::config::{DEFAULT_LOG_FILE, Settings};
use bus_schedule::feed::{self, FeedBundle, FeedSource};
use bus_schedule::fetch::BasicClient;
use bus_schedule::model::{self, Direction};
use bus_schedule::output::{self, SCHEDULE_FILE};
use bus_schedule::pipeline;
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "bus_schedule")]
#[command(about = "Builds rider-facing bus schedules from a GTFS feed", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the feed and write trips.json, schedule.json and the route directory
    Build {
        /// Path to a GTFS zip or URL to fetch (overrides GTFS_SOURCE)
        #[arg(short, long, value_name = "FILE_OR_URL")]
        source: Option<String>,

        /// Directory to write the JSON files into (overrides OUTPUT_DIR)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Show the next departure of a route direction from a built schedule
    Next {
        /// Route identifier
        #[arg(short, long)]
        route: String,

        /// Direction indicator (0 or 1)
        #[arg(short, long, default_value_t = 0)]
        direction: u8,

        /// schedule.json to read (defaults to the one in OUTPUT_DIR)
        #[arg(long)]
        schedule: Option<PathBuf>,

        /// Service date as YYYYMMDD (defaults to today in SCHEDULE_TIMEZONE)
        #[arg(long)]
        date: Option<String>,

        /// Time of day as HH:MM:SS (defaults to now in SCHEDULE_TIMEZONE)
        #[arg(long)]
        at: Option<String>,
    },
    /// List every service with the dates its calendar expands to
    Services {
        /// Path to a GTFS zip or URL to fetch (overrides GTFS_SOURCE)
        #[arg(short, long, value_name = "FILE_OR_URL")]
        source: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("bus_schedule.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    match cli.command {
        Commands::Build { source, output_dir } => {
            let settings = settings.with_source(source).with_output_dir(output_dir);
            let client = BasicClient::new()?;

            let summary = pipeline::run(&settings, &client)
                .await
                .with_context(|| format!("schedule build from {} failed", settings.source))?;

            info!(
                trips = summary.trips,
                services = summary.services,
                routes = summary.report.routes,
                departures = summary.report.departures,
                orphan_rows = summary.report.orphan_rows,
                unknown_service_rows = summary.report.unknown_service_rows,
                "Build complete"
            );
            for file in &summary.files {
                info!(path = %file.display(), "Written");
            }
        }
        Commands::Next {
            route,
            direction,
            schedule,
            date,
            at,
        } => {
            let direction = Direction::try_from(direction).map_err(anyhow::Error::msg)?;
            let path = schedule.unwrap_or_else(|| settings.output_dir.join(SCHEDULE_FILE));
            let schedule = output::read_schedule(&path)
                .with_context(|| format!("reading {}", path.display()))?;

            let (today, now) = clock::service_day_now(settings.timezone);
            let date = match date {
                Some(d) => d.parse::<ServiceDate>()?,
                None => today,
            };
            let now = match at {
                Some(t) => parse_elapsed_seconds(&t)?,
                None => now,
            };

            let Some(times) = schedule.lookup(&route, direction, date) else {
                warn!(route = %route, direction = %direction, date = %date, "No scheduled departures");
                return Ok(());
            };

            match next_departure(times, now) {
                Some(next) => info!(
                    route = %route,
                    direction = %direction,
                    date = %date,
                    "Next bus will depart at {}",
                    next.short_label()
                ),
                None => info!(route = %route, date = %date, "No more departures today"),
            }
            for t in times {
                info!(
                    time = t.short_label(),
                    passed = t.has_passed(now),
                    "Scheduled"
                );
            }
        }
        Commands::Services { source } => {
            let settings = settings.with_source(source);
            let client = BasicClient::new()?;
            list_services(&settings.source, &client).await?;
        }
    }

    Ok(())
}

/// Logs each service's weekly pattern expansion: day count and first/last date.
#[tracing::instrument(skip_all, fields(source = %source))]
async fn list_services(source: &FeedSource, client: &BasicClient) -> Result<()> {
    let mut bundle = FeedBundle::open(source, client).await?;
    bundle.require(&[feed::CALENDAR])?;
    let services = model::load_services(bundle.rows(feed::CALENDAR)?)?;

    for service in &services {
        let dates = calendar::expand(service);
        info!(
            service_id = %service.service_id,
            start_date = %ServiceDate(service.start_date),
            end_date = %ServiceDate(service.end_date),
            active_days = dates.len(),
            first = ?dates.first().map(ToString::to_string),
            last = ?dates.last().map(ToString::to_string),
            "Service"
        );
    }

    info!(total = services.len(), "Service list summary");
    Ok(())
}
