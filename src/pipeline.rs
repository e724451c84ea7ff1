//! One full build: fetch, decode, transform, write.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, info_span, warn};

use crate::calendar::{self, ServiceDateMap};
use crate::error::Result;
use crate::config::Settings;
use crate::feed::{self, FeedBundle, REQUIRED_RESOURCES};
use crate::fetch::HttpClient;
use crate::lock::RunLock;
use crate::model::{self, Service, StopTimeRow, Trip};
use crate::output::{self, ROUTES_FILE, SCHEDULE_FILE, TRIPS_FILE};
use crate::routes;
use crate::schedule::{self, BuildReport, Schedule};

/// Decoded contents of a bundle, buffered in full before any transform.
pub struct FeedTables {
    pub services: Vec<Service>,
    pub trips: Vec<Trip>,
    pub stop_times: Vec<StopTimeRow>,
}

impl FeedTables {
    pub fn load(bundle: &mut FeedBundle) -> Result<Self> {
        bundle.require(&REQUIRED_RESOURCES)?;
        let services = model::load_services(bundle.rows(feed::CALENDAR)?)?;
        let trips = model::load_trips(bundle.rows(feed::TRIPS)?)?;
        let stop_times = model::load_stop_times(bundle.rows(feed::STOP_TIMES)?)?;
        info!(
            services = services.len(),
            trips = trips.len(),
            stop_times = stop_times.len(),
            "Feed tables loaded"
        );
        Ok(Self {
            services,
            trips,
            stop_times,
        })
    }
}

/// What a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub trips: usize,
    pub services: usize,
    pub report: BuildReport,
    pub files: Vec<PathBuf>,
}

/// Transforms loaded tables into the schedule. Pure: no I/O.
pub fn transform(tables: &FeedTables) -> (ServiceDateMap, Schedule, BuildReport) {
    let service_dates = calendar::expand_all(&tables.services);
    let (schedule, report) = schedule::build(&tables.trips, &tables.stop_times, &service_dates);
    (service_dates, schedule, report)
}

/// Runs the whole pipeline once against the configured source, writing into
/// the configured output directory.
///
/// Any fatal error aborts the run before the outputs are touched; the
/// previous files stay in place.
#[tracing::instrument(skip_all, fields(source = %settings.source, output_dir = %settings.output_dir.display()))]
pub async fn run(settings: &Settings, client: &dyn HttpClient) -> Result<RunSummary> {
    let output_dir = settings.output_dir.as_path();
    let _lock = RunLock::acquire(output_dir)?;

    let mut bundle = FeedBundle::open(&settings.source, client).await?;

    let tables = info_span!("decode").in_scope(|| FeedTables::load(&mut bundle))?;
    let (_, schedule, report) = info_span!("transform").in_scope(|| transform(&tables));

    let directory = info_span!("route_directory").in_scope(|| -> Result<_> {
        if !(bundle.has(feed::ROUTES) && bundle.has(feed::STOPS)) {
            warn!("routes.txt or stops.txt missing, skipping route directory");
            return Ok(None);
        }
        let routes = routes::load_routes(bundle.rows(feed::ROUTES)?)?;
        let stops = routes::load_stops(bundle.rows(feed::STOPS)?)?;
        Ok(Some(routes::build_directory(
            &routes,
            &stops,
            &tables.trips,
            &tables.stop_times,
        )))
    })?;

    let _write = info_span!("write").entered();
    let mut files = Vec::new();

    let trips_path = output_dir.join(TRIPS_FILE);
    output::write_trips(&trips_path, &tables.trips)?;
    files.push(trips_path);

    let schedule_path = output_dir.join(SCHEDULE_FILE);
    output::write_json(&schedule_path, &schedule)?;
    info!(
        path = %schedule_path.display(),
        routes = report.routes,
        departures = report.departures,
        "Saved schedule"
    );
    files.push(schedule_path);

    if let Some(directory) = directory {
        let routes_path = output_dir.join(ROUTES_FILE);
        output::write_json(&routes_path, &directory)?;
        info!(path = %routes_path.display(), routes = directory.len(), "Saved route directory");
        files.push(routes_path);
    }

    Ok(RunSummary {
        trips: tables.trips.len(),
        services: tables.services.len(),
        report,
        files,
    })
}
