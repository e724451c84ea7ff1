//! Builds the per-route, per-direction, per-date departure schedule.
//!
//! Each trip contributes the departure time at its origin stop
//! (`stop_sequence == 1`) to every date its service runs on. Buckets are
//! accumulated in ordered maps and flattened in key order, so the output is
//! identical for identical input.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::calendar::{ServiceDate, ServiceDateMap};
use crate::clock::DepartureTime;
use crate::model::{Direction, StopTimeRow, Trip};

/// Only the first few occurrences of each data-quality issue are logged
/// individually; the rest show up in the totals.
const WARN_LIMIT: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateDepartures {
    pub date: ServiceDate,
    pub times: Vec<DepartureTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionSchedule {
    pub direction_id: Direction,
    pub dates: Vec<DateDepartures>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSchedule {
    pub route_id: String,
    pub directions: Vec<DirectionSchedule>,
}

/// The schedule document consumed by the map UI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schedule {
    pub routes: Vec<RouteSchedule>,
}

impl Schedule {
    /// Sorted departures for one route, direction, and day.
    pub fn lookup(
        &self,
        route_id: &str,
        direction: Direction,
        date: ServiceDate,
    ) -> Option<&[DepartureTime]> {
        let route = self.routes.iter().find(|r| r.route_id == route_id)?;
        let dir = route.directions.iter().find(|d| d.direction_id == direction)?;
        let day = dir.dates.iter().find(|d| d.date == date)?;
        Some(&day.times)
    }
}

/// Coverage counters for one build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub origin_rows: usize,
    pub orphan_rows: usize,
    pub unknown_service_rows: usize,
    pub untimed_rows: usize,
    /// Origin rows whose service expands to no dates.
    pub dateless_rows: usize,
    pub routes: usize,
    pub buckets: usize,
    pub departures: usize,
}

type Buckets = BTreeMap<String, BTreeMap<Direction, BTreeMap<ServiceDate, Vec<DepartureTime>>>>;

/// Joins origin stop times to trips and explodes them across service dates.
///
/// Rows whose trip or service cannot be resolved, or whose departure time is
/// unreadable, are skipped and counted in the [`BuildReport`].
pub fn build<'a>(
    trips: &[Trip],
    stop_times: impl IntoIterator<Item = &'a StopTimeRow>,
    service_dates: &ServiceDateMap,
) -> (Schedule, BuildReport) {
    let trips_by_id: HashMap<&str, &Trip> =
        trips.iter().map(|t| (t.trip_id.as_str(), t)).collect();

    let mut report = BuildReport::default();
    let mut buckets = Buckets::new();

    for row in stop_times.into_iter().filter(|st| st.is_origin()) {
        report.origin_rows += 1;

        let Some(trip) = trips_by_id.get(row.trip_id.as_str()) else {
            report.orphan_rows += 1;
            if report.orphan_rows <= WARN_LIMIT {
                warn!(trip_id = %row.trip_id, "Stop time references unknown trip, skipping");
            }
            continue;
        };

        let Some(dates) = service_dates.get(&trip.service_id) else {
            report.unknown_service_rows += 1;
            if report.unknown_service_rows <= WARN_LIMIT {
                warn!(
                    trip_id = %trip.trip_id,
                    service_id = %trip.service_id,
                    "Trip references unknown service, skipping"
                );
            }
            continue;
        };
        if dates.is_empty() {
            report.dateless_rows += 1;
            debug!(trip_id = %trip.trip_id, service_id = %trip.service_id, "Service has no active dates, skipping");
            continue;
        }

        let departure = match DepartureTime::parse(&row.departure_time) {
            Ok(t) => t,
            Err(e) => {
                report.untimed_rows += 1;
                if report.untimed_rows <= WARN_LIMIT {
                    warn!(trip_id = %trip.trip_id, error = %e, "Origin stop time has no usable departure, skipping");
                }
                continue;
            }
        };

        let by_date = buckets
            .entry(trip.route_id.clone())
            .or_default()
            .entry(trip.direction)
            .or_default();
        for date in dates {
            by_date.entry(*date).or_default().push(departure.clone());
        }
    }

    let routes: Vec<RouteSchedule> = buckets
        .into_iter()
        .map(|(route_id, directions)| RouteSchedule {
            route_id,
            directions: directions
                .into_iter()
                .map(|(direction_id, dates)| DirectionSchedule {
                    direction_id,
                    dates: dates
                        .into_iter()
                        .map(|(date, mut times)| {
                            // stable: equal times keep encounter order
                            times.sort_by_key(DepartureTime::seconds);
                            report.buckets += 1;
                            report.departures += times.len();
                            DateDepartures { date, times }
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();
    report.routes = routes.len();

    if report.orphan_rows > 0 || report.unknown_service_rows > 0 || report.untimed_rows > 0 {
        info!(
            orphan_rows = report.orphan_rows,
            unknown_service_rows = report.unknown_service_rows,
            untimed_rows = report.untimed_rows,
            "Origin rows skipped for data quality"
        );
    }
    debug!(?report, "Schedule built");

    (Schedule { routes }, report)
}
