//! Route directory: the stop list of every route direction, for drawing
//! routes and listing their stops.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::feed::Row;
use crate::model::{Direction, StopTimeRow, Trip};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Route {
    pub route_id: String,
    #[serde(default)]
    pub route_short_name: String,
    #[serde(default)]
    pub route_long_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Stop {
    pub stop_id: String,
    #[serde(default)]
    pub stop_name: String,
    pub stop_lat: f64,
    pub stop_lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopEntry {
    pub stop_id: String,
    pub stop_name: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectionEntry {
    pub direction_id: Direction,
    pub shape_id: Option<String>,
    /// Trip headsign of the representative trip, falling back to the route's long name.
    pub route_long_name: String,
    pub stops: Vec<StopEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteEntry {
    pub route_id: String,
    pub route_short_name: String,
    pub directions: Vec<DirectionEntry>,
}

pub fn load_routes(rows: impl Iterator<Item = Result<Row>>) -> Result<Vec<Route>> {
    rows.map(|row| row?.deserialize()).collect()
}

pub fn load_stops(rows: impl Iterator<Item = Result<Row>>) -> Result<Vec<Stop>> {
    rows.map(|row| row?.deserialize()).collect()
}

/// One entry per route with trips, one direction per indicator present.
///
/// Each direction is described by its first trip in feed order that has
/// stop times. Trips of routes missing from `routes` are ignored, as are
/// stop times pointing at unknown stops.
pub fn build_directory(
    routes: &[Route],
    stops: &[Stop],
    trips: &[Trip],
    stop_times: &[StopTimeRow],
) -> Vec<RouteEntry> {
    let routes_by_id: HashMap<&str, &Route> =
        routes.iter().map(|r| (r.route_id.as_str(), r)).collect();
    let stops_by_id: HashMap<&str, &Stop> =
        stops.iter().map(|s| (s.stop_id.as_str(), s)).collect();

    let timed: HashSet<&str> = stop_times.iter().map(|st| st.trip_id.as_str()).collect();

    let mut representative: BTreeMap<(&str, Direction), &Trip> = BTreeMap::new();
    for trip in trips {
        if !routes_by_id.contains_key(trip.route_id.as_str()) {
            warn!(trip_id = %trip.trip_id, route_id = %trip.route_id, "Trip references unknown route");
            continue;
        }
        if !timed.contains(trip.trip_id.as_str()) {
            continue;
        }
        representative
            .entry((trip.route_id.as_str(), trip.direction))
            .or_insert(trip);
    }

    let mut calls: HashMap<&str, Vec<&StopTimeRow>> = representative
        .values()
        .map(|t| (t.trip_id.as_str(), Vec::new()))
        .collect();
    for st in stop_times {
        if let Some(list) = calls.get_mut(st.trip_id.as_str()) {
            list.push(st);
        }
    }

    let mut directory: Vec<RouteEntry> = Vec::new();
    for ((route_id, direction), trip) in representative {
        let route = routes_by_id[route_id];
        let mut trip_calls = calls.remove(trip.trip_id.as_str()).unwrap_or_default();
        trip_calls.sort_by_key(|st| st.stop_sequence);

        let stops = trip_calls
            .into_iter()
            .filter_map(|st| match stops_by_id.get(st.stop_id.as_str()) {
                Some(stop) => Some(StopEntry {
                    stop_id: stop.stop_id.clone(),
                    stop_name: stop.stop_name.clone(),
                    lat: stop.stop_lat,
                    lon: stop.stop_lon,
                }),
                None => {
                    warn!(trip_id = %trip.trip_id, stop_id = %st.stop_id, "Stop time references unknown stop");
                    None
                }
            })
            .collect();

        let entry = DirectionEntry {
            direction_id: direction,
            shape_id: trip.shape_id.clone(),
            route_long_name: trip
                .headsign
                .clone()
                .unwrap_or_else(|| route.route_long_name.clone()),
            stops,
        };

        match directory.last_mut() {
            Some(last) if last.route_id == route_id => last.directions.push(entry),
            _ => directory.push(RouteEntry {
                route_id: route_id.to_string(),
                route_short_name: route.route_short_name.clone(),
                directions: vec![entry],
            }),
        }
    }

    debug!(routes = directory.len(), "Route directory built");
    directory
}
