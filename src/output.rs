//! Persistence of pipeline artifacts.
//!
//! Files are pretty-printed JSON with a trailing newline, written to a
//! temporary sibling and renamed into place.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::model::{Direction, Trip};
use crate::schedule::Schedule;

pub const TRIPS_FILE: &str = "trips.json";
pub const SCHEDULE_FILE: &str = "schedule.json";
pub const ROUTES_FILE: &str = "routes_with_directions.json";

/// One row of `trips.json`.
#[derive(Debug, Serialize)]
pub struct TripListing<'a> {
    pub trip_id: &'a str,
    pub route_id: &'a str,
    pub service_id: &'a str,
    pub direction_id: Direction,
    pub shape_id: Option<&'a str>,
}

impl<'a> From<&'a Trip> for TripListing<'a> {
    fn from(trip: &'a Trip) -> Self {
        Self {
            trip_id: &trip.trip_id,
            route_id: &trip.route_id,
            service_id: &trip.service_id,
            direction_id: trip.direction,
            shape_id: trip.shape_id.as_deref(),
        }
    }
}

pub fn to_json_bytes(value: &impl Serialize) -> Result<Vec<u8>> {
    let mut body = serde_json::to_vec_pretty(value)?;
    body.push(b'\n');
    Ok(body)
}

/// Serializes `value` into `path`, replacing any previous file atomically.
pub fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    let body = to_json_bytes(value)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, &body)?;
    fs::rename(&tmp, path)?;

    debug!(path = %path.display(), bytes = body.len(), "Wrote JSON artifact");
    Ok(())
}

pub fn write_trips(path: &Path, trips: &[Trip]) -> Result<()> {
    let listing: Vec<TripListing<'_>> = trips.iter().map(TripListing::from).collect();
    write_json(path, &listing)?;
    info!(path = %path.display(), trips = listing.len(), "Saved trips");
    Ok(())
}

/// Reads back a `schedule.json` written by [`write_json`].
pub fn read_schedule(path: &Path) -> Result<Schedule> {
    let body = fs::read(path)?;
    Ok(serde_json::from_slice(&body)?)
}
