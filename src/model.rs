//! Typed GTFS records used by the schedule pipeline, and their loaders.

use std::fmt;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::calendar::parse_gtfs_date;
use crate::error::Result;
use crate::feed::Row;

/// Outbound/inbound indicator. GTFS only defines 0 and 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Direction {
    Zero,
    One,
}

impl Direction {
    /// An empty cell is read as direction 0; anything but 0/1 is rejected.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "" | "0" => Some(Direction::Zero),
            "1" => Some(Direction::One),
            _ => None,
        }
    }
}

impl From<Direction> for u8 {
    fn from(d: Direction) -> u8 {
        match d {
            Direction::Zero => 0,
            Direction::One => 1,
        }
    }
}

impl TryFrom<u8> for Direction {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Direction::Zero),
            1 => Ok(Direction::One),
            x => Err(format!("unknown direction_id {x}")),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// Weekly recurrence, indexed Sunday (0) through Saturday (6).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DaysOfWeek([bool; 7]);

impl DaysOfWeek {
    pub const COLUMNS: [&'static str; 7] = [
        "sunday",
        "monday",
        "tuesday",
        "wednesday",
        "thursday",
        "friday",
        "saturday",
    ];

    pub fn new(flags: [bool; 7]) -> Self {
        Self(flags)
    }

    pub fn every_day() -> Self {
        Self([true; 7])
    }

    pub fn runs_on(&self, weekday: Weekday) -> bool {
        self.0[weekday.num_days_from_sunday() as usize]
    }

    pub fn includes(&self, day: NaiveDate) -> bool {
        self.runs_on(day.weekday())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Service {
    pub service_id: String,
    pub days_of_week: DaysOfWeek,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Service {
    pub fn from_row(row: &Row) -> Result<Self> {
        let service_id = row
            .get_non_empty("service_id")
            .ok_or_else(|| row.invalid("missing service_id"))?
            .to_string();

        let mut flags = [false; 7];
        for (flag, column) in flags.iter_mut().zip(DaysOfWeek::COLUMNS) {
            *flag = match row.get(column) {
                Some("1") => true,
                Some("0") => false,
                Some(other) => {
                    return Err(row.invalid(format!(
                        "service '{service_id}' has {column}='{other}', expected 0 or 1"
                    )));
                }
                None => return Err(row.invalid(format!("missing column {column}"))),
            };
        }

        let start_date = parse_gtfs_date(&service_id, "start_date", row.get("start_date").unwrap_or(""))?;
        let end_date = parse_gtfs_date(&service_id, "end_date", row.get("end_date").unwrap_or(""))?;

        Ok(Service {
            service_id,
            days_of_week: DaysOfWeek(flags),
            start_date,
            end_date,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trip {
    pub trip_id: String,
    pub route_id: String,
    pub service_id: String,
    pub direction: Direction,
    pub shape_id: Option<String>,
    pub headsign: Option<String>,
}

#[derive(Deserialize)]
struct TripRecord {
    trip_id: String,
    route_id: String,
    service_id: String,
    #[serde(default)]
    direction_id: String,
    #[serde(default)]
    shape_id: Option<String>,
    #[serde(default)]
    trip_headsign: Option<String>,
}

impl Trip {
    /// `Ok(None)` marks a trip with an unusable direction_id; those are
    /// dropped as a data-quality issue rather than failing the run.
    pub fn from_row(row: &Row) -> Result<Option<Self>> {
        let rec: TripRecord = row.deserialize()?;
        let Some(direction) = Direction::parse(&rec.direction_id) else {
            warn!(
                trip_id = %rec.trip_id,
                direction_id = %rec.direction_id,
                "Skipping trip with unknown direction_id"
            );
            return Ok(None);
        };
        Ok(Some(Trip {
            trip_id: rec.trip_id,
            route_id: rec.route_id,
            service_id: rec.service_id,
            direction,
            shape_id: rec.shape_id.filter(|s| !s.is_empty()),
            headsign: rec.trip_headsign.filter(|s| !s.is_empty()),
        }))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct StopTimeRow {
    pub trip_id: String,
    pub stop_sequence: u32,
    #[serde(default)]
    pub departure_time: String,
    #[serde(default)]
    pub stop_id: String,
}

impl StopTimeRow {
    pub fn is_origin(&self) -> bool {
        self.stop_sequence == 1
    }
}

pub fn load_services(rows: impl Iterator<Item = Result<Row>>) -> Result<Vec<Service>> {
    let mut services = Vec::new();
    for row in rows {
        services.push(Service::from_row(&row?)?);
    }
    debug!(count = services.len(), "Loaded services");
    Ok(services)
}

pub fn load_trips(rows: impl Iterator<Item = Result<Row>>) -> Result<Vec<Trip>> {
    let mut trips = Vec::new();
    for row in rows {
        if let Some(trip) = Trip::from_row(&row?)? {
            trips.push(trip);
        }
    }
    debug!(count = trips.len(), "Loaded trips");
    Ok(trips)
}

pub fn load_stop_times(rows: impl Iterator<Item = Result<Row>>) -> Result<Vec<StopTimeRow>> {
    let mut stop_times = Vec::new();
    for row in rows {
        stop_times.push(row?.deserialize::<StopTimeRow>()?);
    }
    debug!(count = stop_times.len(), "Loaded stop times");
    Ok(stop_times)
}
