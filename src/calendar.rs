//! Expands calendar rules into the concrete dates each service runs on.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::model::Service;

pub const GTFS_DATE_FORMAT: &str = "%Y%m%d";

/// A calendar day, rendered as 8-digit `YYYYMMDD`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceDate(pub NaiveDate);

impl fmt::Display for ServiceDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(GTFS_DATE_FORMAT))
    }
}

impl Serialize for ServiceDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ServiceDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&raw, GTFS_DATE_FORMAT)
            .map(ServiceDate)
            .map_err(|e| serde::de::Error::custom(format!("invalid date '{raw}': {e}")))
    }
}

impl std::str::FromStr for ServiceDate {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        parse_gtfs_date("", "date", s).map(ServiceDate)
    }
}

impl From<NaiveDate> for ServiceDate {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

pub type ServiceDates = BTreeSet<ServiceDate>;
pub type ServiceDateMap = BTreeMap<String, ServiceDates>;

/// Parses an 8-digit GTFS date. `field` and `service_id` are carried into the
/// error so a bad calendar row can be found without re-running.
pub fn parse_gtfs_date(service_id: &str, field: &'static str, value: &str) -> Result<NaiveDate> {
    let invalid = || PipelineError::InvalidDateFormat {
        service_id: service_id.to_string(),
        field,
        value: value.to_string(),
    };
    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(value, GTFS_DATE_FORMAT).map_err(|_| invalid())
}

/// Every date in `[start, end]`. Empty when `start > end`.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}

/// The dates within the service's range that fall on one of its weekdays.
pub fn expand(service: &Service) -> ServiceDates {
    date_range(service.start_date, service.end_date)
        .filter(|d| service.days_of_week.includes(*d))
        .map(ServiceDate)
        .collect()
}

/// Expands every service. Rebuilt wholesale on each run.
pub fn expand_all<'a>(services: impl IntoIterator<Item = &'a Service>) -> ServiceDateMap {
    let mut map = ServiceDateMap::new();
    for service in services {
        let dates = expand(service);
        debug!(
            service_id = %service.service_id,
            active_days = dates.len(),
            "Expanded service calendar"
        );
        map.insert(service.service_id.clone(), dates);
    }
    map
}
