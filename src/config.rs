//! Run settings resolved from the environment.
//!
//! Precedence is CLI flag, then environment variable (a `.env` file is loaded
//! by the binary before this runs), then the defaults below.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono_tz::Tz;

use crate::feed::FeedSource;

pub const DEFAULT_GTFS_SOURCE: &str =
    "https://api.data.gov.my/gtfs-static/prasarana?category=rapid-bus-penang";
pub const DEFAULT_OUTPUT_DIR: &str = "data";
pub const DEFAULT_TIMEZONE: &str = "Asia/Kuala_Lumpur";
pub const DEFAULT_LOG_FILE: &str = "logs/bus_schedule.log";

#[derive(Debug, Clone)]
pub struct Settings {
    pub source: FeedSource,
    pub output_dir: PathBuf,
    pub timezone: Tz,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves settings through `lookup` instead of the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let source = lookup("GTFS_SOURCE").unwrap_or_else(|| DEFAULT_GTFS_SOURCE.to_string());
        let output_dir = lookup("OUTPUT_DIR").unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string());
        let timezone = lookup("SCHEDULE_TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());

        Ok(Self {
            source: FeedSource::parse(&source),
            output_dir: PathBuf::from(output_dir),
            timezone: parse_timezone(&timezone)?,
        })
    }

    pub fn with_source(mut self, source: Option<String>) -> Self {
        if let Some(source) = source {
            self.source = FeedSource::parse(&source);
        }
        self
    }

    pub fn with_output_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.output_dir = dir;
        }
        self
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("unknown timezone '{name}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.source, FeedSource::Url(DEFAULT_GTFS_SOURCE.to_string()));
        assert_eq!(settings.output_dir, PathBuf::from("data"));
        assert_eq!(settings.timezone, chrono_tz::Asia::Kuala_Lumpur);
    }

    #[test]
    fn test_env_then_flag_precedence() {
        let settings = Settings::from_lookup(lookup(&[
            ("GTFS_SOURCE", "feeds/penang.zip"),
            ("OUTPUT_DIR", "public/data"),
        ]))
        .unwrap();
        assert_eq!(settings.source, FeedSource::Path(PathBuf::from("feeds/penang.zip")));

        let settings = settings
            .with_source(Some("https://example.com/gtfs.zip".to_string()))
            .with_output_dir(None);
        assert_eq!(settings.source, FeedSource::Url("https://example.com/gtfs.zip".to_string()));
        assert_eq!(settings.output_dir, PathBuf::from("public/data"));
    }

    #[test]
    fn test_unknown_timezone_is_rejected() {
        let err = Settings::from_lookup(lookup(&[("SCHEDULE_TIMEZONE", "Mars/Olympus")])).unwrap_err();
        assert!(err.to_string().contains("Mars/Olympus"));
    }
}
