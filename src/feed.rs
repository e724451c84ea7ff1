//! Feed loading: obtains a GTFS zip bundle and exposes its tables as rows.
//!
//! A bundle is fetched or read exactly once. Tables are decompressed on
//! demand and parsed lazily, row by row, in file order.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use bytes::Bytes;
use csv::StringRecord;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::error::{PipelineError, Result};
use crate::fetch::{HttpClient, fetch_bytes};

pub const TRIPS: &str = "trips";
pub const STOP_TIMES: &str = "stop_times";
pub const CALENDAR: &str = "calendar";
pub const ROUTES: &str = "routes";
pub const STOPS: &str = "stops";

/// Tables every schedule build needs.
pub const REQUIRED_RESOURCES: [&str; 3] = [TRIPS, STOP_TIMES, CALENDAR];

/// Where a bundle comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    Url(String),
    Path(PathBuf),
}

impl FeedSource {
    /// Anything starting with `http://` or `https://` is fetched, everything
    /// else is read from disk.
    pub fn parse(reference: &str) -> Self {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            FeedSource::Url(reference.to_string())
        } else {
            FeedSource::Path(PathBuf::from(reference))
        }
    }
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedSource::Url(url) => f.write_str(url),
            FeedSource::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// An opened GTFS archive, indexed by table name.
pub struct FeedBundle {
    source_ref: String,
    archive: ZipArchive<Cursor<Bytes>>,
    // table name (file stem) -> archive entry index
    entries: BTreeMap<String, usize>,
}

impl FeedBundle {
    /// Retrieves the bundle behind `source` with a single attempt and opens it.
    #[tracing::instrument(skip_all, fields(source = %source))]
    pub async fn open(source: &FeedSource, client: &dyn HttpClient) -> Result<Self> {
        let source_ref = source.to_string();
        let bytes = match source {
            FeedSource::Url(url) => fetch_bytes(client, url).await?,
            FeedSource::Path(path) => tokio::fs::read(path)
                .await
                .map(Bytes::from)
                .map_err(|e| PipelineError::unavailable(&source_ref, e))?,
        };
        info!(bytes = bytes.len(), "Feed bundle retrieved");
        Self::from_bytes(&source_ref, bytes)
    }

    /// Opens an in-memory zip archive.
    pub fn from_bytes(source_ref: &str, bytes: Bytes) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| PipelineError::unavailable(source_ref, e))?;

        let mut entries = BTreeMap::new();
        for i in 0..archive.len() {
            let file = archive
                .by_index(i)
                .map_err(|e| PipelineError::unavailable(source_ref, e))?;
            if file.is_dir() {
                continue;
            }
            let Some(table) = table_name(file.name()) else {
                continue;
            };
            if entries.contains_key(&table) {
                warn!(entry = file.name(), "Duplicate table in bundle, keeping the first");
                continue;
            }
            entries.insert(table, i);
        }
        debug!(tables = ?entries.keys().collect::<Vec<_>>(), "Feed bundle indexed");

        Ok(Self {
            source_ref: source_ref.to_string(),
            archive,
            entries,
        })
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Fails with [`PipelineError::MissingResource`] naming the first absent table.
    pub fn require(&self, names: &[&str]) -> Result<()> {
        match names.iter().find(|name| !self.has(name)) {
            Some(missing) => Err(PipelineError::MissingResource(missing.to_string())),
            None => Ok(()),
        }
    }

    /// Returns the rows of table `name` in file order.
    pub fn rows(&mut self, name: &str) -> Result<Rows> {
        let index = *self
            .entries
            .get(name)
            .ok_or_else(|| PipelineError::MissingResource(name.to_string()))?;

        let mut file = self
            .archive
            .by_index(index)
            .map_err(|e| PipelineError::unavailable(&self.source_ref, e))?;
        let mut raw = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut raw)
            .map_err(|e| PipelineError::unavailable(&self.source_ref, format!("{name}.txt: {e}")))?;

        Rows::from_reader(name, Cursor::new(raw))
    }
}

/// `gtfs/trips.txt` -> `trips`. Non-`.txt` entries are not tables.
fn table_name(entry: &str) -> Option<String> {
    let file_name = Path::new(entry).file_name()?.to_str()?;
    file_name.strip_suffix(".txt").map(str::to_string)
}

/// Lazy row stream over one table.
pub struct Rows {
    resource: Rc<str>,
    headers: Rc<StringRecord>,
    records: csv::StringRecordsIntoIter<Cursor<Vec<u8>>>,
}

impl Rows {
    pub fn from_reader(resource: &str, reader: Cursor<Vec<u8>>) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);
        let headers = rdr.headers()?.clone();
        Ok(Self {
            resource: Rc::from(resource),
            headers: Rc::new(headers),
            records: rdr.into_records(),
        })
    }
}

impl Iterator for Rows {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(
            record
                .map(|record| Row {
                    resource: Rc::clone(&self.resource),
                    headers: Rc::clone(&self.headers),
                    record,
                })
                .map_err(PipelineError::from),
        )
    }
}

/// One table row, addressable by column name.
#[derive(Debug, Clone)]
pub struct Row {
    resource: Rc<str>,
    headers: Rc<StringRecord>,
    record: StringRecord,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&str> {
        let i = self.headers.iter().position(|h| h == column)?;
        self.record.get(i)
    }

    /// Like [`Row::get`] but treats an empty cell as absent.
    pub fn get_non_empty(&self, column: &str) -> Option<&str> {
        self.get(column).filter(|v| !v.is_empty())
    }

    pub fn line(&self) -> u64 {
        self.record.position().map(|p| p.line()).unwrap_or(0)
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.headers
            .iter()
            .zip(self.record.iter())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect()
    }

    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        self.record
            .deserialize(Some(&*self.headers))
            .map_err(|e| self.invalid(e))
    }

    /// Builds an [`PipelineError::InvalidRow`] pointing at this row.
    pub fn invalid(&self, reason: impl fmt::Display) -> PipelineError {
        PipelineError::InvalidRow {
            resource: self.resource.to_string(),
            line: self.line(),
            reason: reason.to_string(),
        }
    }
}
