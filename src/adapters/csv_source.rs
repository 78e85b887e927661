//! CSV row source
//!
//! Reads `<raw_dir>/<security_id>.csv` files as saved by the scraper: one
//! header row (`Date, Price, Change, % Change, EPS, PER, <multiples>`), then
//! one row per trading week, newest first.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::RawObservation;
use crate::ports::{RowSource, SourceError};

/// Directory-backed [`RowSource`]
#[derive(Debug, Clone)]
pub struct CsvRowSource {
    raw_dir: PathBuf,
}

impl CsvRowSource {
    pub fn new(raw_dir: impl Into<PathBuf>) -> Self {
        Self {
            raw_dir: raw_dir.into(),
        }
    }

    pub fn path_for(&self, security_id: &str) -> PathBuf {
        self.raw_dir.join(format!("{}.csv", security_id))
    }

    pub fn raw_dir(&self) -> &Path {
        &self.raw_dir
    }
}

/// Parse a headered CSV document into raw rows, keeping source order
pub fn parse_rows(data: &[u8]) -> Result<Vec<RawObservation>, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(data);

    let headers = reader
        .headers()
        .map_err(|e| SourceError::Malformed(e.to_string()))?
        .clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| SourceError::Malformed(e.to_string()))?;
        rows.push(RawObservation::from_pairs(
            headers.iter().zip(record.iter()),
        ));
    }
    Ok(rows)
}

#[async_trait]
impl RowSource for CsvRowSource {
    async fn fetch_rows(&self, security_id: &str) -> Result<Vec<RawObservation>, SourceError> {
        let path = self.path_for(security_id);
        let data = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => SourceError::NotFound(path.display().to_string()),
            _ => SourceError::Io(format!("{}: {}", path.display(), e)),
        })?;

        let rows = parse_rows(&data)?;
        tracing::debug!(security_id, rows = rows.len(), "Loaded raw rows");
        Ok(rows)
    }
}
