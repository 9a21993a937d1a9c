use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use common::models::LoggedTrade;
use thiserror::Error;
use tracing::{debug, info};

pub const FIELDNAMES: [&str; 10] = [
    "timestamp",
    "symbol",
    "entry_price",
    "tp_price",
    "sl_price",
    "outcome",
    "signal_combo",
    "rr_ratio",
    "market_regime",
    "trend_strength",
];

#[derive(Debug, Error)]
pub enum TradeLogError {
    #[error("trade log io: {0}")]
    Io(#[from] io::Error),
    #[error("trade log csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("trade log {path} has an unexpected header: {found}")]
    Header { path: String, found: String },
}

/// Append-only CSV file of simulated trades. Rows are never rewritten.
#[derive(Debug, Clone)]
pub struct TradeLog {
    path: PathBuf,
}

impl TradeLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the file with its header when it does not exist yet.
    pub fn init(&self) -> Result<(), TradeLogError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        match OpenOptions::new().write(true).create_new(true).open(&self.path) {
            Ok(file) => {
                Self::write_header(file)?;
                info!("Created trade log at {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if fs::metadata(&self.path)?.len() == 0 {
                    let file = OpenOptions::new().append(true).open(&self.path)?;
                    Self::write_header(file)?;
                }
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write_header(file: File) -> Result<(), TradeLogError> {
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(FIELDNAMES)?;
        writer.flush()?;
        Ok(())
    }

    pub fn append(&self, trades: &[LoggedTrade]) -> Result<usize, TradeLogError> {
        self.init()?;
        if trades.is_empty() {
            return Ok(0);
        }

        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        for trade in trades {
            writer.serialize(trade)?;
        }
        writer.flush()?;

        debug!("Appended {} trades to {}", trades.len(), self.path.display());
        Ok(trades.len())
    }

    /// Every row in file order. A missing file reads as empty.
    pub fn read_all(&self) -> Result<Vec<LoggedTrade>, TradeLogError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path)?;
        let headers = reader.headers()?.clone();
        if headers.iter().ne(FIELDNAMES.iter().copied()) {
            return Err(TradeLogError::Header {
                path: self.path.display().to_string(),
                found: headers.iter().collect::<Vec<_>>().join(","),
            });
        }

        reader
            .deserialize::<LoggedTrade>()
            .map(|row| row.map_err(TradeLogError::from))
            .collect()
    }
}
