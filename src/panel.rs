use crate::models::Candle;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

const PANEL_SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct PanelSnapshot {
    version: u32,
    generated_at: DateTime<Utc>,
    tickers: Vec<String>,
    unique_dates: Vec<NaiveDate>,
    candles: Vec<Candle>,
}

/// Immutable in-memory price panel. Loaded once, shared by reference for the
/// whole run; per ticker candles are strictly increasing by date with no
/// duplicate (ticker, date) pairs.
pub struct PricePanel {
    all_candles: Arc<Vec<Candle>>,
    unique_dates: Arc<Vec<NaiveDate>>,
    tickers: Arc<Vec<String>>,
    candles_by_ticker_indices: Arc<HashMap<String, Vec<usize>>>,
}

impl PricePanel {
    pub fn from_candles(mut candles: Vec<Candle>) -> Result<Self> {
        if candles.is_empty() {
            return Err(anyhow!("Price panel has no candles"));
        }

        candles.sort_by(|a, b| a.ticker.cmp(&b.ticker).then(a.date.cmp(&b.date)));
        validate_candles(&candles)?;

        let mut ticker_set = BTreeSet::new();
        let mut unique_date_set = BTreeSet::new();
        for candle in &candles {
            ticker_set.insert(candle.ticker.clone());
            unique_date_set.insert(candle.date);
        }

        let tickers: Vec<String> = ticker_set.into_iter().collect();
        let unique_dates: Vec<NaiveDate> = unique_date_set.into_iter().collect();
        let candles_by_ticker_indices = build_candle_index(&candles);

        Ok(Self {
            all_candles: Arc::new(candles),
            unique_dates: Arc::new(unique_dates),
            tickers: Arc::new(tickers),
            candles_by_ticker_indices: Arc::new(candles_by_ticker_indices),
        })
    }

    pub fn load_from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open price panel CSV at {}", path.display()))?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(BufReader::new(file));

        let mut candles = Vec::new();
        for (row_number, record) in reader.deserialize::<Candle>().enumerate() {
            let candle = record
                .with_context(|| format!("Invalid price panel row {}", row_number + 2))?;
            candles.push(candle);
        }

        let panel = Self::from_candles(candles)?;
        info!(
            "Loaded {} candles for {} tickers across {} unique dates from {}",
            panel.all_candles.len(),
            panel.tickers.len(),
            panel.unique_dates.len(),
            path.display()
        );
        Ok(panel)
    }

    pub fn load_from_snapshot<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open panel snapshot at {}", path.display()))?;
        let reader = BufReader::new(file);
        let snapshot: PanelSnapshot =
            bincode::deserialize_from(reader).context("Snapshot decode failed")?;

        if snapshot.version != PANEL_SNAPSHOT_VERSION {
            return Err(anyhow!(
                "Panel snapshot version mismatch (found {}, expected {})",
                snapshot.version,
                PANEL_SNAPSHOT_VERSION
            ));
        }

        let panel = Self::from_candles(snapshot.candles)?;
        info!(
            "Loaded {} candles for {} tickers across {} unique dates from snapshot {}",
            panel.all_candles.len(),
            panel.tickers.len(),
            panel.unique_dates.len(),
            path.display()
        );
        Ok(panel)
    }

    pub fn save_to_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create snapshot directory {}", parent.display())
                })?;
            }
        }

        let file = File::create(path)
            .with_context(|| format!("Unable to create panel snapshot at {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        let snapshot = PanelSnapshot {
            version: PANEL_SNAPSHOT_VERSION,
            generated_at: Utc::now(),
            tickers: self.tickers.as_ref().clone(),
            unique_dates: self.unique_dates.as_ref().clone(),
            candles: self.all_candles.as_ref().clone(),
        };
        bincode::serialize_into(&mut writer, &snapshot)
            .context("Failed to serialize panel snapshot")?;
        writer
            .flush()
            .context("Failed to flush panel snapshot to disk")?;
        Ok(())
    }

    pub fn restrict_to_date_range(
        self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Self> {
        if start_date.is_none() && end_date.is_none() {
            return Ok(self);
        }

        if let (Some(start), Some(end)) = (start_date, end_date) {
            if start > end {
                return Err(anyhow!(
                    "Invalid panel date range: {} is after {}",
                    start,
                    end
                ));
            }
        }

        let range_description = match (start_date, end_date) {
            (Some(start), Some(end)) => {
                format!("{} - {}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
            }
            (Some(start), None) => format!("{} onward", start.format("%Y-%m-%d")),
            (None, Some(end)) => format!("through {}", end.format("%Y-%m-%d")),
            _ => "entire panel".to_string(),
        };

        let filtered: Vec<Candle> = self
            .all_candles
            .as_ref()
            .iter()
            .filter(|c| {
                if let Some(start) = start_date {
                    if c.date < start {
                        return false;
                    }
                }
                if let Some(end) = end_date {
                    if c.date > end {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();

        if filtered.is_empty() {
            return Err(anyhow!(
                "No candle data remains after restricting to {}",
                range_description
            ));
        }

        Self::from_candles(filtered)
    }

    pub fn tickers(&self) -> &[String] {
        self.tickers.as_slice()
    }

    pub fn unique_dates(&self) -> &[NaiveDate] {
        self.unique_dates.as_slice()
    }

    pub fn all_candles(&self) -> &[Candle] {
        self.all_candles.as_slice()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.unique_dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.unique_dates.last().copied()
    }

    /// Candles for one ticker in ascending date order, empty when the ticker
    /// is not in the panel.
    pub fn candles_for_ticker(&self, ticker: &str) -> Vec<&Candle> {
        let all = self.all_candles();
        self.candles_by_ticker_indices
            .get(ticker)
            .map(|indices| indices.iter().map(|&idx| &all[idx]).collect())
            .unwrap_or_default()
    }

    pub fn close_on(&self, ticker: &str, date: NaiveDate) -> Option<f64> {
        let all = self.all_candles();
        let indices = self.candles_by_ticker_indices.get(ticker)?;
        let position = indices
            .binary_search_by_key(&date, |&idx| all[idx].date)
            .ok()?;
        Some(all[indices[position]].close)
    }
}

fn build_candle_index(candles: &[Candle]) -> HashMap<String, Vec<usize>> {
    let mut candles_by_ticker_indices: HashMap<String, Vec<usize>> = HashMap::new();
    for (index, candle) in candles.iter().enumerate() {
        candles_by_ticker_indices
            .entry(candle.ticker.clone())
            .or_default()
            .push(index);
    }
    for indices in candles_by_ticker_indices.values_mut() {
        indices.sort_by_key(|&idx| candles[idx].date);
    }
    candles_by_ticker_indices
}

// Expects candles sorted by (ticker, date).
fn validate_candles(candles: &[Candle]) -> Result<()> {
    for candle in candles {
        for (field, value) in [
            ("open", candle.open),
            ("high", candle.high),
            ("low", candle.low),
            ("close", candle.close),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(anyhow!(
                    "Candle {} {} has non-positive {} price: {}",
                    candle.ticker,
                    candle.date,
                    field,
                    value
                ));
            }
        }
        if candle.volume < 0 {
            return Err(anyhow!(
                "Candle {} {} has negative volume: {}",
                candle.ticker,
                candle.date,
                candle.volume
            ));
        }
    }

    for pair in candles.windows(2) {
        if pair[0].ticker == pair[1].ticker && pair[0].date >= pair[1].date {
            return Err(anyhow!(
                "Duplicate or out-of-order candle for {} on {}",
                pair[1].ticker,
                pair[1].date
            ));
        }
    }

    Ok(())
}
