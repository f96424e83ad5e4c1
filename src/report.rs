use crate::models::{BacktestOutcome, Trade};
use anyhow::{Context, Result};
use log::info;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory {}", parent.display())
            })?;
        }
    }
    Ok(())
}

/// Flat CSV trade log, one row per trade including unresolved `no_data`
/// entries. Dates are ISO-8601, returns plain decimals.
pub fn write_trade_log<P: AsRef<Path>>(trades: &[Trade], path: P) -> Result<()> {
    let path = path.as_ref();
    ensure_parent_dir(path)?;

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Unable to create trade log at {}", path.display()))?;
    for trade in trades {
        writer
            .serialize(trade)
            .with_context(|| format!("Failed to write trade log row for {}", trade.ticker))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush trade log to {}", path.display()))?;

    info!(
        "Wrote {} trade{} to {}",
        trades.len(),
        if trades.len() == 1 { "" } else { "s" },
        path.display()
    );
    Ok(())
}

/// Full run outcome as pretty-printed JSON, covering both the completed
/// report and the insufficient-data case.
pub fn write_outcome<P: AsRef<Path>>(outcome: &BacktestOutcome, path: P) -> Result<()> {
    let path = path.as_ref();
    ensure_parent_dir(path)?;

    let file = File::create(path)
        .with_context(|| format!("Unable to create results file at {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, outcome)
        .context("Failed to serialize backtest outcome")?;
    writer.write_all(b"\n")?;
    writer
        .flush()
        .with_context(|| format!("Failed to flush results to {}", path.display()))?;

    info!("Wrote backtest results to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExitReason;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("surge_engine_{}_{}", std::process::id(), name))
    }

    fn sample_trades() -> Vec<Trade> {
        let entry_date = NaiveDate::from_ymd_opt(2024, 2, 1).expect("date");
        vec![
            Trade {
                ticker: "AAA".to_string(),
                entry_date,
                entry_price: 100.0,
                exit_date: Some(entry_date + chrono::Duration::days(3)),
                exit_price: Some(94.0),
                exit_reason: ExitReason::StopLoss,
                actual_return: Some(-0.06),
                holding_days: 3,
            },
            Trade {
                ticker: "BBB".to_string(),
                entry_date,
                entry_price: 50.0,
                exit_date: None,
                exit_price: None,
                exit_reason: ExitReason::NoData,
                actual_return: None,
                holding_days: 0,
            },
        ]
    }

    #[test]
    fn trade_log_round_trips_through_csv() {
        let path = scratch_path("trade_log.csv");
        let trades = sample_trades();
        write_trade_log(&trades, &path).expect("write");

        let mut reader = csv::Reader::from_path(&path).expect("open");
        let rows: Vec<Trade> = reader
            .deserialize()
            .collect::<Result<Vec<_>, _>>()
            .expect("parse");

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ticker, "AAA");
        assert_eq!(rows[0].exit_reason, ExitReason::StopLoss);
        assert_eq!(rows[0].actual_return, Some(-0.06));
        assert_eq!(rows[1].exit_reason, ExitReason::NoData);
        assert_eq!(rows[1].exit_price, None);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn repeated_writes_are_byte_identical() {
        let first_path = scratch_path("trade_log_a.csv");
        let second_path = scratch_path("trade_log_b.csv");
        let trades = sample_trades();

        write_trade_log(&trades, &first_path).expect("write");
        write_trade_log(&trades, &second_path).expect("write");

        let first = std::fs::read(&first_path).expect("read");
        let second = std::fs::read(&second_path).expect("read");
        assert_eq!(first, second);

        let _ = std::fs::remove_file(&first_path);
        let _ = std::fs::remove_file(&second_path);
    }
}
