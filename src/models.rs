use anyhow::anyhow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    MaxHolding,
    NoData,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::TakeProfit => "take_profit",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::MaxHolding => "max_holding",
            ExitReason::NoData => "no_data",
        }
    }

    pub const ALL: [ExitReason; 4] = [
        ExitReason::TakeProfit,
        ExitReason::StopLoss,
        ExitReason::MaxHolding,
        ExitReason::NoData,
    ];
}

impl FromStr for ExitReason {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "take_profit" => Ok(ExitReason::TakeProfit),
            "stop_loss" => Ok(ExitReason::StopLoss),
            "max_holding" => Ok(ExitReason::MaxHolding),
            "no_data" => Ok(ExitReason::NoData),
            other => Err(anyhow!("Unknown exit reason '{}'", other)),
        }
    }
}

/// A single simulated trade. Trades are evaluated independently against a
/// fixed notional; they are never compounded into a running portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub ticker: String,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub exit_date: Option<NaiveDate>,
    pub exit_price: Option<f64>,
    pub exit_reason: ExitReason,
    pub actual_return: Option<f64>,
    pub holding_days: i64,
}

impl Trade {
    pub fn is_resolved(&self) -> bool {
        self.actual_return.is_some()
    }
}

/// Outcome of the daily-monitoring exit scan for one entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeExit {
    pub exit_date: Option<NaiveDate>,
    pub exit_price: Option<f64>,
    pub exit_reason: ExitReason,
    pub actual_return: Option<f64>,
    pub holding_days: i64,
}

/// A live-cross-section candidate at a rebalance date, ranked by surge
/// probability before trade entry.
#[derive(Debug, Clone)]
pub struct SurgeCandidate {
    pub ticker: String,
    pub probability: f64,
    pub entry_price: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceStats {
    pub eligible_dates: usize,
    pub traded_dates: usize,
    pub skipped_no_training_rows: usize,
    pub skipped_single_class: usize,
    pub skipped_no_prediction_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub rebalance_stats: RebalanceStats,
    pub trades: Vec<Trade>,
    pub metrics: crate::performance::MetricsReport,
}

/// Result of a full walk-forward run. A panel shorter than the configured
/// warm-up is an expected condition, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum BacktestOutcome {
    #[serde(rename_all = "camelCase")]
    InsufficientData {
        panel_start: NaiveDate,
        panel_end: NaiveDate,
        train_period_days: i64,
    },
    Completed(BacktestReport),
}

impl BacktestOutcome {
    pub fn report(&self) -> Option<&BacktestReport> {
        match self {
            BacktestOutcome::Completed(report) => Some(report),
            BacktestOutcome::InsufficientData { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_reason_round_trips_through_str() {
        for reason in ExitReason::ALL {
            let parsed: ExitReason = reason.as_str().parse().expect("parse exit reason");
            assert_eq!(parsed, reason);
        }
        assert!("take-profit".parse::<ExitReason>().is_err());
    }
}
