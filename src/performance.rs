use crate::models::{ExitReason, Trade};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::cmp::Ordering;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitReasonBreakdown {
    pub reason: ExitReason,
    pub count: usize,
    pub proportion: f64,
}

/// Per-trade statistics over resolved returns. Trades are independent equal
/// notionals; the final notional is the sum of returns applied once, never
/// compounded, so overlapping positions cannot inflate the result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub total_trades: usize,
    pub resolved_trades: usize,
    pub no_data_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub breakeven_trades: usize,
    pub win_rate: f64,
    pub mean_return: f64,
    pub median_return: f64,
    pub std_return: f64,
    pub max_return: f64,
    pub min_return: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    /// +infinity when there are no losing trades; serialized as null in JSON.
    pub profit_factor: f64,
    pub sharpe_ratio: f64,
    pub avg_holding_days: f64,
    pub exit_reasons: Vec<ExitReasonBreakdown>,
    pub initial_notional: f64,
    pub final_notional_non_compounding: f64,
}

/// Aggregated run result. `NoTrades` is distinct from a zero-filled summary
/// so callers cannot mistake "no activity" for "flat performance".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum MetricsReport {
    NoTrades,
    Summary(PerformanceSummary),
}

impl MetricsReport {
    pub fn summary(&self) -> Option<&PerformanceSummary> {
        match self {
            MetricsReport::Summary(summary) => Some(summary),
            MetricsReport::NoTrades => None,
        }
    }
}

pub struct PerformanceCalculator;

impl PerformanceCalculator {
    pub fn calculate(
        trades: &[Trade],
        initial_notional: f64,
        annual_risk_free_rate: f64,
    ) -> MetricsReport {
        let resolved: Vec<&Trade> = trades.iter().filter(|t| t.is_resolved()).collect();
        if resolved.is_empty() {
            return MetricsReport::NoTrades;
        }

        let returns: Vec<f64> = resolved
            .iter()
            .filter_map(|t| t.actual_return)
            .collect();

        let winning: Vec<f64> = returns.iter().copied().filter(|&r| r > 0.0).collect();
        let losing: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
        let breakeven_trades = returns.iter().filter(|&&r| r == 0.0).count();

        let win_rate = winning.len() as f64 / returns.len() as f64;
        let mean_return = Self::average(&returns);
        let median_return = Self::median(&returns);
        let std_return = if returns.len() < 2 {
            0.0
        } else {
            returns.clone().std_dev()
        };
        let max_return = returns.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min_return = returns.iter().copied().fold(f64::INFINITY, f64::min);

        let gross_profit: f64 = winning.iter().sum();
        let gross_loss: f64 = losing.iter().map(|r| r.abs()).sum();
        let profit_factor = if gross_loss == 0.0 {
            f64::INFINITY
        } else {
            gross_profit / gross_loss
        };

        let per_trade_risk_free = annual_risk_free_rate / 252.0;
        let sharpe_ratio = if std_return == 0.0 || !std_return.is_finite() {
            0.0
        } else {
            (mean_return - per_trade_risk_free) / std_return * 252.0_f64.sqrt()
        };

        let holding_days: Vec<f64> = resolved.iter().map(|t| t.holding_days as f64).collect();
        let avg_holding_days = Self::average(&holding_days);

        let exit_reasons = Self::exit_reason_breakdown(trades);
        let no_data_trades = trades
            .iter()
            .filter(|t| t.exit_reason == ExitReason::NoData)
            .count();

        let total_return: f64 = returns.iter().sum();
        let final_notional_non_compounding = initial_notional * (1.0 + total_return);

        MetricsReport::Summary(PerformanceSummary {
            total_trades: trades.len(),
            resolved_trades: resolved.len(),
            no_data_trades,
            winning_trades: winning.len(),
            losing_trades: losing.len(),
            breakeven_trades,
            win_rate,
            mean_return,
            median_return,
            std_return,
            max_return,
            min_return,
            avg_win: Self::average(&winning),
            avg_loss: Self::average(&losing),
            profit_factor,
            sharpe_ratio,
            avg_holding_days,
            exit_reasons,
            initial_notional,
            final_notional_non_compounding,
        })
    }

    fn exit_reason_breakdown(trades: &[Trade]) -> Vec<ExitReasonBreakdown> {
        let total = trades.len();
        ExitReason::ALL
            .iter()
            .map(|&reason| {
                let count = trades.iter().filter(|t| t.exit_reason == reason).count();
                ExitReasonBreakdown {
                    reason,
                    count,
                    proportion: if total > 0 {
                        count as f64 / total as f64
                    } else {
                        0.0
                    },
                }
            })
            .collect()
    }

    fn average(values: &[f64]) -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;

        for value in values.iter().copied() {
            if value.is_finite() {
                sum += value;
                count += 1;
            }
        }

        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    fn median(values: &[f64]) -> f64 {
        let mut filtered: Vec<f64> = values
            .iter()
            .copied()
            .filter(|value| value.is_finite())
            .collect();

        if filtered.is_empty() {
            return 0.0;
        }

        filtered.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let mid = filtered.len() / 2;

        if filtered.len() % 2 == 0 {
            (filtered[mid - 1] + filtered[mid]) / 2.0
        } else {
            filtered[mid]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn trade(return_value: Option<f64>, exit_reason: ExitReason) -> Trade {
        let entry_date = NaiveDate::from_ymd_opt(2024, 2, 1).expect("date");
        Trade {
            ticker: "AAA".to_string(),
            entry_date,
            entry_price: 100.0,
            exit_date: return_value.map(|_| entry_date + chrono::Duration::days(5)),
            exit_price: return_value.map(|r| 100.0 * (1.0 + r)),
            exit_reason,
            actual_return: return_value,
            holding_days: if return_value.is_some() { 5 } else { 0 },
        }
    }

    #[test]
    fn empty_trade_list_reports_no_trades() {
        let report = PerformanceCalculator::calculate(&[], 10_000.0, 0.02);
        assert!(matches!(report, MetricsReport::NoTrades));
    }

    #[test]
    fn only_no_data_trades_reports_no_trades() {
        let trades = vec![trade(None, ExitReason::NoData)];
        let report = PerformanceCalculator::calculate(&trades, 10_000.0, 0.02);
        assert!(matches!(report, MetricsReport::NoTrades));
    }

    #[test]
    fn four_trade_fixture_matches_expected_ratios() {
        let trades = vec![
            trade(Some(0.6), ExitReason::TakeProfit),
            trade(Some(-0.05), ExitReason::StopLoss),
            trade(Some(0.2), ExitReason::MaxHolding),
            trade(Some(-0.05), ExitReason::StopLoss),
        ];
        let report = PerformanceCalculator::calculate(&trades, 10_000.0, 0.02);
        let summary = report.summary().expect("summary");

        assert_eq!(summary.total_trades, 4);
        assert_eq!(summary.winning_trades, 2);
        assert_eq!(summary.losing_trades, 2);
        assert!((summary.win_rate - 0.5).abs() < 1e-12);
        assert!((summary.avg_win - 0.4).abs() < 1e-12);
        assert!((summary.avg_loss + 0.05).abs() < 1e-12);
        assert!((summary.profit_factor - 8.0).abs() < 1e-12);
        // Non-compounding: 10000 * (1 + 0.6 - 0.05 + 0.2 - 0.05)
        assert!((summary.final_notional_non_compounding - 17_000.0).abs() < 1e-9);
    }

    #[test]
    fn lossless_run_has_infinite_profit_factor() {
        let trades = vec![
            trade(Some(0.1), ExitReason::TakeProfit),
            trade(Some(0.3), ExitReason::TakeProfit),
        ];
        let report = PerformanceCalculator::calculate(&trades, 10_000.0, 0.02);
        let summary = report.summary().expect("summary");
        assert!(summary.profit_factor.is_infinite());
    }

    #[test]
    fn zero_variance_returns_zero_sharpe() {
        let trades = vec![
            trade(Some(0.1), ExitReason::TakeProfit),
            trade(Some(0.1), ExitReason::TakeProfit),
        ];
        let report = PerformanceCalculator::calculate(&trades, 10_000.0, 0.02);
        let summary = report.summary().expect("summary");
        assert_eq!(summary.sharpe_ratio, 0.0);
    }

    #[test]
    fn no_data_trades_are_logged_but_excluded_from_returns() {
        let trades = vec![
            trade(Some(0.2), ExitReason::TakeProfit),
            trade(None, ExitReason::NoData),
        ];
        let report = PerformanceCalculator::calculate(&trades, 10_000.0, 0.02);
        let summary = report.summary().expect("summary");

        assert_eq!(summary.total_trades, 2);
        assert_eq!(summary.resolved_trades, 1);
        assert_eq!(summary.no_data_trades, 1);
        assert!((summary.mean_return - 0.2).abs() < 1e-12);

        let no_data = summary
            .exit_reasons
            .iter()
            .find(|b| b.reason == ExitReason::NoData)
            .expect("breakdown");
        assert_eq!(no_data.count, 1);
        assert!((no_data.proportion - 0.5).abs() < 1e-12);
    }

    #[test]
    fn median_handles_even_and_odd_counts() {
        let trades = vec![
            trade(Some(0.1), ExitReason::TakeProfit),
            trade(Some(0.3), ExitReason::TakeProfit),
            trade(Some(-0.2), ExitReason::StopLoss),
        ];
        let report = PerformanceCalculator::calculate(&trades, 10_000.0, 0.02);
        let summary = report.summary().expect("summary");
        assert!((summary.median_return - 0.1).abs() < 1e-12);
        assert!((summary.max_return - 0.3).abs() < 1e-12);
        assert!((summary.min_return + 0.2).abs() < 1e-12);
    }
}
