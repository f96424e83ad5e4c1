use crate::backtester::WalkForwardBacktester;
use crate::classifier::default_model_factory;
use crate::config::BacktestConfig;
use crate::features::IndicatorFeatures;
use crate::models::BacktestOutcome;
use crate::panel::PricePanel;
use crate::performance::MetricsReport;
use crate::report;
use anyhow::Result;
use chrono::NaiveDate;
use log::info;
use std::path::Path;

pub fn load_panel(data_file: &Path) -> Result<PricePanel> {
    let is_snapshot = data_file
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("bin"))
        .unwrap_or(false);
    if is_snapshot {
        PricePanel::load_from_snapshot(data_file)
    } else {
        PricePanel::load_from_csv(data_file)
    }
}

pub fn run(
    data_file: &Path,
    trades_output: &Path,
    results_output: &Path,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    config: BacktestConfig,
) -> Result<()> {
    let panel = load_panel(data_file)?.restrict_to_date_range(start_date, end_date)?;

    let backtester = WalkForwardBacktester::new(
        panel,
        Box::new(IndicatorFeatures::default()),
        default_model_factory(),
        config,
    )?;

    let outcome = backtester.run()?;

    if let BacktestOutcome::Completed(report) = &outcome {
        report::write_trade_log(&report.trades, trades_output)?;
        log_summary(&report.metrics);
    }
    report::write_outcome(&outcome, results_output)?;

    Ok(())
}

fn log_summary(metrics: &MetricsReport) {
    match metrics {
        MetricsReport::NoTrades => {
            info!("No trades executed over the backtest window");
        }
        MetricsReport::Summary(summary) => {
            info!(
                "{} resolved trade{}: win rate {:.1}%, mean return {:.2}%, Sharpe {:.2}",
                summary.resolved_trades,
                if summary.resolved_trades == 1 { "" } else { "s" },
                summary.win_rate * 100.0,
                summary.mean_return * 100.0,
                summary.sharpe_ratio
            );
            info!(
                "Non-compounding notional: {:.2} -> {:.2}",
                summary.initial_notional, summary.final_notional_non_compounding
            );
        }
    }
}
