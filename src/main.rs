use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use surge_engine::commands::{backtest, export_snapshot};
use surge_engine::config::{BacktestConfig, LabelCutoff};

#[derive(Parser)]
#[command(name = "surge-engine")]
#[command(about = "Walk-forward surge prediction backtester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a walk-forward backtest over a price panel
    Backtest {
        /// Path to the price panel (CSV, or a .bin snapshot)
        #[arg(long = "data-file", value_name = "PATH")]
        data_file: PathBuf,
        /// Destination CSV for the trade log
        #[arg(long, value_name = "PATH", default_value = "results/trades.csv")]
        trades_output: PathBuf,
        /// Destination JSON for the full run results
        #[arg(long, value_name = "PATH", default_value = "results/backtest.json")]
        results_output: PathBuf,
        /// Drop panel rows before this date (YYYY-MM-DD)
        #[arg(long)]
        start_date: Option<NaiveDate>,
        /// Drop panel rows after this date (YYYY-MM-DD)
        #[arg(long)]
        end_date: Option<NaiveDate>,
        /// Calendar days of history required before the first rebalance
        #[arg(long)]
        train_period_days: Option<i64>,
        /// Eligible dates between successive rebalances
        #[arg(long)]
        rebalance_frequency_days: Option<usize>,
        /// Trading days a surge may take to materialize
        #[arg(long)]
        prediction_window: Option<usize>,
        /// Return that qualifies as a surge (0.5 = +50%)
        #[arg(long)]
        surge_threshold: Option<f64>,
        /// Minimum surge probability to open a trade
        #[arg(long)]
        probability_threshold: Option<f64>,
        /// Maximum trades opened per rebalance date
        #[arg(long)]
        top_k: Option<usize>,
        /// Take-profit exit threshold (0.5 = +50%)
        #[arg(long)]
        take_profit_threshold: Option<f64>,
        /// Stop-loss exit threshold (0.05 = -5%)
        #[arg(long)]
        stop_loss_threshold: Option<f64>,
        /// Maximum trading days a trade may stay open
        #[arg(long)]
        max_holding_days: Option<usize>,
        /// Notional applied per trade in the non-compounding aggregate
        #[arg(long)]
        initial_notional: Option<f64>,
        /// Training-window boundary rule: strict or inclusive
        #[arg(long)]
        label_cutoff: Option<String>,
    },
    /// Export a CSV price panel as a binary snapshot for faster reloads
    ExportSnapshot {
        /// Path to the price panel CSV
        #[arg(long = "data-file", value_name = "PATH")]
        data_file: PathBuf,
        /// Destination file for the snapshot
        #[arg(short, long = "output", value_name = "PATH")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Backtest {
            data_file,
            trades_output,
            results_output,
            start_date,
            end_date,
            train_period_days,
            rebalance_frequency_days,
            prediction_window,
            surge_threshold,
            probability_threshold,
            top_k,
            take_profit_threshold,
            stop_loss_threshold,
            max_holding_days,
            initial_notional,
            label_cutoff,
        } => {
            let mut config = BacktestConfig::default();
            if let Some(value) = train_period_days {
                config.train_period_days = value;
            }
            if let Some(value) = rebalance_frequency_days {
                config.rebalance_frequency_days = value;
            }
            if let Some(value) = prediction_window {
                config.prediction_window = value;
            }
            if let Some(value) = surge_threshold {
                config.surge_threshold = value;
            }
            if let Some(value) = probability_threshold {
                config.probability_threshold = value;
            }
            if let Some(value) = top_k {
                config.top_k = value;
            }
            if let Some(value) = take_profit_threshold {
                config.take_profit_threshold = value;
            }
            if let Some(value) = stop_loss_threshold {
                config.stop_loss_threshold = value;
            }
            if let Some(value) = max_holding_days {
                config.max_holding_days = value;
            }
            if let Some(value) = initial_notional {
                config.initial_notional = value;
            }
            if let Some(raw) = label_cutoff {
                config.label_cutoff = LabelCutoff::parse(&raw)?;
            }

            backtest::run(
                &data_file,
                &trades_output,
                &results_output,
                start_date,
                end_date,
                config,
            )?;
        }
        Commands::ExportSnapshot { data_file, output } => {
            export_snapshot::run(&data_file, &output)?;
        }
    }

    Ok(())
}
