pub mod backtest;
pub mod export_snapshot;
