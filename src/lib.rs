pub mod backtester;
pub mod classifier;
pub mod commands;
pub mod config;
pub mod features;
pub mod indicators;
pub mod labeling;
pub mod models;
pub mod panel;
pub mod performance;
pub mod report;
pub mod simulation;

pub use backtester::{TrainingInputs, WalkForwardBacktester};
pub use config::{BacktestConfig, LabelCutoff};
pub use models::{BacktestOutcome, BacktestReport, Candle, ExitReason, Trade};
pub use panel::PricePanel;
pub use performance::{MetricsReport, PerformanceCalculator, PerformanceSummary};
