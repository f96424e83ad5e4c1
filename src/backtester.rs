use crate::classifier::ModelFactory;
use crate::config::{BacktestConfig, LabelCutoff};
use crate::features::FeatureEngine;
use crate::labeling::surge_label;
use crate::models::{
    BacktestOutcome, BacktestReport, Candle, RebalanceStats, SurgeCandidate, Trade,
};
use crate::panel::PricePanel;
use crate::performance::PerformanceCalculator;
use crate::simulation::simulate_exit;
use anyhow::{anyhow, Result};
use chrono::{Duration, NaiveDate};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};

/// Feature rows and labels assembled for one rebalance date, all derived
/// from candles dated at or before that date.
pub struct TrainingInputs {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<bool>,
}

impl TrainingInputs {
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn has_both_classes(&self) -> bool {
        let positives = self.labels.iter().filter(|&&label| label).count();
        positives > 0 && positives < self.labels.len()
    }
}

/// Walk-forward surge backtester. Collaborators are injected at construction
/// and the panel is shared immutably for the whole run; the accumulated trade
/// list is append-only.
pub struct WalkForwardBacktester {
    panel: PricePanel,
    feature_engine: Box<dyn FeatureEngine>,
    model_factory: ModelFactory,
    config: BacktestConfig,
}

impl WalkForwardBacktester {
    pub fn new(
        panel: PricePanel,
        feature_engine: Box<dyn FeatureEngine>,
        model_factory: ModelFactory,
        config: BacktestConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            panel,
            feature_engine,
            model_factory,
            config,
        })
    }

    pub fn panel(&self) -> &PricePanel {
        &self.panel
    }

    /// Unique panel dates from the first date at least `train_period_days`
    /// after the panel start, sampled every `rebalance_frequency_days`-th
    /// eligible date.
    pub fn rebalance_dates(&self) -> Vec<NaiveDate> {
        let unique_dates = self.panel.unique_dates();
        let first_date = match unique_dates.first() {
            Some(&date) => date,
            None => return Vec::new(),
        };

        let warmup_end = first_date + Duration::days(self.config.train_period_days);
        let first_eligible = unique_dates.partition_point(|&date| date < warmup_end);

        unique_dates[first_eligible..]
            .iter()
            .step_by(self.config.rebalance_frequency_days)
            .copied()
            .collect()
    }

    /// Training rows for one rebalance date. Exposed so the no-lookahead
    /// guarantee can be asserted directly: the output depends only on candles
    /// dated before the label cutoff plus their own resolution windows, never
    /// on anything after `rebalance_date`.
    pub fn training_inputs(&self, rebalance_date: NaiveDate) -> TrainingInputs {
        let window_days = Duration::days(self.config.prediction_window as i64);
        let cutoff = rebalance_date - window_days;

        let mut features = Vec::new();
        let mut labels = Vec::new();

        for ticker in self.panel.tickers() {
            let history = self.historical_slice(ticker, rebalance_date);
            if history.len() <= self.feature_engine.min_history() {
                continue;
            }

            for (index, candle) in history.iter().enumerate() {
                let within_cutoff = match self.config.label_cutoff {
                    LabelCutoff::Strict => candle.date < cutoff,
                    LabelCutoff::Inclusive => candle.date <= cutoff,
                };
                if !within_cutoff {
                    break;
                }

                let label = match surge_label(
                    &history,
                    index,
                    self.config.prediction_window,
                    self.config.surge_threshold,
                ) {
                    Some(label) => label,
                    None => continue,
                };
                let row = match self.feature_engine.features_at(&history, index) {
                    Some(row) => row,
                    None => continue,
                };

                features.push(row);
                labels.push(label);
            }
        }

        TrainingInputs { features, labels }
    }

    /// The live cross-section at a rebalance date: one scored candidate per
    /// ticker that actually trades on that date and has enough history.
    fn prediction_rows(&self, rebalance_date: NaiveDate) -> Vec<(String, Vec<f64>, f64)> {
        let mut rows = Vec::new();
        for ticker in self.panel.tickers() {
            let history = self.historical_slice(ticker, rebalance_date);
            let last = match history.last() {
                Some(&candle) => candle,
                None => continue,
            };
            if last.date != rebalance_date {
                continue;
            }
            if let Some(row) = self.feature_engine.features_at(&history, history.len() - 1) {
                rows.push((ticker.clone(), row, last.close));
            }
        }
        rows
    }

    pub fn run(&self) -> Result<BacktestOutcome> {
        let panel_start = self
            .panel
            .first_date()
            .ok_or_else(|| anyhow!("Price panel has no dates"))?;
        let panel_end = self
            .panel
            .last_date()
            .ok_or_else(|| anyhow!("Price panel has no dates"))?;

        let rebalance_dates = self.rebalance_dates();
        if rebalance_dates.is_empty() {
            info!(
                "Panel {} - {} is shorter than the {} day training warm-up, nothing to backtest",
                panel_start, panel_end, self.config.train_period_days
            );
            return Ok(BacktestOutcome::InsufficientData {
                panel_start,
                panel_end,
                train_period_days: self.config.train_period_days,
            });
        }

        info!(
            "Running walk-forward backtest over {} rebalance date{} ({} - {})",
            rebalance_dates.len(),
            if rebalance_dates.len() == 1 { "" } else { "s" },
            rebalance_dates[0],
            rebalance_dates[rebalance_dates.len() - 1]
        );

        let pb = ProgressBar::new(rebalance_dates.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
                )
                .unwrap()
                .progress_chars("#>-"),
        );

        let mut stats = RebalanceStats {
            eligible_dates: rebalance_dates.len(),
            ..RebalanceStats::default()
        };
        let mut trades: Vec<Trade> = Vec::new();

        for &rebalance_date in &rebalance_dates {
            self.run_rebalance(rebalance_date, &mut stats, &mut trades)?;
            pb.inc(1);
        }
        pb.finish_and_clear();

        info!(
            "Backtest complete: {} trade{} across {} traded date{} ({} skipped)",
            trades.len(),
            if trades.len() == 1 { "" } else { "s" },
            stats.traded_dates,
            if stats.traded_dates == 1 { "" } else { "s" },
            stats.skipped_no_training_rows
                + stats.skipped_single_class
                + stats.skipped_no_prediction_rows
        );

        let metrics = PerformanceCalculator::calculate(
            &trades,
            self.config.initial_notional,
            self.config.annual_risk_free_rate,
        );

        Ok(BacktestOutcome::Completed(BacktestReport {
            start_date: panel_start,
            end_date: panel_end,
            rebalance_stats: stats,
            trades,
            metrics,
        }))
    }

    fn run_rebalance(
        &self,
        rebalance_date: NaiveDate,
        stats: &mut RebalanceStats,
        trades: &mut Vec<Trade>,
    ) -> Result<()> {
        let training = self.training_inputs(rebalance_date);
        if training.is_empty() {
            debug!("{}: no resolved training rows, skipping", rebalance_date);
            stats.skipped_no_training_rows += 1;
            return Ok(());
        }
        if !training.has_both_classes() {
            debug!(
                "{}: single label class across {} training rows, skipping",
                rebalance_date,
                training.labels.len()
            );
            stats.skipped_single_class += 1;
            return Ok(());
        }

        let mut model = (self.model_factory)();
        model.fit(&training.features, &training.labels)?;

        let prediction_rows = self.prediction_rows(rebalance_date);
        if prediction_rows.is_empty() {
            debug!("{}: no scoreable cross-section, skipping", rebalance_date);
            stats.skipped_no_prediction_rows += 1;
            return Ok(());
        }

        let mut candidates: Vec<SurgeCandidate> = prediction_rows
            .into_iter()
            .map(|(ticker, row, entry_price)| SurgeCandidate {
                probability: model.predict_probability(&row),
                ticker,
                entry_price,
            })
            .filter(|candidate| candidate.probability >= self.config.probability_threshold)
            .collect();

        // Probability descending, ticker ascending so equal scores rank the
        // same way on every run.
        candidates.sort_by(|a, b| {
            b.probability
                .partial_cmp(&a.probability)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.ticker.cmp(&b.ticker))
        });
        candidates.truncate(self.config.top_k);

        if candidates.is_empty() {
            debug!(
                "{}: no candidate cleared the {:.2} probability threshold",
                rebalance_date, self.config.probability_threshold
            );
            return Ok(());
        }

        debug!(
            "{}: opening {} trade{}",
            rebalance_date,
            candidates.len(),
            if candidates.len() == 1 { "" } else { "s" }
        );
        stats.traded_dates += 1;

        for candidate in candidates {
            let future = self.future_slice(&candidate.ticker, rebalance_date);
            let exit = simulate_exit(
                candidate.entry_price,
                &future,
                self.config.take_profit_threshold,
                self.config.stop_loss_threshold,
                self.config.max_holding_days,
            );
            trades.push(Trade {
                ticker: candidate.ticker,
                entry_date: rebalance_date,
                entry_price: candidate.entry_price,
                exit_date: exit.exit_date,
                exit_price: exit.exit_price,
                exit_reason: exit.exit_reason,
                actual_return: exit.actual_return,
                holding_days: exit.holding_days,
            });
        }

        Ok(())
    }

    fn historical_slice(&self, ticker: &str, as_of: NaiveDate) -> Vec<&Candle> {
        let candles = self.panel.candles_for_ticker(ticker);
        let end = candles.partition_point(|candle| candle.date <= as_of);
        candles[..end].to_vec()
    }

    fn future_slice(&self, ticker: &str, after: NaiveDate) -> Vec<&Candle> {
        let candles = self.panel.candles_for_ticker(ticker);
        let start = candles.partition_point(|candle| candle.date <= after);
        candles[start..].to_vec()
    }
}
