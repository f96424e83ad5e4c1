use anyhow::{anyhow, Result};

/// Label cutoff rule for the training window.
///
/// `Strict` keeps training rows dated strictly before the rebalance date
/// minus the prediction window, so every label's resolution window closes
/// before the rebalance date. `Inclusive` admits the boundary date itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelCutoff {
    Strict,
    Inclusive,
}

impl LabelCutoff {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "inclusive" => Ok(Self::Inclusive),
            other => Err(anyhow!(
                "Label cutoff must be strict or inclusive (value: {})",
                other
            )),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Inclusive => "inclusive",
        }
    }
}

/// Main backtest configuration struct that groups all parameters
#[derive(Debug, Clone)]
pub struct BacktestConfig {
    // Walk-forward schedule
    pub train_period_days: i64,
    pub rebalance_frequency_days: usize,
    pub label_cutoff: LabelCutoff,

    // Surge labeling
    pub prediction_window: usize,
    pub surge_threshold: f64,

    // Candidate selection
    pub probability_threshold: f64,
    pub top_k: usize,

    // Trade exits
    pub take_profit_threshold: f64,
    pub stop_loss_threshold: f64,
    pub max_holding_days: usize,

    // Metrics
    pub initial_notional: f64,
    pub annual_risk_free_rate: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            train_period_days: 365,
            rebalance_frequency_days: 21,
            label_cutoff: LabelCutoff::Strict,
            prediction_window: 20,
            surge_threshold: 0.50,
            probability_threshold: 0.5,
            top_k: 5,
            take_profit_threshold: 0.50,
            stop_loss_threshold: 0.05,
            max_holding_days: 20,
            initial_notional: 10_000.0,
            annual_risk_free_rate: 0.02,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<()> {
        require_positive_i64("train period days", self.train_period_days)?;
        require_min_usize("rebalance frequency days", self.rebalance_frequency_days, 1)?;
        require_min_usize("prediction window", self.prediction_window, 1)?;
        require_positive_f64("surge threshold", self.surge_threshold)?;
        require_unit_range("probability threshold", self.probability_threshold)?;
        require_min_usize("top k", self.top_k, 1)?;
        require_positive_f64("take profit threshold", self.take_profit_threshold)?;
        require_positive_f64("stop loss threshold", self.stop_loss_threshold)?;
        if self.stop_loss_threshold >= 1.0 {
            return Err(anyhow!(
                "Stop loss threshold must be < 1 (value: {})",
                self.stop_loss_threshold
            ));
        }
        require_min_usize("max holding days", self.max_holding_days, 1)?;
        require_positive_f64("initial notional", self.initial_notional)?;
        if !self.annual_risk_free_rate.is_finite() {
            return Err(anyhow!(
                "Annual risk-free rate must be finite (value: {})",
                self.annual_risk_free_rate
            ));
        }
        Ok(())
    }
}

fn require_positive_i64(name: &str, value: i64) -> Result<()> {
    if value <= 0 {
        return Err(anyhow!("{} must be > 0 (value: {})", capitalize(name), value));
    }
    Ok(())
}

fn require_min_usize(name: &str, value: usize, min: usize) -> Result<()> {
    if value < min {
        return Err(anyhow!(
            "{} must be >= {} (value: {})",
            capitalize(name),
            min,
            value
        ));
    }
    Ok(())
}

fn require_positive_f64(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(anyhow!(
            "{} must be a positive number (value: {})",
            capitalize(name),
            value
        ));
    }
    Ok(())
}

fn require_unit_range(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(anyhow!(
            "{} must be between 0 and 1 (value: {})",
            capitalize(name),
            value
        ));
    }
    Ok(())
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        BacktestConfig::default().validate().expect("default config");
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut config = BacktestConfig::default();
        config.stop_loss_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = BacktestConfig::default();
        config.probability_threshold = -0.1;
        assert!(config.validate().is_err());

        let mut config = BacktestConfig::default();
        config.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_label_cutoff() {
        assert_eq!(LabelCutoff::parse("Strict").unwrap(), LabelCutoff::Strict);
        assert_eq!(LabelCutoff::parse(" inclusive ").unwrap(), LabelCutoff::Inclusive);
        assert!(LabelCutoff::parse("loose").is_err());
    }
}
