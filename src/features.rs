use crate::indicators::{
    momentum_at, rolling_max_at, rolling_mean_at, rolling_std_at, rsi_at, safe_div, EPSILON,
};
use crate::models::Candle;

/// Point-in-time feature computation. Implementations must guarantee that the
/// vector for a candle at date `d` reads only candles with date <= `d`; rows
/// with insufficient history or any non-finite value return None and are
/// dropped by the caller.
pub trait FeatureEngine: Send + Sync {
    fn feature_names(&self) -> &[&'static str];

    /// Feature vector for `candles[index]`, where `candles` is one ticker's
    /// history in ascending date order.
    fn features_at(&self, candles: &[&Candle], index: usize) -> Option<Vec<f64>>;

    fn min_history(&self) -> usize;
}

const INDICATOR_FEATURE_NAMES: [&str; 8] = [
    "return_1d",
    "return_short",
    "momentum_long",
    "volatility_long",
    "rsi",
    "volume_ratio_long",
    "high_low_range",
    "close_to_peak_long",
];

/// Default feature table built from rolling indicator primitives.
pub struct IndicatorFeatures {
    short_window: usize,
    long_window: usize,
    rsi_period: usize,
}

impl Default for IndicatorFeatures {
    fn default() -> Self {
        Self {
            short_window: 5,
            long_window: 20,
            rsi_period: 14,
        }
    }
}

impl FeatureEngine for IndicatorFeatures {
    fn feature_names(&self) -> &[&'static str] {
        &INDICATOR_FEATURE_NAMES
    }

    fn features_at(&self, candles: &[&Candle], index: usize) -> Option<Vec<f64>> {
        if index >= candles.len() || index < self.min_history() {
            return None;
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let volumes: Vec<f64> = candles.iter().map(|c| c.volume as f64).collect();

        let mut returns = vec![f64::NAN; closes.len()];
        for i in 1..closes.len() {
            let prev = closes[i - 1];
            if prev.abs() > EPSILON {
                returns[i] = (closes[i] - prev) / prev;
            }
        }

        let return_1d = returns[index];
        let return_short = momentum_at(&closes, index, self.short_window)?;
        let momentum_long = momentum_at(&closes, index, self.long_window)?;
        let volatility_long = rolling_std_at(&returns, index, self.long_window)?;
        let rsi = rsi_at(&closes, index, self.rsi_period)?;

        let avg_volume = rolling_mean_at(&volumes, index, self.long_window)?;
        let volume_ratio_long = if avg_volume > 0.0 {
            volumes[index] / avg_volume - 1.0
        } else {
            0.0
        };

        let candle = candles[index];
        let high_low_range = safe_div(candle.high - candle.low, candle.close);

        let peak = rolling_max_at(&closes, index, self.long_window)?;
        let close_to_peak_long = if peak > 0.0 { closes[index] / peak - 1.0 } else { 0.0 };

        let values = vec![
            return_1d,
            return_short,
            momentum_long,
            volatility_long,
            rsi,
            volume_ratio_long,
            high_low_range,
            close_to_peak_long,
        ];

        if values.iter().any(|v| !v.is_finite()) {
            return None;
        }
        Some(values)
    }

    fn min_history(&self) -> usize {
        self.long_window.max(self.rsi_period)
    }
}
