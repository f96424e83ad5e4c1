//! Rolling indicator primitives shared by the feature stage. All helpers are
//! point-in-time: a value at `end_idx` reads only indices `<= end_idx`.

pub const EPSILON: f64 = 1e-12;

pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator.abs() <= EPSILON {
        0.0
    } else {
        numerator / denominator
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for value in values {
        if value.is_finite() {
            sum += *value;
            count += 1;
        }
    }

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

fn std_dev(values: &[f64]) -> Option<f64> {
    let mean_value = mean(values)?;
    let mut sum = 0.0;
    let mut count = 0usize;

    for value in values {
        if value.is_finite() {
            let diff = *value - mean_value;
            sum += diff * diff;
            count += 1;
        }
    }

    if count < 2 {
        None
    } else {
        Some((sum / count as f64).sqrt())
    }
}

fn rolling_slice(data: &[f64], end_idx: usize, window: usize) -> Option<&[f64]> {
    if window == 0 || end_idx + 1 < window || end_idx >= data.len() {
        None
    } else {
        Some(&data[end_idx + 1 - window..=end_idx])
    }
}

pub fn rolling_mean_at(data: &[f64], end_idx: usize, window: usize) -> Option<f64> {
    rolling_slice(data, end_idx, window).and_then(mean)
}

pub fn rolling_std_at(data: &[f64], end_idx: usize, window: usize) -> Option<f64> {
    rolling_slice(data, end_idx, window).and_then(std_dev)
}

pub fn rolling_max_at(data: &[f64], end_idx: usize, window: usize) -> Option<f64> {
    let slice = rolling_slice(data, end_idx, window)?;
    let mut best: Option<f64> = None;
    for value in slice.iter().copied() {
        if value.is_finite() {
            best = Some(best.map_or(value, |existing| existing.max(value)));
        }
    }
    best
}

/// Fractional return of `closes[end_idx]` against the close `window` rows back.
pub fn momentum_at(closes: &[f64], end_idx: usize, window: usize) -> Option<f64> {
    if window == 0 || end_idx < window || end_idx >= closes.len() {
        return None;
    }
    let past = closes[end_idx - window];
    if past.abs() <= EPSILON {
        return None;
    }
    Some(closes[end_idx] / past - 1.0)
}

fn rsi_from_avgs(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

/// Simple-average RSI over the `period` deltas ending at `end_idx`.
pub fn rsi_at(closes: &[f64], end_idx: usize, period: usize) -> Option<f64> {
    if period == 0 || end_idx < period || end_idx >= closes.len() {
        return None;
    }

    let mut sum_gain = 0.0f64;
    let mut sum_loss = 0.0f64;
    for i in (end_idx + 1 - period)..=end_idx {
        let delta = closes[i] - closes[i - 1];
        if delta >= 0.0 {
            sum_gain += delta;
        } else {
            sum_loss += -delta;
        }
    }

    Some(rsi_from_avgs(
        sum_gain / period as f64,
        sum_loss / period as f64,
    ))
}
