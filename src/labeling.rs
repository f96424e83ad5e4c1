use crate::indicators::EPSILON;
use crate::models::Candle;

/// Binary surge label for `candles[index]`: true when the best close within
/// the next `prediction_window` rows reaches `surge_threshold` over the row's
/// own close. None when the resolution window extends past the available
/// history, so unresolved rows are dropped instead of mislabeled.
pub fn surge_label(
    candles: &[&Candle],
    index: usize,
    prediction_window: usize,
    surge_threshold: f64,
) -> Option<bool> {
    if prediction_window == 0 || index >= candles.len() {
        return None;
    }
    if index + prediction_window >= candles.len() {
        return None;
    }

    let entry_close = candles[index].close;
    if entry_close.abs() <= EPSILON {
        return None;
    }

    let mut best_return = f64::NEG_INFINITY;
    for candle in &candles[index + 1..=index + prediction_window] {
        let future_return = (candle.close - entry_close) / entry_close;
        if future_return > best_return {
            best_return = future_return;
        }
    }

    Some(best_return >= surge_threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).expect("date");
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                ticker: "AAA".to_string(),
                date: start + chrono::Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 100,
            })
            .collect()
    }

    #[test]
    fn labels_surge_within_window() {
        let candles = candles_from_closes(&[100.0, 110.0, 155.0, 90.0]);
        let refs: Vec<&Candle> = candles.iter().collect();
        assert_eq!(surge_label(&refs, 0, 2, 0.50), Some(true));
    }

    #[test]
    fn labels_no_surge() {
        let candles = candles_from_closes(&[100.0, 110.0, 120.0, 90.0]);
        let refs: Vec<&Candle> = candles.iter().collect();
        assert_eq!(surge_label(&refs, 0, 2, 0.50), Some(false));
    }

    #[test]
    fn unresolved_window_is_dropped() {
        let candles = candles_from_closes(&[100.0, 160.0]);
        let refs: Vec<&Candle> = candles.iter().collect();
        // Only one future row available for a two-day window.
        assert_eq!(surge_label(&refs, 0, 2, 0.50), None);
        assert_eq!(surge_label(&refs, 0, 1, 0.50), Some(true));
    }

    #[test]
    fn surge_just_inside_window_counts() {
        let candles = candles_from_closes(&[100.0, 101.0, 102.0, 150.0, 80.0]);
        let refs: Vec<&Candle> = candles.iter().collect();
        assert_eq!(surge_label(&refs, 0, 3, 0.50), Some(true));
        assert_eq!(surge_label(&refs, 0, 2, 0.50), Some(false));
    }
}
